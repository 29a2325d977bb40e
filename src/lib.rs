//! Image Classification Queue
//!
//! Accepts image uploads over HTTP, stores them by content address, hands
//! them to a model worker through a Redis job queue and waits a bounded time
//! for the worker's prediction.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
