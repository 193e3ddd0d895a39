//! Realtime test engine
//!
//! A stand-in detection engine for exercising realtime pipeline orchestration.
//! It consumes media chunk events from a Redis list, answers every supported
//! image chunk with a synthetic face detection, publishes a status record for
//! every message, and exits once its input has been idle for a configured time.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
