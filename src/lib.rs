//! Random-forest disease diagnosis predictor.
//!
//! An offline pipeline ([`ml::TrainingPipeline`]) fits encoders, a scaler
//! and a bagged forest on a patient CSV and writes a run-stamped artifact
//! set. The HTTP service ([`api::build_router`]) loads that set once and
//! scores single patient records.
//!
//! Logging goes through `tracing`; set `RUST_LOG` to override the
//! configured level.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod ui;

pub use error::{AppError, Result};
