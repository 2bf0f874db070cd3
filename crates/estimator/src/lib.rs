//! Client-side orchestration for the Supa Idle estimator.
//!
//! A [`GeoState`] holds what the user picked. [`Orchestrator::mount`] wires
//! it to one cancelable fetch per external signal and to the report
//! composer; the resulting slots are read through [`Signals`].

pub mod client;
mod composer;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod signals;
pub mod store;

pub use client::{BoxFuture, EstimateServices, HttpServices};
pub use config::{Delays, Endpoints, EstimatorConfig};
pub use error::FetchError;
pub use orchestrator::Orchestrator;
pub use signals::{SignalBoard, Signals};
pub use store::GeoState;
