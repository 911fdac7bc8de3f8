//! Timer-driven simulation of the contract upload pipeline.
//!
//! Each submitted file gets an [`UploadRecord`](shared::domain::UploadRecord)
//! in an [`UploadStore`] and its own task that advances it through
//! `uploading`, `processing` and finally `completed`. Progress increments come
//! from a pluggable [`ProgressGenerator`].

pub mod config;
pub mod intake;
pub mod progress;
pub mod simulator;
pub mod store;

pub use config::{load_settings, IntakeSettings, PhaseSettings, SimulationSettings};
pub use progress::{FixedProgress, ProgressGenerator, RandomProgress};
pub use simulator::UploadSimulator;
pub use store::{RecordView, UploadStore};
