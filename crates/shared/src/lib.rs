//! Configuration core for the drone simulation wizard.
//!
//! Everything here is synchronous and free of I/O: the rendering surface and
//! the backend are reached only through the traits in [`viewport`] and the
//! pending mutations drained from [`config::SimulationConfiguration`].

pub mod config;
pub mod error;
pub mod geo;
pub mod interaction;
pub mod models;
pub mod submission;
pub mod viewport;

pub use config::{ConfigurationRecord, ConfigurationSnapshot, Mutation, SimulationConfiguration};
pub use error::SubmissionError;
pub use interaction::{DragPayload, DrawState, InteractionEngine, Outcome};
pub use submission::{to_submission_payload, validate, SubmissionPayload};
