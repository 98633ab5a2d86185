//! Trackroom Worker
//!
//! Maintenance jobs around the preview pipeline: re-emitting trigger events for
//! songs whose preview or waveform is missing, either in-process or against an
//! external trigger endpoint.

pub mod emitter;
pub mod retrigger;

pub use emitter::{EmitError, HttpTriggerEmitter, InProcessEmitter, TriggerEmitter};
pub use retrigger::{RetriggerConfig, RetriggerService, RetriggerSummary};
