//! Core time types shared by the pipeline, the sync engine and the controller.

pub mod time;

pub use time::{Time, TimeBase};
