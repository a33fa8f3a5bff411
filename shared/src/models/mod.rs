//! Domain models for the Smart City Telemetry platform

mod message;
mod reading;
mod report;
mod sensor;

pub use message::*;
pub use reading::*;
pub use report::*;
pub use sensor::*;
