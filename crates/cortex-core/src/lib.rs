pub mod config;
pub mod error;
pub mod safety;
pub mod telemetry;
pub mod types;

pub use config::CortexConfig;
pub use error::{CortexError, Result};
pub use safety::{PiiType, SafetyDecision, SafetyGate};
pub use telemetry::{PipelineEvent, Telemetry};
pub use types::*;
