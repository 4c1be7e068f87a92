pub mod cleaning;
pub mod config;
pub mod error;
pub mod exclusion_log;
pub mod features;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod zones;

pub use error::{PipelineError, Result, SchemaError};
pub use pipeline::{Pipeline, PipelineOutput};
