//! Error types for the refinery library.
//!
//! Filtering outcomes are not errors; they are reported as exclusion events.
//! Only structural failures end up here.

use thiserror::Error;

use crate::record::Field;

/// The input batch does not carry every required raw field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("input schema is missing required fields: {}", field_list(.0))]
    MissingFields(Vec<Field>),
}

fn field_list(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A survivor of the cleaning run violated a guarantee the stages make.
    #[error("pipeline invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_message_lists_all_fields() {
        let err = SchemaError::MissingFields(vec![Field::PickupTime, Field::FareAmount]);
        assert_eq!(
            err.to_string(),
            "input schema is missing required fields: pickup_time, fare_amount"
        );
    }

    #[test]
    fn test_schema_error_converts_into_pipeline_error() {
        let err: PipelineError = SchemaError::MissingFields(vec![Field::TotalAmount]).into();
        assert!(matches!(err, PipelineError::Schema(_)));
    }
}
