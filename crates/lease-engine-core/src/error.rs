use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeaseEngineError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Degenerate input: {field}: {reason}")]
    DegenerateInput { field: String, reason: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Lease {lease_id}: {source}")]
    Lease {
        lease_id: String,
        #[source]
        source: Box<LeaseEngineError>,
    },
}

impl LeaseEngineError {
    /// Attach a lease identifier. Errors already tagged are returned as-is.
    pub fn for_lease(self, lease_id: &str) -> Self {
        match self {
            tagged @ LeaseEngineError::Lease { .. } => tagged,
            other => LeaseEngineError::Lease {
                lease_id: lease_id.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The contract field that failed, when the error names one.
    pub fn field(&self) -> Option<&str> {
        match self {
            LeaseEngineError::InvalidInput { field, .. }
            | LeaseEngineError::DegenerateInput { field, .. } => Some(field),
            LeaseEngineError::Lease { source, .. } => source.field(),
            _ => None,
        }
    }

    /// The innermost error, with any lease tag removed.
    pub fn root(&self) -> &LeaseEngineError {
        match self {
            LeaseEngineError::Lease { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for LeaseEngineError {
    fn from(e: serde_json::Error) -> Self {
        LeaseEngineError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_lease_wraps_once() {
        let err = LeaseEngineError::InvalidInput {
            field: "borrowing_rate".into(),
            reason: "required".into(),
        }
        .for_lease("L-1")
        .for_lease("L-2");

        match &err {
            LeaseEngineError::Lease { lease_id, .. } => assert_eq!(lease_id, "L-1"),
            other => panic!("Expected Lease wrapper, got {other:?}"),
        }
        assert_eq!(err.field(), Some("borrowing_rate"));
        assert!(err.to_string().contains("L-1"));
        assert!(err.to_string().contains("borrowing_rate"));
    }

    #[test]
    fn test_root_unwraps_lease_tag() {
        let err = LeaseEngineError::DegenerateInput {
            field: "frequency_months".into(),
            reason: "must be positive".into(),
        }
        .for_lease("L-9");
        assert!(matches!(
            err.root(),
            LeaseEngineError::DegenerateInput { .. }
        ));
    }
}
