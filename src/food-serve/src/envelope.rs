use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::{CategoryPercentages, Error, Result};

/// Prefix of every failure message in the string envelope. Existing
/// clients match on it, typo included.
pub const ERROR_PREFIX: &str = "error ocused: ";

/// `{"result": ...}` body returned by the classification route.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEnvelope {
    Success(CategoryPercentages),
    Failure(String),
}

impl ResultEnvelope {
    pub fn failure(err: &Error) -> Self {
        ResultEnvelope::Failure(format!("{}{}", ERROR_PREFIX, err))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultEnvelope::Success(_))
    }
}

impl From<Result<CategoryPercentages>> for ResultEnvelope {
    fn from(result: Result<CategoryPercentages>) -> Self {
        match result {
            Ok(percentages) => ResultEnvelope::Success(percentages),
            Err(err) => ResultEnvelope::failure(&err),
        }
    }
}

impl Serialize for ResultEnvelope {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            ResultEnvelope::Success(percentages) => map.serialize_entry("result", percentages)?,
            ResultEnvelope::Failure(message) => map.serialize_entry("result", message)?,
        }
        map.end()
    }
}

/// `{"error": {"kind": ..., "message": ...}}`, for callers that opted into
/// status codes instead of the always-200 envelope.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl StructuredError {
    pub fn kind(&self) -> &'static str {
        self.error.kind
    }
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        StructuredError {
            error: ErrorBody {
                kind: err.kind().as_str(),
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_wraps_percentages() {
        let scores = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
        let envelope = ResultEnvelope::from(CategoryPercentages::from_scores(&scores));
        assert!(envelope.is_success());
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"result": {
                "healthy": 10, "junk": 20, "dessert": 30, "appetizer": 40, "mains": 50,
                "soups": 60, "carbs": 70, "protein": 80, "fats": 90, "meat": 100
            }})
        );
    }

    #[test]
    fn failure_is_a_prefixed_string() {
        let envelope = ResultEnvelope::from(CategoryPercentages::from_scores(&[0.5; 3]));
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"result": "error ocused: inference contract violation: expected 10 scores, got 3"})
        );
    }

    #[test]
    fn structured_error_names_its_kind() {
        let err = Error::Connectivity("could not reach model server".into());
        assert_eq!(
            serde_json::to_value(StructuredError::from(&err)).unwrap(),
            json!({"error": {"kind": "connectivity", "message": "could not reach model server"}})
        );
    }
}
