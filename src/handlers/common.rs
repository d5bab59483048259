use crate::errors::ApiError;
use serde::{Deserialize, Deserializer};
use validator::Validate;

/// Common pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

pub fn default_page() -> u64 {
    1
}

pub fn default_limit() -> u64 {
    20
}

/// Distinguishes an absent field (outer `None`) from an explicit JSON null
/// (inner `None`) in partial-update payloads. Use with `#[serde(default)]`.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Runs `validator` field checks on a request payload, flattening field
/// errors into the response `details`.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input.validate().map_err(|errors| {
        let details = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let msgs: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{field}: {}", msgs.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");
        ApiError::ValidationError {
            message: "Validation failed".to_string(),
            details: Some(details),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Payload {
        #[validate(length(min = 1, message = "must not be empty"))]
        name: String,
    }

    #[test]
    fn flattens_field_errors() {
        let err = validate_input(&Payload {
            name: String::new(),
        })
        .unwrap_err();
        match err {
            ApiError::ValidationError { details, .. } => {
                assert!(details.unwrap().contains("name: must not be empty"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn valid_payload_passes() {
        assert!(validate_input(&Payload { name: "x".into() }).is_ok());
    }
}
