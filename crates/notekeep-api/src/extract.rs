//! Request extractors

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// JSON body that is deserialized and then validated
///
/// Malformed JSON and failed constraints both become `400 Bad Request`
/// with a description of what was wrong.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| AppError::BadRequest(format_validation_errors(&errors)))?;

        Ok(Self(value))
    }
}

/// One `field: message` entry per failed constraint, sorted by field
pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            match &error.message {
                Some(message) => messages.push(format!("{field}: {message}")),
                None => messages.push(format!("{field}: {}", error.code)),
            }
        }
    }

    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RegisterRequest;

    #[test]
    fn test_format_validation_errors() {
        let request = RegisterRequest {
            email: "nope".to_string(),
            password: "123".to_string(),
        };

        let errors = request.validate().unwrap_err();
        assert_eq!(
            format_validation_errors(&errors),
            "email: must be a valid email address; password: must be at least 6 characters"
        );
    }
}
