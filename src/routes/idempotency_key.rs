use axum::{extract::FromRequestParts, http::request::Parts};
use formgate_shared::form::ValidationError;

use crate::error::AppError;

pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

const HEADER: &str = "idempotency-key";

/// Optional `Idempotency-Key` header; blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdempotencyKeyHeader(pub Option<String>);

impl IdempotencyKeyHeader {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for IdempotencyKeyHeader {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(HEADER) else {
            return Ok(Self(None));
        };

        let value = value
            .to_str()
            .map_err(|_| malformed())?
            .trim();

        if value.is_empty() {
            return Ok(Self(None));
        }

        if value.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(malformed());
        }

        Ok(Self(Some(value.to_owned())))
    }
}

fn malformed() -> AppError {
    ValidationError::MalformedField("idempotencyKey".to_owned()).into()
}
