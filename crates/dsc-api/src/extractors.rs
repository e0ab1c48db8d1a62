//! # Request Extraction Helpers
//!
//! JSON bodies and path ids go through these helpers so malformed input
//! surfaces as an [`AppError::BadRequest`] with the standard error body
//! instead of axum's plain-text rejection.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::AppError;

/// Extract a required JSON body.
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Parse a body that may be absent. An empty body yields `T::default()`.
pub fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// A UUID path segment, e.g. the `{id}` of `/v1/transfers/{id}`.
#[derive(Debug, Clone, Copy)]
pub struct IdPath(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for IdPath {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map(|Path(id)| IdPath(id))
            .map_err(|err| AppError::BadRequest(err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsc_connector::ReasonRequest;

    #[test]
    fn empty_body_is_default() {
        let req: ReasonRequest = optional_json(&Bytes::new()).unwrap();
        assert!(req.reason.is_none());
        let req: ReasonRequest = optional_json(&Bytes::from_static(b"  \n")).unwrap();
        assert!(req.reason.is_none());
    }

    #[test]
    fn present_body_is_parsed() {
        let req: ReasonRequest = optional_json(&Bytes::from_static(br#"{"reason":"done"}"#)).unwrap();
        assert_eq!(req.reason.as_deref(), Some("done"));
    }

    #[test]
    fn malformed_body_is_bad_request() {
        let err = optional_json::<ReasonRequest>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
