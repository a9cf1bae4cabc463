//! Response envelope shared with calling services.
//!
//! Services wrap pipeline results in [`ApiResponse`] before serializing them
//! to JSON. Status codes follow the existing convention: 200 success, 500
//! operation failed, 100 parameter validation failed.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{STATUS_ERROR, STATUS_SUCCESS, STATUS_VALIDATE_PARAM};
use crate::error::{ErrorKind, UploadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Success,
    Error,
    ValidateParam,
}

impl StatusCode {
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Success => STATUS_SUCCESS,
            StatusCode::Error => STATUS_ERROR,
            StatusCode::ValidateParam => STATUS_VALIDATE_PARAM,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StatusCode::Success => "operation succeeded",
            StatusCode::Error => "operation failed",
            StatusCode::ValidateParam => "parameter validation failed",
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        [StatusCode::Success, StatusCode::Error, StatusCode::ValidateParam]
            .into_iter()
            .find(|status| status.code() == code)
    }
}

impl From<ErrorKind> for StatusCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Validation => StatusCode::ValidateParam,
            _ => StatusCode::Error,
        }
    }
}

/// `{ data, msg, code, timestamp }` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub msg: String,
    pub code: u16,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::build(Some(data), StatusCode::Success.description(), StatusCode::Success.code())
    }

    pub fn fail(status: StatusCode) -> Self {
        Self::build(None, status.description(), status.code())
    }

    pub fn fail_with(msg: impl Into<String>, code: u16) -> Self {
        Self::build(None, msg, code)
    }

    pub fn is_success(&self) -> bool {
        self.code == STATUS_SUCCESS
    }

    fn build(data: Option<T>, msg: impl Into<String>, code: u16) -> Self {
        Self {
            data,
            msg: msg.into(),
            code,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

impl<T> From<UploadError> for ApiResponse<T> {
    fn from(err: UploadError) -> Self {
        ApiResponse::fail_with(err.to_string(), err.code())
    }
}

impl<T> From<Result<T, UploadError>> for ApiResponse<T> {
    fn from(result: Result<T, UploadError>) -> Self {
        match result {
            Ok(data) => ApiResponse::success(data),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let response = ApiResponse::success("avatars/20240101/a.jpg".to_string());
        assert!(response.is_success());
        assert_eq!(response.code, 200);
        assert!(response.timestamp > 0);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"], "avatars/20240101/a.jpg");
        assert_eq!(json["code"], 200);
    }

    #[test]
    fn test_validation_error_envelope() {
        let response: ApiResponse<String> =
            UploadError::Validation("no content to upload".into()).into();
        assert!(!response.is_success());
        assert_eq!(response.code, 100);
        assert_eq!(response.data, None);
        assert!(response.msg.contains("no content"));
    }

    #[test]
    fn test_transport_error_envelope() {
        let result: Result<String, UploadError> = Err(UploadError::Connection("refused".into()));
        let response = ApiResponse::from(result);
        assert_eq!(response.code, 500);
    }

    #[test]
    fn test_status_lookup() {
        assert_eq!(StatusCode::from_code(100), Some(StatusCode::ValidateParam));
        assert_eq!(StatusCode::from_code(404), None);
        assert_eq!(StatusCode::from(ErrorKind::Directory), StatusCode::Error);
        assert_eq!(ApiResponse::<()>::fail(StatusCode::Error).msg, "operation failed");
    }
}
