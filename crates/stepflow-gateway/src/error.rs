use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use stepflow_core::error::StepflowError;

/// An error returned from a handler, rendered as `{"detail": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
    run_id: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            run_id: None,
        }
    }

    /// Attach the id of the run that failed, so clients can fetch its record.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<StepflowError> for ApiError {
    fn from(err: StepflowError) -> Self {
        let status = match &err {
            StepflowError::GraphNotFound(_) | StepflowError::RunNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            e if e.is_configuration() => StatusCode::BAD_REQUEST,
            StepflowError::Guard { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.run_id {
            Some(run_id) => serde_json::json!({ "detail": self.detail, "run_id": run_id }),
            None => serde_json::json!({ "detail": self.detail }),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err: ApiError = StepflowError::GraphNotFound("g".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = StepflowError::DuplicateStep("a".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.detail().contains("a"));

        let err: ApiError = StepflowError::ToolExecution {
            tool: "t".into(),
            message: "boom".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
