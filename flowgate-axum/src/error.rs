use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Invalid JSON-RPC request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task cannot be canceled: {0}")]
    TaskNotCancelable(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] flowgate::GatewayError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::AgentNotFound(id) => (
                StatusCode::NOT_FOUND,
                a2a_types::INVALID_REQUEST_ERROR_CODE,
                format!("Agent not found: {id}"),
            ),
            Error::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                a2a_types::INVALID_REQUEST_ERROR_CODE,
                msg.clone(),
            ),
            Error::MethodNotFound(method) => (
                StatusCode::NOT_FOUND,
                a2a_types::METHOD_NOT_FOUND_ERROR_CODE,
                format!("Method not found: {method}"),
            ),
            Error::InvalidParams(msg) => (
                StatusCode::BAD_REQUEST,
                a2a_types::INVALID_PARAMS_ERROR_CODE,
                msg.clone(),
            ),
            Error::TaskNotFound(id) => (
                StatusCode::NOT_FOUND,
                a2a_types::TASK_NOT_FOUND_ERROR_CODE,
                format!("Task not found: {id}"),
            ),
            Error::TaskNotCancelable(id) => (
                StatusCode::CONFLICT,
                a2a_types::TASK_NOT_CANCELABLE_ERROR_CODE,
                format!("Task cannot be canceled: {id}"),
            ),
            Error::Json(_) => (
                StatusCode::BAD_REQUEST,
                a2a_types::JSON_PARSE_ERROR_CODE,
                "Parse error".to_string(),
            ),
            Error::Gateway(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                a2a_types::INTERNAL_ERROR_CODE,
                e.to_string(),
            ),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                a2a_types::INTERNAL_ERROR_CODE,
                msg.clone(),
            ),
        };

        let body = json!({
            "jsonrpc": "2.0",
            "error": {
                "code": error_code,
                "message": message,
            },
            "id": null
        });

        (status, Json(body)).into_response()
    }
}
