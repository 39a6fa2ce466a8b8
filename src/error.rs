use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Không hỗ trợ ngành: {0}")]
    UnsupportedMajor(String),

    #[error("Không tìm thấy file Markdown: {0}")]
    DocumentNotFound(String),

    #[error("Không có document nào trong index.")]
    EmptyIndex,

    #[error("Lỗi khi gọi mô hình sinh câu trả lời: {0}")]
    GenerationBackend(String),

    #[error("Lỗi khi tạo embedding: {0}")]
    Embedding(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Lỗi cấu hình: {0}")]
    Config(String),

    #[error("Lỗi index: {0:#}")]
    Index(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnsupportedMajor(_) | AppError::DocumentNotFound(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::GenerationBackend(_) | AppError::Embedding(_) => StatusCode::BAD_GATEWAY,
            AppError::EmptyIndex | AppError::Config(_) | AppError::Index(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{}", self);
        } else {
            tracing::warn!(status = status.as_u16(), "{}", self);
        }

        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}
