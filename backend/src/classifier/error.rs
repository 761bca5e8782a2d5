use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::inference::AdapterError;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Backend not found: {0}")]
    BackendNotFound(String),
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClassifyError {
    /// Errors caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ClassifyError::Inference(_))
    }
}

impl From<AdapterError> for ClassifyError {
    fn from(err: AdapterError) -> Self {
        ClassifyError::Inference(err.to_string())
    }
}

impl From<image::ImageError> for ClassifyError {
    fn from(err: image::ImageError) -> Self {
        ClassifyError::ImageDecode(err.to_string())
    }
}

impl ResponseError for ClassifyError {
    fn status_code(&self) -> StatusCode {
        match self {
            ClassifyError::BackendNotFound(_) => StatusCode::NOT_FOUND,
            ClassifyError::ImageDecode(_) | ClassifyError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ClassifyError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
