use appd_logs_collector::CollectionError;
use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failure of a download request, rendered as a plain-text response.
#[derive(Debug)]
pub enum ApiError {
    /// The form body could not be read or decoded.
    Form(FormRejection),
    Collection(CollectionError),
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::Form(rejection)
    }
}

impl From<CollectionError> for ApiError {
    fn from(err: CollectionError) -> Self {
        ApiError::Collection(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            // Missing or malformed fields answer 400.
            ApiError::Form(rejection) => match rejection.status() {
                StatusCode::UNPROCESSABLE_ENTITY => StatusCode::BAD_REQUEST,
                status => status,
            },
            ApiError::Collection(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Collection(CollectionError::CopyFailed { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Collection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Form(rejection) => rejection.body_text(),
            ApiError::Collection(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let chain = match &self {
                ApiError::Form(rejection) => error_chain(rejection),
                ApiError::Collection(err) => error_chain(err),
            };
            tracing::error!("Log collection failed: {}", chain);
            let body = status.canonical_reason().unwrap_or("Internal Server Error");
            return (status, body).into_response();
        }

        let message = self.message();
        tracing::warn!("Rejected download request: {}", message);
        (status, message).into_response()
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
