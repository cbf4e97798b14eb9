use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde_json::json,
    venom_channels::ClientError,
    venom_whatsapp::DispatchError,
};

/// Every way a gateway request can fail, with its status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Forbidden: Invalid API Key")]
    Forbidden,

    #[error("Too many requests, slow down.")]
    RateLimited,

    #[error("number is not registered")]
    NotRegistered,

    #[error("not ready")]
    NotReady,

    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::NotRegistered => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Validation => Self::Validation(e.to_string()),
            DispatchError::NotRegistered { .. } => Self::NotRegistered,
            DispatchError::Upstream(msg) => Self::Upstream(msg),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(e: ClientError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({ "status": false, "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}
