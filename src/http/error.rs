use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Serialize;

use crate::app::forms::FormErrors;

pub const LOGIN_URL: &str = "/auth/login/";

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    detail: ErrorDetail,
}

#[derive(Debug)]
enum ErrorDetail {
    None,
    Form(FormErrors),
    Path(String),
    Redirect(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FormErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: ErrorDetail::None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 404 for a path no route matches.
    pub fn page_not_found(path: impl Into<String>) -> Self {
        Self {
            detail: ErrorDetail::Path(path.into()),
            ..Self::new(StatusCode::NOT_FOUND, "page not found")
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn invalid_form(errors: FormErrors) -> Self {
        Self {
            detail: ErrorDetail::Form(errors),
            ..Self::bad_request("invalid form")
        }
    }

    /// Sends an anonymous visitor to the login page, remembering where
    /// they were headed.
    pub fn login_required(next: &str) -> Self {
        let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
        Self {
            detail: ErrorDetail::Redirect(format!("{}?next={}", LOGIN_URL, next)),
            ..Self::new(StatusCode::SEE_OTHER, "login required")
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (errors, path) = match self.detail {
            ErrorDetail::None => (None, None),
            ErrorDetail::Form(errors) => (Some(errors), None),
            ErrorDetail::Path(path) => (None, Some(path)),
            ErrorDetail::Redirect(location) => return Redirect::to(&location).into_response(),
        };
        let body = Json(ErrorResponse {
            error: self.message,
            errors,
            path,
        });
        (self.status, body).into_response()
    }
}

/// Body for panics caught by the router, matching the regular 500 shape.
pub fn panic_response(_panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!("handler panicked");
    let body = serde_json::json!({ "error": "internal server error" }).to_string();
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
