use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use crate::logger::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = if let Some(code) = err.find::<ApiErrorCode>() {
        (code.clone(), code.to_string())
    } else if err.is_not_found() {
        (ApiErrorCode::NotFound, ApiErrorCode::NotFound.to_string())
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (
            ApiErrorCode::MethodNotAllowed,
            ApiErrorCode::MethodNotAllowed.to_string(),
        )
    } else {
        (
            ApiErrorCode::InternalError,
            format!("Unhandled error: {:?}", err),
        )
    };

    let status = code.status();
    let json = warp::reply::json(&ApiResponse::<()>::err(code, message));
    Ok(warp::reply::with_status(json, status))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Required query parameter is missing or empty")]
    MissingParameter,
    #[error("Query parameter is out of range")]
    InvalidParameter,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Tokens do not belong to the same active session")]
    TokenRejected,
    #[error("Session not found")]
    SessionNotFound,
    #[error("Request timed out")]
    Timeout,
    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
    #[error("Route not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::MissingParameter | ApiErrorCode::InvalidParameter => {
                StatusCode::BAD_REQUEST
            }
            ApiErrorCode::InvalidToken
            | ApiErrorCode::TokenExpired
            | ApiErrorCode::TokenRejected
            | ApiErrorCode::SessionNotFound => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::TokenExpired { .. } => ApiErrorCode::TokenExpired,
            e @ (AuthError::TokenInvalid { .. } | AuthError::TokenKindMismatch { .. }) => {
                debug!("rejected token: {}", e);
                ApiErrorCode::InvalidToken
            }
            AuthError::SubjectMismatch | AuthError::SessionMismatch | AuthError::TokenMismatch => {
                ApiErrorCode::TokenRejected
            }
            AuthError::SessionNotFound => ApiErrorCode::SessionNotFound,
            e @ AuthError::Timeout { .. } => {
                warn!("{}", e);
                ApiErrorCode::Timeout
            }
            e @ AuthError::PersistenceUnavailable { .. } => {
                warn!("{}", e);
                ApiErrorCode::ServiceUnavailable
            }
            e @ (AuthError::InvalidTokenKind(_) | AuthError::InternalError(_)) => {
                ApiErrorCode::internal(e)
            }
        }
    }
}
