use super::error::*;
use crate::application_port::*;
use crate::domain_model::SubjectId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Widest subject the `refresh_verifier.subject_id` column holds.
pub const MAX_SUBJECT_LEN: usize = 255;

fn required(value: Option<String>) -> Result<String, warp::Rejection> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| reject::custom(ApiErrorCode::MissingParameter))
}

async fn within<T>(
    request_timeout: Duration,
    call: impl Future<Output = Result<T, AuthError>>,
) -> Result<T, warp::Rejection> {
    tokio::time::timeout(request_timeout, call)
        .await
        .map_err(|_| reject::custom(ApiErrorCode::Timeout))?
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)
}

#[derive(Debug, Deserialize)]
pub struct GetTokensQuery {
    pub guid: Option<String>,
}

pub async fn get_tokens(
    query: GetTokensQuery,
    auth_service: Arc<dyn AuthService>,
    request_timeout: Duration,
) -> Result<impl warp::Reply, warp::Rejection> {
    let guid = required(query.guid)?;
    if guid.len() > MAX_SUBJECT_LEN {
        return Err(reject::custom(ApiErrorCode::InvalidParameter));
    }
    let subject = SubjectId(guid);

    let tokens = within(request_timeout, auth_service.issue_tokens(&subject)).await?;

    Ok(warp::reply::json(&ApiResponse::ok(tokens)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokensQuery {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

pub async fn refresh_tokens(
    query: RefreshTokensQuery,
    auth_service: Arc<dyn AuthService>,
    request_timeout: Duration,
) -> Result<impl warp::Reply, warp::Rejection> {
    let access_token = required(query.access_token)?;
    let refresh_token = required(query.refresh_token)?;

    let tokens = within(
        request_timeout,
        auth_service.refresh_tokens(&access_token, &refresh_token),
    )
    .await?;

    Ok(warp::reply::json(&ApiResponse::ok(tokens)))
}
