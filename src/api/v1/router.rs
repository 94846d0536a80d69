use super::handler;
use super::handler::{GetTokensQuery, RefreshTokensQuery};
use crate::application_port::AuthService;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;

pub fn routes(
    auth_service: Arc<dyn AuthService>,
    request_timeout: Duration,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let get_tokens = warp::post()
        .and(warp::path("get-tokens"))
        .and(warp::path::end())
        .and(warp::query::<GetTokensQuery>())
        .and(with(auth_service.clone()))
        .and(with_value(request_timeout))
        .and_then(handler::get_tokens);

    let refresh_tokens = warp::post()
        .and(warp::path("refresh-tokens"))
        .and(warp::path::end())
        .and(warp::query::<RefreshTokensQuery>())
        .and(with(auth_service))
        .and(with_value(request_timeout))
        .and_then(handler::refresh_tokens);

    get_tokens.or(refresh_tokens)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_value<T>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone
where
    T: Clone + Send + Sync + 'static,
{
    warp::any().map(move || value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1::recover_error;
    use crate::application_impl::*;
    use crate::application_port::*;
    use crate::domain_model::SubjectId;
    use crate::infra_memory::MemoryVerifierStore;
    use serde_json::Value;
    use warp::http::StatusCode;

    fn auth_service() -> Arc<dyn AuthService> {
        let codec = JwtHs512Codec::new(JwtConfig {
            access_ttl: Duration::from_secs(60),
            refresh_ttl: Duration::from_secs(600),
            leeway: Duration::ZERO,
            signing_key: b"router-test-secret".to_vec(),
        })
        .unwrap();
        Arc::new(RealAuthService::new(
            Arc::new(codec),
            Arc::new(cheap_hasher()),
            Arc::new(MemoryVerifierStore::new()),
            AuthServiceConfig::default(),
        ))
    }

    async fn post(service: Arc<dyn AuthService>, path: &str) -> (StatusCode, Value) {
        let api = routes(service, Duration::from_secs(5)).recover(recover_error);
        let response = warp::test::request()
            .method("POST")
            .path(path)
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        (response.status(), body)
    }

    async fn issue(service: Arc<dyn AuthService>, guid: &str) -> (String, String) {
        let (status, body) = post(service, &format!("/get-tokens?guid={guid}")).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        (
            data["access_token"].as_str().unwrap().to_string(),
            data["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn get_tokens_returns_a_pair() {
        let (status, body) = post(auth_service(), "/get-tokens?guid=1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["data"]["access_token"].is_string());
        assert!(body["data"]["refresh_token"].is_string());
        assert!(body["data"]["refresh_token_expires_at"].is_string());
    }

    #[tokio::test]
    async fn get_tokens_requires_guid() {
        for path in ["/get-tokens", "/get-tokens?guid="] {
            let (status, body) = post(auth_service(), path).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["code"], "MissingParameter");
        }
    }

    #[tokio::test]
    async fn get_tokens_bounds_guid_length() {
        let longest = "a".repeat(handler::MAX_SUBJECT_LEN);
        let (status, _) = post(auth_service(), &format!("/get-tokens?guid={longest}")).await;
        assert_eq!(status, StatusCode::OK);

        let too_long = "a".repeat(handler::MAX_SUBJECT_LEN + 1);
        let (status, body) = post(auth_service(), &format!("/get-tokens?guid={too_long}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "InvalidParameter");
    }

    #[tokio::test]
    async fn refresh_rotates_the_pair() {
        let service = auth_service();
        let (access, refresh) = issue(service.clone(), "1").await;

        let (status, body) = post(
            service,
            &format!("/refresh-tokens?accessToken={access}&refreshToken={refresh}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(body["data"]["access_token"].as_str().unwrap(), access);
        assert_ne!(body["data"]["refresh_token"].as_str().unwrap(), refresh);
    }

    #[tokio::test]
    async fn refresh_requires_both_tokens() {
        let service = auth_service();
        let (access, _) = issue(service.clone(), "1").await;

        let (status, body) = post(service, &format!("/refresh-tokens?accessToken={access}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "MissingParameter");
    }

    #[tokio::test]
    async fn swapped_tokens_are_invalid() {
        let service = auth_service();
        let (access, refresh) = issue(service.clone(), "1").await;

        let (status, body) = post(
            service,
            &format!("/refresh-tokens?accessToken={refresh}&refreshToken={access}"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "InvalidToken");
    }

    #[tokio::test]
    async fn tokens_from_different_sessions_are_rejected() {
        let service = auth_service();
        let (access_a, _) = issue(service.clone(), "1").await;
        let (_, refresh_b) = issue(service.clone(), "1").await;

        let (status, body) = post(
            service,
            &format!("/refresh-tokens?accessToken={access_a}&refreshToken={refresh_b}"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "TokenRejected");
    }

    #[tokio::test]
    async fn get_is_not_allowed() {
        let api = routes(auth_service(), Duration::from_secs(5)).recover(recover_error);
        let response = warp::test::request()
            .method("GET")
            .path("/get-tokens?guid=1")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    struct SlowAuthService;

    #[async_trait::async_trait]
    impl AuthService for SlowAuthService {
        async fn issue_tokens(&self, _subject: &SubjectId) -> Result<AuthTokens, AuthError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(AuthError::InternalError("unreachable".to_string()))
        }

        async fn refresh_tokens(
            &self,
            _access_token: &str,
            _refresh_token: &str,
        ) -> Result<AuthTokens, AuthError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(AuthError::InternalError("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn slow_requests_time_out() {
        let api = routes(Arc::new(SlowAuthService), Duration::from_millis(20)).recover(recover_error);
        let response = warp::test::request()
            .method("POST")
            .path("/get-tokens?guid=1")
            .reply(&api)
            .await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"]["code"], "Timeout");
    }
}
