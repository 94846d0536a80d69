use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::Sweeper;
use crate::settings::Settings;
use anyhow::{Context, anyhow};
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub request_timeout: Duration,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let mut pool = None;

        let verifier_store: Arc<dyn VerifierStore> = match settings.store.backend.as_str() {
            "memory" => Arc::new(MemoryVerifierStore::new()),
            "redis" => {
                let url = settings
                    .store
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("store.redis_url is required for the redis backend"))?;
                let redis_client = redis::Client::open(url)?;
                let redis_manager = redis_client
                    .get_connection_manager()
                    .await
                    .context("connecting to redis")?;
                Arc::new(RedisVerifierStore::new(
                    redis_manager,
                    settings.store.key_prefix.clone(),
                ))
            }
            "mysql" => {
                let url = settings
                    .store
                    .mysql_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("store.mysql_url is required for the mysql backend"))?;
                let mysql_pool = Pool::<MySql>::connect(url)
                    .await
                    .context("connecting to mysql")?;
                pool = Some(mysql_pool.clone());
                Arc::new(MySqlVerifierStore::new(mysql_pool))
            }
            other => return Err(anyhow!("Unknown store backend: {}", other)),
        };

        let auth = &settings.auth;
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs512Codec::new(JwtConfig {
            access_ttl: Duration::from_secs(auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(auth.refresh_ttl_secs),
            leeway: Duration::from_secs(auth.leeway_secs),
            signing_key: auth.secret_key.0.clone().into_bytes(),
        })?);
        if auth.access_ttl_secs >= auth.refresh_ttl_secs {
            warn!(
                access_ttl_secs = auth.access_ttl_secs,
                refresh_ttl_secs = auth.refresh_ttl_secs,
                "access tokens outlive refresh tokens"
            );
        }

        let verifier_hasher: Arc<dyn VerifierHasher> =
            Arc::new(Argon2VerifierHasher::new(&Argon2Config {
                memory_kib: settings.verifier.memory_kib,
                iterations: settings.verifier.iterations,
                parallelism: settings.verifier.parallelism,
            })?);

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            token_codec,
            verifier_hasher,
            verifier_store.clone(),
            AuthServiceConfig {
                store_timeout: Duration::from_millis(auth.store_timeout_ms),
                single_use_refresh: auth.single_use_refresh,
            },
        ));

        let cancel = CancellationToken::new();
        let sweeper = Sweeper::new(
            verifier_store,
            Duration::from_secs(settings.store.purge_interval_secs.max(1)),
            cancel.clone(),
        );
        let sweeper_handle = tokio::spawn(async move {
            sweeper.run().await;
        });

        info!(
            backend = %settings.store.backend,
            single_use_refresh = auth.single_use_refresh,
            "server started"
        );

        Ok(Self {
            auth_service,
            request_timeout: Duration::from_millis(settings.http.request_timeout_ms),
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            cancel,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self.sweeper_handle.lock().ok().and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::SubjectId;
    use crate::settings::parse_settings;

    #[tokio::test]
    async fn memory_backend_serves_issue_and_refresh() {
        let mut settings = parse_settings(Some("settings/dev.toml")).unwrap();
        settings.verifier.memory_kib = 64;
        settings.verifier.iterations = 1;
        let server = Server::try_new(&settings).await.unwrap();

        let tokens = server
            .auth_service
            .issue_tokens(&SubjectId::from("1"))
            .await
            .unwrap();
        server
            .auth_service
            .refresh_tokens(&tokens.access_token.0, &tokens.refresh_token.0)
            .await
            .unwrap();
        server.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_backend_is_refused() {
        let mut settings = parse_settings(Some("settings/dev.toml")).unwrap();
        settings.store.backend = "mongo".to_string();
        assert!(Server::try_new(&settings).await.is_err());
    }

    #[tokio::test]
    async fn empty_secret_is_refused() {
        let mut settings = parse_settings(Some("settings/dev.toml")).unwrap();
        settings.auth.secret_key.0.clear();
        assert!(Server::try_new(&settings).await.is_err());
    }
}
