//! GitHub App authentication: app JWTs, installation tokens, and the lazy
//! push-domain capability handed to benchmark delegates.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::github_api_client::{BenchGithubApi, GithubApiClient, GithubClientSettings};

pub const DEFAULT_GITHUB_HOST: &str = "github.com";

const APP_JWT_BACKDATE_SECONDS: i64 = 60;
const APP_JWT_LIFETIME_SECONDS: i64 = 9 * 60;

/// Mints short-lived tokens scoped to one installation.
#[async_trait]
pub trait InstallationTokenIssuer: Send + Sync {
    async fn issue_installation_token(&self, installation_id: u64) -> Result<String>;
}

/// Opens GitHub API sessions authorized for an installation, or as the app
/// itself when the delivery carried no installation.
#[async_trait]
pub trait GithubApiConnector: Send + Sync {
    async fn connect(&self, installation_id: Option<u64>) -> Result<Arc<dyn BenchGithubApi>>;
}

#[derive(Clone)]
/// Token plus authenticated git host URL used for clone/fetch/push.
pub struct PushDomain {
    pub url: String,
    pub token: String,
    pub host: String,
}

impl PushDomain {
    /// Clone URL of `owner/repo` on the same host with no credentials in it.
    pub fn public_repo_url(&self, owner: &str, repo: &str) -> String {
        format!("https://{}/{owner}/{repo}.git", self.host)
    }
}

impl fmt::Debug for PushDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushDomain")
            .field("url", &format!("https://x-access-token:***@{}", self.host))
            .field("token", &"***")
            .field("host", &self.host)
            .finish()
    }
}

pub fn push_domain_url(host: &str, token: &str) -> String {
    format!("https://x-access-token:{token}@{host}")
}

#[derive(Clone)]
/// Lazy credential capability bound to one installation. A fresh token is
/// requested on every [`PushDomainProvider::resolve`] call.
pub struct PushDomainProvider {
    issuer: Arc<dyn InstallationTokenIssuer>,
    installation_id: u64,
    host: String,
}

impl PushDomainProvider {
    pub fn new(
        issuer: Arc<dyn InstallationTokenIssuer>,
        installation_id: u64,
        host: impl Into<String>,
    ) -> Self {
        Self {
            issuer,
            installation_id,
            host: host.into(),
        }
    }

    pub fn installation_id(&self) -> u64 {
        self.installation_id
    }

    pub async fn resolve(&self) -> Result<PushDomain> {
        let token = self
            .issuer
            .issue_installation_token(self.installation_id)
            .await
            .with_context(|| {
                format!(
                    "failed to issue token for installation {}",
                    self.installation_id
                )
            })?;
        Ok(PushDomain {
            url: push_domain_url(&self.host, &token),
            token,
            host: self.host.clone(),
        })
    }
}

impl fmt::Debug for PushDomainProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushDomainProvider")
            .field("installation_id", &self.installation_id)
            .field("host", &self.host)
            .finish()
    }
}

#[derive(Clone)]
/// Long-lived GitHub App identity loaded at startup.
pub struct GithubAppCredentials {
    pub app_id: u64,
    pub client_id: String,
    pub client_secret: String,
    pub private_key_pem: String,
}

impl fmt::Debug for GithubAppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubAppCredentials")
            .field("app_id", &self.app_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("private_key_pem", &"***")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct AppJwtClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

pub struct GithubAppAuth {
    app_id: u64,
    encoding_key: EncodingKey,
    api_base: String,
    settings: GithubClientSettings,
}

impl GithubAppAuth {
    pub fn new(
        credentials: &GithubAppCredentials,
        api_base: &str,
        settings: GithubClientSettings,
    ) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(credentials.private_key_pem.as_bytes())
            .context("failed to parse github app private key (expected RSA PEM)")?;
        Ok(Self {
            app_id: credentials.app_id,
            encoding_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            settings,
        })
    }

    pub fn app_jwt(&self) -> Result<String> {
        self.app_jwt_at(chrono::Utc::now().timestamp())
    }

    fn app_jwt_at(&self, now_unix_seconds: i64) -> Result<String> {
        let claims = AppJwtClaims {
            iat: now_unix_seconds - APP_JWT_BACKDATE_SECONDS,
            exp: now_unix_seconds + APP_JWT_LIFETIME_SECONDS,
            iss: self.app_id.to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .context("failed to sign github app jwt")
    }

    fn app_client(&self) -> Result<GithubApiClient> {
        GithubApiClient::new(&self.api_base, &self.app_jwt()?, self.settings)
    }
}

#[async_trait]
impl InstallationTokenIssuer for GithubAppAuth {
    async fn issue_installation_token(&self, installation_id: u64) -> Result<String> {
        let issued = self
            .app_client()?
            .create_installation_access_token(installation_id)
            .await?;
        tracing::debug!(
            installation_id,
            expires_at = issued.expires_at.as_deref().unwrap_or("unknown"),
            "issued installation token"
        );
        Ok(issued.token)
    }
}

#[async_trait]
impl GithubApiConnector for GithubAppAuth {
    async fn connect(&self, installation_id: Option<u64>) -> Result<Arc<dyn BenchGithubApi>> {
        let client = match installation_id {
            Some(installation_id) => {
                let token = self.issue_installation_token(installation_id).await?;
                GithubApiClient::new(&self.api_base, &token, self.settings)?
            }
            None => self.app_client()?,
        };
        Ok(Arc::new(client))
    }
}
