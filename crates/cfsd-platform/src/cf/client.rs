//! Cloud Foundry v2 API client.
//!
//! Authenticates against UAA with the `client_credentials` grant and
//! caches the bearer token until shortly before it expires. Listings
//! follow `next_url` until the last page.

use std::time::{Duration, Instant};

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use cfsd_core::{ApiConfig, OrgUnit, RuntimeInstance, SubUnit, Workload};

use crate::api::PlatformApi;
use crate::cf::model::{
    AppEntity, AppStats, Info, OrgEntity, Page, Resource, SpaceEntity, TokenResponse,
    instances_from_stats,
};
use crate::error::{PlatformError, PlatformResult};

/// Page size requested from listing endpoints.
const RESULTS_PER_PAGE: u32 = 100;

/// Refresh the token this long before UAA says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Lifetime assumed when UAA does not report `expires_in`.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

/// Connection settings for [`CfClient`].
#[derive(Clone)]
pub struct CfClientConfig {
    pub api_address: String,
    pub client_id: String,
    pub client_secret: String,
    pub skip_ssl: bool,
    pub request_timeout: Duration,
}

impl From<&ApiConfig> for CfClientConfig {
    fn from(api: &ApiConfig) -> Self {
        Self {
            api_address: api.address.clone(),
            client_id: api.client_id.clone(),
            client_secret: api.client_secret.clone(),
            skip_ssl: api.skip_ssl,
            request_timeout: api.request_timeout,
        }
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

/// Client for the Cloud Foundry v2 REST API.
pub struct CfClient {
    http: reqwest::Client,
    api_address: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl CfClient {
    /// Resolve the UAA endpoint and acquire an initial token.
    ///
    /// Fails if the API is unreachable or the credentials are rejected.
    pub async fn connect(config: CfClientConfig) -> PlatformResult<Self> {
        if config.skip_ssl {
            warn!("TLS certificate verification disabled for platform API");
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.skip_ssl)
            .user_agent(concat!("cfsd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PlatformError::Client)?;

        let api_address = config.api_address.trim_end_matches('/').to_string();
        let info_url = format!("{api_address}/v2/info");
        let response = http
            .get(&info_url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| PlatformError::Http {
                url: info_url.clone(),
                source,
            })?;
        let info: Info = decode(&info_url, response).await?;

        let client = Self {
            http,
            token_url: format!("{}/oauth/token", info.token_endpoint.trim_end_matches('/')),
            api_address,
            client_id: config.client_id,
            client_secret: config.client_secret,
            token: Mutex::new(None),
        };

        client.bearer().await?;
        info!(api = %client.api_address, "connected to platform API");
        Ok(client)
    }

    /// Base URL of the API this client talks to.
    pub fn api_address(&self) -> &str {
        &self.api_address
    }

    /// Current bearer token, fetching a new one if the cached one is stale.
    async fn bearer(&self) -> PlatformResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn request_token(&self) -> PlatformResult<CachedToken> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(ACCEPT, "application/json")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|source| PlatformError::Http {
                url: self.token_url.clone(),
                source,
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PlatformError::Auth(format!(
                "token endpoint rejected client {} ({status})",
                self.client_id
            )));
        }

        let token: TokenResponse = decode(&self.token_url, response).await?;
        let ttl = match token.expires_in {
            0 => DEFAULT_TOKEN_TTL,
            secs => Duration::from_secs(secs),
        };
        debug!(ttl_secs = ttl.as_secs(), "acquired platform API token");

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + ttl,
        })
    }

    /// Authenticated GET decoding a JSON body.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> PlatformResult<T> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| PlatformError::Http {
                url: url.to_string(),
                source,
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            // Revoked or expired early; the next call fetches a new token.
            self.token.lock().await.take();
        }

        decode(url, response).await
    }

    /// Walk every page of a v2 listing.
    async fn list_all<E: DeserializeOwned>(&self, path: &str) -> PlatformResult<Vec<Resource<E>>> {
        let mut url = format!("{}{path}?results-per-page={RESULTS_PER_PAGE}", self.api_address);
        let mut resources = Vec::new();
        let mut pages = 0u32;

        loop {
            let page: Page<E> = self.get_json(&url).await?;
            pages += 1;
            resources.extend(page.resources);

            match page.next_url {
                Some(next) if !next.is_empty() => url = format!("{}{next}", self.api_address),
                _ => break,
            }
        }

        debug!(path, pages, resources = resources.len(), "listing complete");
        Ok(resources)
    }
}

impl PlatformApi for CfClient {
    async fn list_workloads(&self) -> PlatformResult<Vec<Workload>> {
        let apps = self.list_all::<AppEntity>("/v2/apps").await?;
        Ok(apps.into_iter().map(Workload::from).collect())
    }

    async fn list_org_units(&self) -> PlatformResult<Vec<OrgUnit>> {
        let orgs = self.list_all::<OrgEntity>("/v2/organizations").await?;
        Ok(orgs.into_iter().map(OrgUnit::from).collect())
    }

    async fn list_sub_units(&self) -> PlatformResult<Vec<SubUnit>> {
        let spaces = self.list_all::<SpaceEntity>("/v2/spaces").await?;
        Ok(spaces.into_iter().map(SubUnit::from).collect())
    }

    async fn fetch_runtime_instances(&self, workload_id: &str) -> PlatformResult<Vec<RuntimeInstance>> {
        let url = format!("{}/v2/apps/{workload_id}/stats", self.api_address);
        let stats: AppStats = self.get_json(&url).await?;
        Ok(instances_from_stats(stats))
    }
}

/// Check the status and decode a JSON body.
async fn decode<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> PlatformResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(PlatformError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(|source| PlatformError::Http {
        url: url.to_string(),
        source,
    })?;

    serde_json::from_slice(&body).map_err(|source| PlatformError::Decode {
        url: url.to_string(),
        source,
    })
}
