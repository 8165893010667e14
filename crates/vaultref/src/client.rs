//! Key Vault control-plane client.
//!
//! [`VaultsClient`] is the seam the resolver talks through: one point lookup
//! and a paginated enumeration. [`ArmVaultsClient`] implements it against the
//! Azure Resource Manager REST API.
//!
//! **Never** leaks raw API error bodies to callers. Statuses are mapped to
//! [`VaultApiError`] variants.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::de::DeserializeOwned;
use vaultref_core::KEY_VAULT_PROVIDER;
use vaultref_core::config::{ConfigError, ResolverConfig, validate_url_scheme};
use vaultref_core::record::{VaultPage, VaultRecord};

/// Resource type filter for the generic resource listing.
const VAULT_RESOURCE_TYPE_FILTER: &str = "resourceType eq 'Microsoft.KeyVault/vaults'";

/// Control-plane API error types. Raw API responses are never exposed.
#[derive(Debug, thiserror::Error)]
pub enum VaultApiError {
    #[error("network error communicating with the management API")]
    Network(#[source] reqwest::Error),

    #[error("management API authentication failed (check token permissions)")]
    Unauthorized,

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("management API rate limit exceeded")]
    RateLimited,

    #[error("management API server error")]
    ServerError,

    #[error("unexpected management API response: status {0}")]
    UnexpectedStatus(u16),

    #[error("refusing to follow next link outside the management endpoint: {0}")]
    ForeignNextLink(String),
}

impl VaultApiError {
    /// Whether the service reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultApiError::NotFound(_))
    }

    /// Returns `true` if the request may succeed when repeated later.
    ///
    /// Transient: network issues, rate limits, server errors.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VaultApiError::Network(_) | VaultApiError::RateLimited | VaultApiError::ServerError
        )
    }
}

/// Boxed future returned by [`VaultsClient`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, VaultApiError>> + Send + 'a>>;

/// Remote operations the resolver needs from the control plane.
pub trait VaultsClient: Send + Sync + fmt::Debug {
    /// Point lookup of a single vault by resource group and name.
    fn get<'a>(&'a self, resource_group: &'a str, name: &'a str) -> ApiFuture<'a, VaultRecord>;

    /// First page of all vaults visible to the caller, at most `top` entries.
    fn list(&self, top: u32) -> ApiFuture<'_, VaultPage>;

    /// Fetch the page behind a `nextLink` returned by a previous page.
    fn list_next<'a>(&'a self, next_link: &'a str) -> ApiFuture<'a, VaultPage>;
}

/// Errors constructing an [`ArmVaultsClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client")]
    Http(#[source] reqwest::Error),
}

/// Percent-encode a single URL path component.
fn percent_encode_component(input: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        let safe = b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~');
        if safe {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

/// Azure Resource Manager client for `Microsoft.KeyVault/vaults`.
///
/// The bearer token is supplied by the caller at construction and never
/// appears in `Debug` output.
#[derive(Clone)]
pub struct ArmVaultsClient {
    http: reqwest::Client,
    base_url: String,
    subscription_id: String,
    api_version: String,
    list_api_version: String,
    access_token: String,
}

impl fmt::Debug for ArmVaultsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArmVaultsClient")
            .field("base_url", &self.base_url)
            .field("subscription_id", &self.subscription_id)
            .field("api_version", &self.api_version)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl ArmVaultsClient {
    /// Build the user-agent string from crate version.
    fn user_agent() -> String {
        format!("vaultref/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Create a client for the subscription named in `config`.
    pub fn new(
        config: &ResolverConfig,
        access_token: impl Into<String>,
    ) -> Result<Self, ClientBuildError> {
        validate_url_scheme(&config.management_url)?;
        let subscription_id = config.require_subscription()?.to_owned();

        let http = reqwest::Client::builder()
            .user_agent(Self::user_agent())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ClientBuildError::Http)?;

        Ok(Self {
            http,
            base_url: config.management_url.trim_end_matches('/').to_owned(),
            subscription_id,
            api_version: config.api_version.clone(),
            list_api_version: config.list_api_version.clone(),
            access_token: access_token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn vault_url(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}/vaults/{}",
            self.base_url,
            percent_encode_component(&self.subscription_id),
            percent_encode_component(resource_group),
            KEY_VAULT_PROVIDER,
            percent_encode_component(name),
        )
    }

    fn resources_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/resources",
            self.base_url,
            percent_encode_component(&self.subscription_id),
        )
    }

    /// Whether a `nextLink` points back at the configured endpoint.
    fn is_own_link(&self, link: &str) -> bool {
        link.strip_prefix(&self.base_url)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
    }

    /// Send a request and decode a 200 body, mapping every other status.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: impl FnOnce() -> String,
    ) -> Result<T, VaultApiError> {
        let resp = request
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(VaultApiError::Network)?;

        match resp.status().as_u16() {
            200 => resp.json::<T>().await.map_err(VaultApiError::Network),
            401 | 403 => Err(VaultApiError::Unauthorized),
            404 => Err(VaultApiError::NotFound(what())),
            429 => Err(VaultApiError::RateLimited),
            500..=599 => Err(VaultApiError::ServerError),
            other => Err(VaultApiError::UnexpectedStatus(other)),
        }
    }

    /// Read a single vault.
    pub async fn get_vault(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<VaultRecord, VaultApiError> {
        tracing::debug!(resource_group, name, "reading key vault");
        let request = self
            .http
            .get(self.vault_url(resource_group, name))
            .query(&[("api-version", self.api_version.as_str())]);
        self.send_json(request, || {
            format!("key vault '{name}' (resource group '{resource_group}')")
        })
        .await
    }

    /// List the first page of key vaults in the subscription.
    pub async fn list_vaults(&self, top: u32) -> Result<VaultPage, VaultApiError> {
        tracing::debug!(top, "listing key vaults");
        let top = top.to_string();
        let request = self.http.get(self.resources_url()).query(&[
            ("$filter", VAULT_RESOURCE_TYPE_FILTER),
            ("$top", top.as_str()),
            ("api-version", self.list_api_version.as_str()),
        ]);
        self.send_json(request, || "key vault listing".to_owned()).await
    }

    /// Follow a `nextLink` from a previous page.
    pub async fn list_vaults_next(&self, next_link: &str) -> Result<VaultPage, VaultApiError> {
        if !self.is_own_link(next_link) {
            return Err(VaultApiError::ForeignNextLink(next_link.to_owned()));
        }
        tracing::debug!(next_link, "advancing key vault listing");
        let request = self.http.get(next_link);
        self.send_json(request, || "key vault listing page".to_owned())
            .await
    }
}

impl VaultsClient for ArmVaultsClient {
    fn get<'a>(&'a self, resource_group: &'a str, name: &'a str) -> ApiFuture<'a, VaultRecord> {
        Box::pin(self.get_vault(resource_group, name))
    }

    fn list(&self, top: u32) -> ApiFuture<'_, VaultPage> {
        Box::pin(self.list_vaults(top))
    }

    fn list_next<'a>(&'a self, next_link: &'a str) -> ApiFuture<'a, VaultPage> {
        Box::pin(self.list_vaults_next(next_link))
    }
}
