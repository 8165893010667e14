//! Key Vault identifier resolution.
//!
//! Translates between a vault's control-plane resource identifier and its
//! data-plane base URI:
//!
//! - [`VaultResolver::resolve_base_url`]: identifier → URI. Absence is an error.
//! - [`VaultResolver::exists`]: identifier → bool. Absence is `false`.
//! - [`VaultResolver::resolve_identifier_by_url`]: URI → identifier, by
//!   scanning every vault visible to the caller. Absence is `None`.
//!
//! The forward lookups validate their input before touching the network.
//! The reverse scan tolerates unusable candidates (reported to the
//! [`DiagnosticSink`]) and only fails when the enumeration itself fails.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use vaultref_core::config::ResolverConfig;
use vaultref_core::diagnostic::{DiagnosticSink, SkipEvent, SkipReason, TracingDiagnostics};
use vaultref_core::record::{VaultPage, VaultRecord};
use vaultref_core::resource_id::{ParseError, ResourceIdentifier};
use vaultref_core::{MAX_PAGE_SIZE, VAULTS_SEGMENT};

use crate::client::{ApiFuture, VaultApiError, VaultsClient};

/// Errors from identifier resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("key vault identifier is empty")]
    EmptyIdentifier,

    #[error(transparent)]
    MalformedIdentifier(#[from] ParseError),

    #[error("resource identifier does not contain `{segment}`: {id:?}")]
    MissingPathSegment { id: String, segment: &'static str },

    #[error("unable to find key vault '{name}' (resource group '{resource_group}')")]
    NotFound {
        resource_group: String,
        name: String,
        #[source]
        source: VaultApiError,
    },

    #[error("key vault ({id}) response properties or vault URI is missing")]
    InconsistentRecord { id: String },

    #[error("{operation} request failed for {context}: {source}")]
    TransientApi {
        operation: &'static str,
        context: String,
        #[source]
        source: VaultApiError,
    },

    #[error("key vault lookup cancelled")]
    Cancelled,
}

/// Outcome of a point lookup that passed input validation.
enum PointLookup {
    Found(String),
    Absent {
        resource_group: String,
        name: String,
        source: VaultApiError,
    },
}

/// States of a reverse-lookup scan. Fatal errors leave the loop via `?`.
enum ScanState {
    Scanning(VaultPage),
    Advancing(String),
    Matched(ResourceIdentifier),
    Exhausted,
}

/// Race a remote call against cancellation.
async fn cancellable<T>(
    cancel: &CancellationToken,
    call: ApiFuture<'_, T>,
) -> Result<Result<T, VaultApiError>, ResolveError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ResolveError::Cancelled),
        result = call => Ok(result),
    }
}

fn vault_context(resource_group: &str, name: &str) -> String {
    format!("key vault '{name}' (resource group '{resource_group}')")
}

/// Validate a caller-supplied vault identifier and extract the vault name.
fn parse_vault_identifier(raw: &str) -> Result<(ResourceIdentifier, String), ResolveError> {
    if raw.is_empty() {
        return Err(ResolveError::EmptyIdentifier);
    }
    let id = ResourceIdentifier::parse(raw)?;
    let name = id
        .path_segment(VAULTS_SEGMENT)
        .ok_or_else(|| ResolveError::MissingPathSegment {
            id: raw.to_owned(),
            segment: VAULTS_SEGMENT,
        })?
        .to_owned();
    Ok((id, name))
}

/// Resolves Key Vault identifiers against a [`VaultsClient`].
///
/// Holds no mutable state; one resolver can serve concurrent callers.
#[derive(Debug)]
pub struct VaultResolver<C> {
    client: C,
    diagnostics: Arc<dyn DiagnosticSink>,
    page_size: u32,
}

impl<C: VaultsClient> VaultResolver<C> {
    /// Create a resolver that logs reverse-scan skips via `tracing`.
    pub fn new(client: C) -> Self {
        Self {
            client,
            diagnostics: Arc::new(TracingDiagnostics::new()),
            page_size: MAX_PAGE_SIZE,
        }
    }

    /// Create a resolver using the page size from `config`.
    pub fn from_config(client: C, config: &ResolverConfig) -> Self {
        Self::new(client).with_page_size(config.effective_page_size())
    }

    /// Replace the sink that receives reverse-scan skip events.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Set the enumeration page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn point_lookup(
        &self,
        raw: &str,
        cancel: &CancellationToken,
    ) -> Result<PointLookup, ResolveError> {
        let (id, name) = parse_vault_identifier(raw)?;
        let resource_group = id.resource_group();

        match cancellable(cancel, self.client.get(resource_group, &name)).await? {
            Ok(record) => record
                .vault_uri()
                .map(|uri| PointLookup::Found(uri.to_owned()))
                .ok_or_else(|| ResolveError::InconsistentRecord { id: raw.to_owned() }),
            Err(source) if source.is_not_found() => Ok(PointLookup::Absent {
                resource_group: resource_group.to_owned(),
                name,
                source,
            }),
            Err(source) => Err(ResolveError::TransientApi {
                operation: "get",
                context: vault_context(resource_group, &name),
                source,
            }),
        }
    }

    /// Resolve a vault identifier to its data-plane base URI.
    ///
    /// A vault the service reports as absent is a [`ResolveError::NotFound`].
    pub async fn resolve_base_url(
        &self,
        key_vault_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ResolveError> {
        match self.point_lookup(key_vault_id, cancel).await? {
            PointLookup::Found(uri) => Ok(uri),
            PointLookup::Absent {
                resource_group,
                name,
                source,
            } => Err(ResolveError::NotFound {
                resource_group,
                name,
                source,
            }),
        }
    }

    /// Check whether a vault exists. A vault reported absent yields `Ok(false)`.
    pub async fn exists(
        &self,
        key_vault_id: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ResolveError> {
        match self.point_lookup(key_vault_id, cancel).await? {
            PointLookup::Found(_) => Ok(true),
            PointLookup::Absent { .. } => Ok(false),
        }
    }

    /// Find the identifier of the vault whose base URI equals `key_vault_url`.
    ///
    /// Walks every page of the enumeration and returns the first candidate
    /// whose authoritative URI matches. `Ok(None)` means no vault matched;
    /// whether that is an error is the caller's decision. An empty target
    /// never matches, since empty `vaultUri` values count as absent, and
    /// returns `Ok(None)` without touching the service.
    pub async fn resolve_identifier_by_url(
        &self,
        key_vault_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceIdentifier>, ResolveError> {
        if key_vault_url.is_empty() {
            return Ok(None);
        }

        let scan_id = Uuid::new_v4();
        tracing::debug!(
            %scan_id,
            key_vault_url,
            page_size = self.page_size,
            "starting reverse key vault lookup"
        );

        let first = cancellable(cancel, self.client.list(self.page_size))
            .await?
            .map_err(|source| ResolveError::TransientApi {
                operation: "list",
                context: format!("key vault url {key_vault_url:?}"),
                source,
            })?;

        let mut pages_scanned = 0usize;
        let mut state = ScanState::Scanning(first);
        loop {
            state = match state {
                ScanState::Scanning(page) => {
                    pages_scanned += 1;
                    let more = page.has_more();
                    let VaultPage { value, next_link } = page;
                    let mut next = match next_link {
                        Some(link) if more => ScanState::Advancing(link),
                        _ => ScanState::Exhausted,
                    };
                    for entry in value {
                        if let Some(id) = self
                            .inspect_candidate(scan_id, entry, key_vault_url, cancel)
                            .await?
                        {
                            next = ScanState::Matched(id);
                            break;
                        }
                    }
                    next
                }
                ScanState::Advancing(link) => {
                    let page = cancellable(cancel, self.client.list_next(&link))
                        .await?
                        .map_err(|source| ResolveError::TransientApi {
                            operation: "list_next",
                            context: format!("key vault url {key_vault_url:?}"),
                            source,
                        })?;
                    ScanState::Scanning(page)
                }
                ScanState::Matched(id) => {
                    tracing::debug!(%scan_id, pages_scanned, id = %id, "reverse key vault lookup matched");
                    return Ok(Some(id));
                }
                ScanState::Exhausted => {
                    tracing::debug!(%scan_id, pages_scanned, "reverse key vault lookup found no match");
                    return Ok(None);
                }
            };
        }
    }

    /// Check one enumeration entry against the target URI.
    ///
    /// Only cancellation is an error here; every other failure is a skip.
    async fn inspect_candidate(
        &self,
        scan_id: Uuid,
        entry: VaultRecord,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceIdentifier>, ResolveError> {
        let Some(raw_id) = entry.id.filter(|id| !id.is_empty()) else {
            let mut event = SkipEvent::new(scan_id, SkipReason::MissingId);
            if let Some(name) = entry.name {
                event = event.with_detail(format!("list entry '{name}' has no id"));
            }
            self.diagnostics.skipped(event);
            return Ok(None);
        };

        let candidate = match ResourceIdentifier::parse(&raw_id) {
            Ok(candidate) => candidate,
            Err(e) => {
                self.diagnostics.skipped(
                    SkipEvent::new(scan_id, SkipReason::MalformedId)
                        .with_candidate_id(raw_id)
                        .with_detail(e.to_string()),
                );
                return Ok(None);
            }
        };

        let Some(name) = candidate.path_segment(VAULTS_SEGMENT) else {
            self.diagnostics.skipped(
                SkipEvent::new(scan_id, SkipReason::MissingVaultsSegment).with_candidate_id(raw_id),
            );
            return Ok(None);
        };
        let resource_group = candidate.resource_group();

        // List entries carry no usable vault properties; the point lookup is authoritative.
        let record = match cancellable(cancel, self.client.get(resource_group, name)).await? {
            Ok(record) => record,
            Err(e) => {
                self.diagnostics.skipped(
                    SkipEvent::new(scan_id, SkipReason::LookupFailed)
                        .with_candidate_id(raw_id)
                        .with_vault(resource_group, name)
                        .with_detail(e.to_string()),
                );
                return Ok(None);
            }
        };

        let (Some(authoritative_id), Some(uri)) = (record.id.as_deref(), record.vault_uri()) else {
            self.diagnostics.skipped(
                SkipEvent::new(scan_id, SkipReason::IncompleteRecord)
                    .with_candidate_id(raw_id)
                    .with_vault(resource_group, name)
                    .with_detail("point lookup returned no id, properties or vault URI"),
            );
            return Ok(None);
        };

        if uri != target {
            return Ok(None);
        }

        match ResourceIdentifier::parse(authoritative_id) {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                self.diagnostics.skipped(
                    SkipEvent::new(scan_id, SkipReason::MalformedId)
                        .with_candidate_id(authoritative_id)
                        .with_vault(resource_group, name)
                        .with_detail(e.to_string()),
                );
                Ok(None)
            }
        }
    }
}
