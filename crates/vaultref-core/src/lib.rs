//! Shared types for Key Vault identifier resolution.
//!
//! This crate has no network dependencies: it parses resource identifiers,
//! models the control-plane records a resolver reads, defines the diagnostic
//! sink used by reverse lookups, and loads resolver configuration.

pub mod config;
pub mod diagnostic;
pub mod record;
pub mod resource_id;

/// Resource type segment that names a vault inside a resource identifier.
pub const VAULTS_SEGMENT: &str = "vaults";

/// Provider namespace for Key Vault resources.
pub const KEY_VAULT_PROVIDER: &str = "Microsoft.KeyVault";

/// Upper bound on the page size requested from list endpoints.
///
/// Larger pages are rejected or truncated by the service and increase
/// per-request latency.
pub const MAX_PAGE_SIZE: u32 = 1000;
