//! Resolve Azure Key Vault resource identifiers to data-plane URIs and back.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use tokio_util::sync::CancellationToken;
//! use vaultref::{ArmVaultsClient, VaultResolver};
//!
//! let config = vaultref::config::load_config()?;
//! let client = ArmVaultsClient::new(&config, "<access token>")?;
//! let resolver = VaultResolver::from_config(client, &config);
//!
//! let cancel = CancellationToken::new();
//! let uri = resolver
//!     .resolve_base_url(
//!         "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/kv",
//!         &cancel,
//!     )
//!     .await?;
//! let id = resolver.resolve_identifier_by_url(&uri, &cancel).await?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod resolve;

pub use client::{ArmVaultsClient, ClientBuildError, VaultApiError, VaultsClient};
pub use resolve::{ResolveError, VaultResolver};
pub use vaultref_core::{config, diagnostic, record, resource_id};
