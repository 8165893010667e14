//! Control-plane vault records.
//!
//! These mirror the subset of the Azure Resource Manager JSON shape that
//! identifier resolution reads. Every field is optional because the service
//! is allowed to return partially-populated entries, especially from list
//! endpoints.

use serde::{Deserialize, Serialize};

/// A vault as returned by a point lookup or a list page entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VaultRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub properties: Option<VaultProperties>,
}

/// Vault properties. Only present on point lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VaultProperties {
    #[serde(default, rename = "vaultUri")]
    pub vault_uri: Option<String>,
    #[serde(default, rename = "tenantId")]
    pub tenant_id: Option<String>,
}

impl VaultRecord {
    /// Data-plane base URI, if the record carries a non-empty one.
    pub fn vault_uri(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.vault_uri.as_deref())
            .filter(|uri| !uri.is_empty())
    }
}

/// One page of a paginated vault enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VaultPage {
    #[serde(default)]
    pub value: Vec<VaultRecord>,
    /// Absolute URL of the next page. Absent on the last page.
    #[serde(
        default,
        rename = "nextLink",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_link: Option<String>,
}

impl VaultPage {
    /// Whether a non-empty continuation link follows this page.
    pub fn has_more(&self) -> bool {
        self.next_link.as_deref().is_some_and(|link| !link.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_deserialize_point_lookup() {
        let json = r#"{
            "id": "/subscriptions/s1/resourceGroups/rg-app/providers/Microsoft.KeyVault/vaults/kv-app",
            "name": "kv-app",
            "type": "Microsoft.KeyVault/vaults",
            "location": "westeurope",
            "properties": {
                "vaultUri": "https://kv-app.vault.azure.net/",
                "tenantId": "t1",
                "sku": { "family": "A", "name": "standard" }
            }
        }"#;
        let record: VaultRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name.as_deref(), Some("kv-app"));
        assert_eq!(record.vault_uri(), Some("https://kv-app.vault.azure.net/"));
    }

    #[test]
    fn record_deserialize_list_entry_without_properties() {
        let json = r#"{"id": "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/kv", "name": "kv"}"#;
        let record: VaultRecord = serde_json::from_str(json).unwrap();
        assert!(record.properties.is_none());
        assert!(record.vault_uri().is_none());
    }

    #[test]
    fn empty_vault_uri_is_treated_as_missing() {
        let record = VaultRecord {
            properties: Some(VaultProperties {
                vault_uri: Some(String::new()),
                tenant_id: None,
            }),
            ..Default::default()
        };
        assert!(record.vault_uri().is_none());
    }

    #[test]
    fn page_deserialize_with_next_link() {
        let json = r#"{
            "value": [{"id": "a"}, {"name": "b"}],
            "nextLink": "https://management.azure.com/subscriptions/s1/resources?$skiptoken=x"
        }"#;
        let page: VaultPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.value.len(), 2);
        assert!(page.has_more());
    }

    #[test]
    fn page_deserialize_last_page() {
        let page: VaultPage = serde_json::from_str(r#"{"value": []}"#).unwrap();
        assert!(page.value.is_empty());
        assert!(!page.has_more());

        let page: VaultPage = serde_json::from_str(r#"{"value": [], "nextLink": ""}"#).unwrap();
        assert!(!page.has_more());
    }
}
