//! Resource identifier parsing.
//!
//! Parses control-plane identifiers of the form
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}...`
//! into a [`ResourceIdentifier`]. Parsing is purely structural: it never
//! checks that the named resource exists.

use std::fmt;
use std::str::FromStr;

const SUBSCRIPTIONS_KEY: &str = "subscriptions";
const RESOURCE_GROUPS_KEY: &str = "resourceGroups";
const PROVIDERS_KEY: &str = "providers";

/// Errors returned by [`ResourceIdentifier::parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("resource identifier is empty")]
    Empty,

    #[error("resource identifier '{0}' has an odd number of path components")]
    OddComponents(String),

    #[error("resource identifier '{0}' contains an empty path component")]
    EmptyComponent(String),

    #[error("no subscription id found in resource identifier '{0}'")]
    MissingSubscription(String),

    #[error("no resource group name found in resource identifier '{0}'")]
    MissingResourceGroup(String),
}

/// A parsed control-plane resource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentifier {
    raw: String,
    subscription_id: String,
    resource_group: String,
    provider: Option<String>,
    path: Vec<(String, String)>,
}

impl ResourceIdentifier {
    /// Parse a raw identifier string.
    ///
    /// The first `subscriptions`, `resourceGroups` and `providers` pairs
    /// populate the scope; any later pair with one of those keys stays in
    /// [`path`](Self::path) in order. For an extension resource such as
    /// `.../vaults/kv/providers/Microsoft.Insights/diagnosticSettings/d`
    /// the provider is therefore the parent's `Microsoft.KeyVault`.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        let components: Vec<&str> = trimmed.split('/').collect();
        if components.len() % 2 != 0 {
            return Err(ParseError::OddComponents(raw.to_owned()));
        }

        let mut subscription_id = None;
        let mut resource_group = None;
        let mut provider = None;
        let mut path = Vec::new();

        for pair in components.chunks_exact(2) {
            let (key, value) = (pair[0], pair[1]);
            if key.is_empty() || value.is_empty() {
                return Err(ParseError::EmptyComponent(raw.to_owned()));
            }

            if key == SUBSCRIPTIONS_KEY && subscription_id.is_none() {
                subscription_id = Some(value.to_owned());
            } else if key.eq_ignore_ascii_case(RESOURCE_GROUPS_KEY) && resource_group.is_none() {
                resource_group = Some(value.to_owned());
            } else if key == PROVIDERS_KEY && provider.is_none() {
                provider = Some(value.to_owned());
            } else {
                path.push((key.to_owned(), value.to_owned()));
            }
        }

        let subscription_id =
            subscription_id.ok_or_else(|| ParseError::MissingSubscription(raw.to_owned()))?;
        let resource_group =
            resource_group.ok_or_else(|| ParseError::MissingResourceGroup(raw.to_owned()))?;

        Ok(Self {
            raw: raw.to_owned(),
            subscription_id,
            resource_group,
            provider,
            path,
        })
    }

    /// The identifier exactly as it was supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    /// Provider namespace of the first `providers` pair, e.g. `Microsoft.KeyVault`.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Resource path pairs after the provider, in the order they appeared.
    pub fn path(&self) -> &[(String, String)] {
        &self.path
    }

    /// Look up the resource name for a resource type segment.
    ///
    /// Returns the first occurrence when a type repeats.
    pub fn path_segment(&self, resource_type: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(key, _)| key == resource_type)
            .map(|(_, value)| value.as_str())
    }
}

impl FromStr for ResourceIdentifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
