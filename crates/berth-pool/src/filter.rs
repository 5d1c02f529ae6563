//! Pool filters for selecting placement candidates.

use serde::{Deserialize, Serialize};

use crate::host::HostRef;

/// Selects which hosts in the pool are placement candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolFilter {
    /// Every host the provider knows about.
    All,
    /// Hosts whose tag `key` is set to one of `values`.
    Tag {
        /// Tag name to match.
        key: String,
        /// Acceptable tag values.
        values: Vec<String>,
    },
}

impl PoolFilter {
    /// Creates a tag filter.
    pub fn tag(key: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Tag {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if the host passes the filter.
    #[must_use]
    pub fn matches(&self, host: &HostRef) -> bool {
        match self {
            Self::All => true,
            Self::Tag { key, values } => host
                .tag(key)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
        }
    }
}
