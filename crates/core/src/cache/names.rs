//! Versioned partition naming.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three logical partitions a worker version owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    Static,
    Dynamic,
    Api,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] = [PartitionKind::Static, PartitionKind::Dynamic, PartitionKind::Api];

    pub fn as_str(self) -> &'static str {
        match self {
            PartitionKind::Static => "static",
            PartitionKind::Dynamic => "dynamic",
            PartitionKind::Api => "api",
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition names for one namespace at one version, `{namespace}-{kind}-{version}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNames {
    namespace: String,
    version: String,
}

impl PartitionNames {
    pub fn new(namespace: &str, version: &str) -> Self {
        Self { namespace: namespace.to_string(), version: version.to_string() }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self, kind: PartitionKind) -> String {
        format!("{}-{}-{}", self.namespace, kind, self.version)
    }

    pub fn static_name(&self) -> String {
        self.name(PartitionKind::Static)
    }

    pub fn dynamic_name(&self) -> String {
        self.name(PartitionKind::Dynamic)
    }

    pub fn api_name(&self) -> String {
        self.name(PartitionKind::Api)
    }

    /// The live partition names for this version.
    pub fn current(&self) -> Vec<String> {
        PartitionKind::ALL.iter().map(|k| self.name(*k)).collect()
    }

    pub fn is_current(&self, name: &str) -> bool {
        PartitionKind::ALL.iter().any(|k| self.name(*k) == name)
    }

    /// Whether `name` belongs to this application at any version.
    pub fn is_owned(&self, name: &str) -> bool {
        name.strip_prefix(self.namespace.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Owned partitions from other versions, i.e. what activation removes.
    pub fn stale<'a>(&self, existing: &'a [String]) -> Vec<&'a str> {
        existing
            .iter()
            .map(String::as_str)
            .filter(|name| self.is_owned(name) && !self.is_current(name))
            .collect()
    }
}
