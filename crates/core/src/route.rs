//! Request classification.
//!
//! `classify` is a pure function of request metadata. Order is fixed:
//! scheme filter, API prefix, static asset, navigation, everything else.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::RequestInfo;
use crate::cache::PartitionKind;

/// Traffic class assigned to an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrafficClass {
    Api,
    StaticAsset,
    Navigation,
    Other,
}

impl TrafficClass {
    /// Partition the class reads from (and, except `Other`, writes to).
    pub fn partition(self) -> PartitionKind {
        match self {
            TrafficClass::Api => PartitionKind::Api,
            TrafficClass::StaticAsset => PartitionKind::Static,
            TrafficClass::Navigation | TrafficClass::Other => PartitionKind::Dynamic,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrafficClass::Api => "api",
            TrafficClass::StaticAsset => "static_asset",
            TrafficClass::Navigation => "navigation",
            TrafficClass::Other => "other",
        }
    }
}

impl fmt::Display for TrafficClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path prefixes driving classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRules {
    pub api_prefix: String,
    pub assets_prefix: String,
}

impl Default for RouteRules {
    fn default() -> Self {
        Self { api_prefix: "/api/".into(), assets_prefix: "/assets/".into() }
    }
}

/// Classify a request. `None` means the worker does not intercept it at all.
pub fn classify(request: &RequestInfo, rules: &RouteRules) -> Option<TrafficClass> {
    if !matches!(request.url.scheme(), "http" | "https") {
        return None;
    }

    let path = request.url.path();

    let class = if path.starts_with(&rules.api_prefix) {
        TrafficClass::Api
    } else if request.destination.is_static_asset() || path.starts_with(&rules.assets_prefix) {
        TrafficClass::StaticAsset
    } else if request.mode == crate::RequestMode::Navigate {
        TrafficClass::Navigation
    } else {
        TrafficClass::Other
    };

    Some(class)
}
