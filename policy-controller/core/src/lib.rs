#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
mod selector;
mod verdict;

pub use self::{
    labels::Labels,
    selector::{PolicyRef, SelectorSet},
    verdict::{validate, Conflict, Verdict},
};
use std::time::Duration;
use thiserror::Error;

/// Discovers the label selectors currently claimed by isolation policies.
///
/// Each call reflects the cluster state at the time of the call; implementations
/// must not cache results between calls.
#[async_trait::async_trait]
pub trait DiscoverSelectors: Send + Sync {
    async fn selectors(&self) -> Result<SelectorSet, ClusterQueryError>;
}

#[derive(Debug, Error)]
pub enum ClusterQueryError {
    #[error("failed to list network policies: {0}")]
    List(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("timed out listing network policies after {0:?}")]
    Timeout(Duration),
}

/// Determines how admission proceeds when the policy selectors cannot be
/// discovered.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FailurePolicy {
    /// Requests are denied.
    #[default]
    Closed,

    /// Requests are allowed, with a warning attached to the response.
    Open,
}

#[derive(Debug, Error)]
#[error("invalid failure policy: {0}; expected 'open' or 'closed'")]
pub struct InvalidFailurePolicy(String);

// === impl FailurePolicy ===

impl std::str::FromStr for FailurePolicy {
    type Err = InvalidFailurePolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "closed" | "fail-closed" => Ok(Self::Closed),
            "open" | "fail-open" => Ok(Self::Open),
            s => Err(InvalidFailurePolicy(s.to_string())),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
        }
    }
}

// === impl ClusterQueryError ===

impl ClusterQueryError {
    pub fn list<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::List(Box::new(error))
    }
}
