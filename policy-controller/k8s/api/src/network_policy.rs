use crate::{Api, Client, ListParams, NetworkPolicy, ResourceExt};
use netpol_admission_core::{ClusterQueryError, DiscoverSelectors, PolicyRef, SelectorSet};
use tokio::time;
use tracing::{debug, trace};

/// Lists all `NetworkPolicy` resources in the cluster on every call.
#[derive(Clone)]
pub struct ClusterSelectors {
    api: Api<NetworkPolicy>,
    timeout: time::Duration,
}

/// Folds the pod selectors of the given policies into a single [`SelectorSet`].
///
/// Only `matchLabels` claim workload labels; policies with an empty selector
/// (selecting all pods in a namespace) or only `matchExpressions` contribute
/// nothing.
pub fn aggregate<I>(policies: I) -> SelectorSet
where
    I: IntoIterator<Item = NetworkPolicy>,
{
    let mut selectors = SelectorSet::default();
    for np in policies {
        let policy = PolicyRef::new(np.namespace().unwrap_or_default(), np.name_any());
        let match_labels = np
            .spec
            .and_then(|spec| spec.pod_selector.match_labels)
            .unwrap_or_default();
        trace!(%policy, labels = ?match_labels);
        selectors.extend(&policy, match_labels);
    }
    selectors
}

// === impl ClusterSelectors ===

impl ClusterSelectors {
    pub fn new(client: Client, timeout: time::Duration) -> Self {
        Self {
            api: Api::all(client),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl DiscoverSelectors for ClusterSelectors {
    async fn selectors(&self) -> Result<SelectorSet, ClusterQueryError> {
        let list = time::timeout(self.timeout, self.api.list(&ListParams::default()))
            .await
            .map_err(|_| ClusterQueryError::Timeout(self.timeout))?
            .map_err(ClusterQueryError::list)?;
        debug!(policies = list.items.len(), "Listed network policies");
        Ok(aggregate(list.items))
    }
}
