use std::collections::BTreeMap;

/// Identifies the policy that claimed a selector label.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyRef {
    pub namespace: String,
    pub name: String,
}

/// The union of all selector labels claimed by isolation policies.
///
/// Every `(key, value)` pair is retained along with the policies that claim it,
/// so policies that select the same key with different values do not shadow
/// one another.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectorSet {
    claims: BTreeMap<String, BTreeMap<String, Vec<PolicyRef>>>,
}

// === impl PolicyRef ===

impl PolicyRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl SelectorSet ===

impl SelectorSet {
    /// Records that `policy` selects workloads labeled `key=value`.
    pub fn insert(&mut self, policy: &PolicyRef, key: String, value: String) {
        let owners = self.claims.entry(key).or_default().entry(value).or_default();
        if !owners.contains(policy) {
            owners.push(policy.clone());
        }
    }

    /// Records every selector label of a single policy.
    pub fn extend<I, K, V>(&mut self, policy: &PolicyRef, labels: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in labels {
            self.insert(policy, k.into(), v.into());
        }
    }

    /// Returns the policies claiming `key=value`, if any.
    pub fn claimants(&self, key: &str, value: &str) -> Option<&[PolicyRef]> {
        self.claims
            .get(key)
            .and_then(|values| values.get(value))
            .map(Vec::as_slice)
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.claimants(key, value).is_some()
    }

    /// Iterates over every claimed `(key, value)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.claims
            .iter()
            .flat_map(|(k, values)| values.keys().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Returns the number of distinct `(key, value)` pairs.
    pub fn len(&self) -> usize {
        self.claims.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
