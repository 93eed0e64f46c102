use crate::{Labels, PolicyRef, SelectorSet};

/// The outcome of checking a workload's labels against policy selectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(Conflict),
}

/// A workload label that is already claimed by one or more policies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub key: String,
    pub value: String,
    pub policies: Vec<PolicyRef>,
}

/// Checks whether any of a workload's labels is selected by an isolation policy.
///
/// Labels are checked in key order and the first claimed label denies the
/// workload.
pub fn validate(labels: &Labels, selectors: &SelectorSet) -> Verdict {
    for (key, value) in labels.iter() {
        if let Some(policies) = selectors.claimants(key, value) {
            return Verdict::Deny(Conflict {
                key: key.to_string(),
                value: value.to_string(),
                policies: policies.to_vec(),
            });
        }
    }

    Verdict::Allow
}

// === impl Verdict ===

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// A human-readable explanation of the verdict. Empty when allowed.
    pub fn reason(&self) -> String {
        match self {
            Self::Allow => String::new(),
            Self::Deny(conflict) => conflict.to_string(),
        }
    }
}

// === impl Conflict ===

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "label {}:{} is used by NetworkPolicy ", self.key, self.value)?;
        for (i, policy) in self.policies.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{policy}")?;
        }
        f.write_str("; labels selected by network policies must not be edited")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    fn selectors(policies: Vec<(&str, Vec<(&str, &str)>)>) -> SelectorSet {
        let mut set = SelectorSet::default();
        for (name, labels) in policies {
            set.extend(&PolicyRef::new("default", name), labels);
        }
        set
    }

    #[test]
    fn denies_claimed_label() {
        let set = selectors(vec![("web", vec![("app", "frontend")])]);
        let labels = Labels::from_iter(Some(("app", "frontend")));

        let verdict = validate(&labels, &set);
        assert!(!verdict.is_allowed());
        assert!(verdict.reason().contains("app:frontend"), "{}", verdict.reason());
        assert!(verdict.reason().contains("default/web"), "{}", verdict.reason());
    }

    #[test]
    fn allows_unclaimed_value() {
        let set = selectors(vec![("web", vec![("app", "frontend")])]);
        let labels = Labels::from_iter(Some(("app", "backend")));

        assert_eq!(validate(&labels, &set), Verdict::Allow);
        assert_eq!(Verdict::Allow.reason(), "");
    }

    #[test]
    fn allows_anything_without_policies() {
        let set = SelectorSet::default();
        for labels in [
            Labels::default(),
            Labels::from_iter(Some(("app", "frontend"))),
            Labels::from_iter(vec![("app", "backend"), ("tier", "db")]),
        ] {
            assert!(validate(&labels, &set).is_allowed());
        }
    }

    #[test]
    fn allows_unlabeled_workload() {
        let set = selectors(vec![("web", vec![("app", "frontend")])]);
        assert!(validate(&Labels::default(), &set).is_allowed());
    }

    #[test]
    fn matches_key_and_value_exactly() {
        let set = selectors(vec![("web", vec![("app", "frontend")])]);
        for (labels, allowed, msg) in [
            (btreemap! { "app" => "frontend" }, false, "exact pair"),
            (btreemap! { "app" => "Frontend" }, true, "value case differs"),
            (btreemap! { "App" => "frontend" }, true, "key case differs"),
            (btreemap! { "name" => "frontend" }, true, "value under another key"),
            (btreemap! { "frontend" => "app" }, true, "swapped"),
        ] {
            let labels = labels.into_iter().collect::<Labels>();
            assert_eq!(validate(&labels, &set).is_allowed(), allowed, "{msg}");
        }
    }

    #[test]
    fn reports_first_conflict_in_key_order() {
        let set = selectors(vec![
            ("a", vec![("tier", "web")]),
            ("b", vec![("app", "frontend")]),
        ]);
        let labels = Labels::from_iter(vec![("tier", "web"), ("app", "frontend")]);

        match validate(&labels, &set) {
            Verdict::Deny(conflict) => {
                assert_eq!(conflict.key, "app");
                assert_eq!(conflict.value, "frontend");
                assert_eq!(conflict.policies, vec![PolicyRef::new("default", "b")]);
            }
            Verdict::Allow => panic!("workload must be denied"),
        }
    }

    #[test]
    fn denies_every_claimed_value_of_a_key() {
        let set = selectors(vec![
            ("web", vec![("app", "frontend")]),
            ("api", vec![("app", "backend")]),
        ]);

        for value in ["frontend", "backend"] {
            let labels = Labels::from_iter(vec![("app".to_string(), value.to_string())]);
            assert!(!validate(&labels, &set).is_allowed(), "{value}");
        }
    }

    #[test]
    fn is_idempotent() {
        let set = selectors(vec![("web", vec![("app", "frontend"), ("env", "prod")])]);
        let labels = Labels::from_iter(vec![("app", "frontend"), ("env", "prod")]);

        let first = validate(&labels, &set);
        let second = validate(&labels, &set);
        assert_eq!(first, second);
        assert_eq!(first.reason(), second.reason());
    }

    #[test]
    fn names_every_claiming_policy() {
        let set = selectors(vec![
            ("a", vec![("app", "frontend")]),
            ("b", vec![("app", "frontend")]),
        ]);
        let verdict = validate(&Labels::from_iter(Some(("app", "frontend"))), &set);
        assert_eq!(
            verdict.reason(),
            "label app:frontend is used by NetworkPolicy default/a, default/b; \
             labels selected by network policies must not be edited"
        );
    }
}
