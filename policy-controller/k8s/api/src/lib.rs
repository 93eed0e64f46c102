#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod network_policy;

pub use self::network_policy::{aggregate, ClusterSelectors};
pub use k8s_openapi::{
    api::{
        core::v1::Pod,
        networking::v1::{NetworkPolicy, NetworkPolicySpec},
    },
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
pub use kube::{
    api::{Api, ListParams, ObjectMeta, ResourceExt},
    Client,
};
