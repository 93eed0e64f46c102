#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use netpol_admission_core as core;
pub use netpol_admission_k8s_api as k8s;

mod admission;
mod args;
pub mod codec;
mod metrics;

pub use self::{admission::Admission, args::Args, metrics::AdmissionMetrics};
