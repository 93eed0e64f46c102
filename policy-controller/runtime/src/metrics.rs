use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{
        counter::Counter,
        family::Family,
        histogram::{exponential_buckets, Histogram},
    },
    registry::Registry,
};
use tokio::time;

#[derive(Clone, Debug)]
pub struct AdmissionMetrics {
    requests: Family<ResultLabels, Counter>,
    query_duration: Histogram,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Allowed,
    Denied,
    Invalid,
    Error,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct ResultLabels {
    result: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let metrics = Self::default();

        reg.register(
            "requests",
            "Total number of admission reviews handled, by result",
            metrics.requests.clone(),
        );

        reg.register(
            "policy_query_duration_seconds",
            "Time taken to list network policies",
            metrics.query_duration.clone(),
        );

        metrics
    }

    pub(crate) fn record(&self, outcome: Outcome) {
        self.requests
            .get_or_create(&ResultLabels {
                result: outcome.as_str(),
            })
            .inc();
    }

    pub(crate) fn observe_query(&self, started: time::Instant) {
        self.query_duration.observe(started.elapsed().as_secs_f64());
    }

    #[cfg(test)]
    pub(crate) fn count(&self, outcome: Outcome) -> u64 {
        self.requests
            .get_or_create(&ResultLabels {
                result: outcome.as_str(),
            })
            .get()
    }
}

impl Default for AdmissionMetrics {
    fn default() -> Self {
        Self {
            requests: Family::default(),
            // 1ms to ~16s.
            query_duration: Histogram::new(exponential_buckets(0.001, 2.0, 15)),
        }
    }
}

// === impl Outcome ===

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::Invalid => "invalid",
            Self::Error => "error",
        }
    }
}
