use crate::{
    admission::Admission, core::FailurePolicy, k8s::ClusterSelectors, metrics::AdmissionMetrics,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use tokio::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "netpol-admission",
    about = "Rejects pod labels that are selected by network policies"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "netpol_admission=info,warn",
        env = "NETPOL_ADMISSION_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Whether pods are admitted (open) or denied (closed) when network
    /// policies cannot be listed.
    #[clap(long, default_value = "closed")]
    failure_policy: FailurePolicy,

    /// Limits the time spent listing network policies for a single review.
    #[clap(long, default_value = "30000")]
    admission_timeout_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            failure_policy,
            admission_timeout_ms,
        } = self;

        let mut prom = <Registry>::default();
        let metrics = AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_server(server)
            .build()
            .await?;

        let timeout = Duration::from_millis(admission_timeout_ms);
        let selectors = ClusterSelectors::new(runtime.client(), timeout);
        let admission = Admission::new(selectors, failure_policy, metrics);
        info!(%failure_policy, ?timeout, "Serving admission reviews");

        let runtime = runtime.spawn_server(admission);

        // Block the main thread on the shutdown signal. Once it fires, wait for in-flight
        // reviews to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
