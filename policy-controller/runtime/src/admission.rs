use crate::{
    codec::{self, AdmissionRequest, AdmissionResponse},
    core::{validate, ClusterQueryError, DiscoverSelectors, FailurePolicy, Verdict},
    metrics::{AdmissionMetrics, Outcome},
};
use bytes::Bytes;
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::admission::Operation;
use std::sync::Arc;
use thiserror::Error;
use tokio::time;
use tracing::{debug, info, trace, warn};

/// Validates that pods are not labeled with labels claimed by network policies.
#[derive(Clone)]
pub struct Admission {
    selectors: Arc<dyn DiscoverSelectors>,
    failure_policy: FailurePolicy,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type Body = http_body_util::Full<Bytes>;

// === impl Admission ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            let bytes = req.into_body().collect().await?.to_bytes();
            let rsp = admission.handle(&bytes).await?;
            Ok(json_response(rsp))
        })
    }
}

impl Admission {
    pub fn new(
        selectors: impl DiscoverSelectors + 'static,
        failure_policy: FailurePolicy,
        metrics: AdmissionMetrics,
    ) -> Self {
        Self {
            selectors: Arc::new(selectors),
            failure_policy,
            metrics,
        }
    }

    /// Answers a serialized `AdmissionReview`.
    ///
    /// A response envelope is produced for every input, including input that
    /// cannot be decoded.
    pub async fn handle(&self, body: &[u8]) -> Result<Bytes, serde_json::Error> {
        let envelope = match codec::decode_envelope(body) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(%error, "Invalid admission review");
                self.metrics.record(Outcome::Invalid);
                return codec::encode_invalid(error);
            }
        };
        let req = &envelope.request;
        debug!(uid = %req.uid, operation = ?req.operation, kind = %req.kind.kind);

        let rsp = self.admit(req).await;
        debug!(uid = %rsp.uid, allowed = rsp.allowed);
        codec::encode_envelope(envelope, rsp)
    }

    async fn admit(&self, req: &AdmissionRequest) -> AdmissionResponse {
        // Deletions and connections don't carry new labels.
        if matches!(req.operation, Operation::Delete | Operation::Connect) {
            self.metrics.record(Outcome::Allowed);
            return AdmissionResponse::from(req);
        }

        let workload = match codec::decode_workload(req) {
            Ok(workload) => workload,
            Err(error) => {
                info!(%error, uid = %req.uid, "Failed to decode pod");
                self.metrics.record(Outcome::Invalid);
                return AdmissionResponse::from(req).deny(error);
            }
        };

        let started = time::Instant::now();
        let selectors = self.selectors.selectors().await;
        self.metrics.observe_query(started);
        let selectors = match selectors {
            Ok(selectors) => selectors,
            Err(error) => return self.query_failed(req, error),
        };
        trace!(selectors = selectors.len());

        let verdict = validate(&workload.labels, &selectors);
        match &verdict {
            Verdict::Allow => self.metrics.record(Outcome::Allowed),
            Verdict::Deny(conflict) => {
                info!(
                    ns = %workload.namespace,
                    name = %workload.name,
                    key = %conflict.key,
                    value = %conflict.value,
                    "Denied"
                );
                self.metrics.record(Outcome::Denied);
            }
        }
        codec::response(req, &verdict)
    }

    fn query_failed(&self, req: &AdmissionRequest, error: ClusterQueryError) -> AdmissionResponse {
        self.metrics.record(Outcome::Error);
        let rsp = AdmissionResponse::from(req);
        match self.failure_policy {
            FailurePolicy::Closed => {
                warn!(%error, uid = %req.uid, "Denying pod; network policies unavailable");
                rsp.deny(format_args!(
                    "cannot verify pod labels against network policies: {error}"
                ))
            }
            FailurePolicy::Open => {
                warn!(%error, uid = %req.uid, "Admitting pod; network policies unavailable");
                let mut rsp = rsp;
                rsp.warnings = Some(vec![format!(
                    "pod labels were not verified against network policies: {error}"
                )]);
                rsp
            }
        }
    }
}

fn json_response(bytes: Bytes) -> Response<Body> {
    Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid")
}
