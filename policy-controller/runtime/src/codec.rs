//! Decodes and encodes `AdmissionReview` envelopes.

use crate::{
    core::{Labels, Verdict},
    k8s::Pod,
};
use bytes::Bytes;
use kube::{
    core::{admission, DynamicObject, TypeMeta},
    Resource,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub type AdmissionRequest = admission::AdmissionRequest<DynamicObject>;
pub type AdmissionResponse = admission::AdmissionResponse;
pub type AdmissionReview = admission::AdmissionReview<DynamicObject>;

const REVIEW_KIND: &str = "AdmissionReview";
const REVIEW_API_VERSIONS: [&str; 2] = ["admission.k8s.io/v1", "admission.k8s.io/v1beta1"];

/// A decoded review.
///
/// The envelope's `request` section is retained verbatim so that it can be
/// echoed back without passing through the typed model.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub types: TypeMeta,
    pub request: AdmissionRequest,
    raw_request: Value,
}

/// The pod under review.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    pub labels: Labels,
}

#[derive(Debug, Error)]
pub enum EnvelopeDecodeError {
    #[error("failed to parse admission review: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected envelope type: {api_version} {kind}")]
    UnexpectedType { api_version: String, kind: String },

    #[error("admission review is missing 'request'")]
    MissingRequest,
}

#[derive(Debug, Error)]
pub enum ObjectDecodeError {
    #[error("unsupported resource type: {0}")]
    UnsupportedKind(String),

    #[error("admission request is missing 'object'")]
    MissingObject,

    #[error("failed to parse pod: {0}")]
    Pod(#[source] serde_json::Error),
}

/// Parses an `AdmissionReview` and returns its request.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, EnvelopeDecodeError> {
    let mut value: Value = serde_json::from_slice(bytes)?;
    let review = AdmissionReview::deserialize(&value)?;

    let types = review.types.clone();
    if types.kind != REVIEW_KIND || !REVIEW_API_VERSIONS.contains(&types.api_version.as_str()) {
        return Err(EnvelopeDecodeError::UnexpectedType {
            api_version: types.api_version,
            kind: types.kind,
        });
    }

    let request = review
        .try_into()
        .map_err(|_| EnvelopeDecodeError::MissingRequest)?;
    let raw_request = value
        .get_mut("request")
        .map(Value::take)
        .unwrap_or_default();
    Ok(Envelope {
        types,
        request,
        raw_request,
    })
}

/// Parses the pod embedded in an admission request.
pub fn decode_workload(req: &AdmissionRequest) -> Result<Workload, ObjectDecodeError> {
    if !is_kind::<Pod>(req) {
        return Err(ObjectDecodeError::UnsupportedKind(format!(
            "{}/{}/{}",
            req.kind.group, req.kind.version, req.kind.kind
        )));
    }

    let obj = req.object.as_ref().ok_or(ObjectDecodeError::MissingObject)?;
    let pod = serde_json::to_value(obj)
        .and_then(serde_json::from_value::<Pod>)
        .map_err(ObjectDecodeError::Pod)?;

    // Pods created from a template may not have a name or namespace set yet.
    let namespace = pod
        .metadata
        .namespace
        .or_else(|| req.namespace.clone())
        .unwrap_or_default();
    let name = pod
        .metadata
        .name
        .or(pod.metadata.generate_name)
        .unwrap_or_else(|| req.name.clone());

    Ok(Workload {
        namespace,
        name,
        labels: pod.metadata.labels.into(),
    })
}

/// Builds the response section for a verdict, echoing the request's uid.
pub fn response(req: &AdmissionRequest, verdict: &Verdict) -> AdmissionResponse {
    let rsp = AdmissionResponse::from(req);
    match verdict {
        Verdict::Allow => rsp,
        Verdict::Deny(_) => rsp.deny(verdict.reason()),
    }
}

/// Serializes the original request alongside its response.
///
/// The envelope keeps the review's `apiVersion` and `kind`, and its `request`
/// section exactly as it was received.
pub fn encode_envelope(
    envelope: Envelope,
    rsp: AdmissionResponse,
) -> Result<Bytes, serde_json::Error> {
    let Envelope {
        types,
        raw_request,
        ..
    } = envelope;
    let mut review = Map::new();
    review.insert("apiVersion".to_string(), types.api_version.into());
    review.insert("kind".to_string(), types.kind.into());
    review.insert("request".to_string(), raw_request);
    review.insert("response".to_string(), serde_json::to_value(rsp)?);
    serde_json::to_vec(&review).map(Bytes::from)
}

/// Serializes a rejection for a review that could not be decoded.
pub fn encode_invalid(error: impl ToString) -> Result<Bytes, serde_json::Error> {
    let mut review = AdmissionResponse::invalid(error).into_review();
    review.types = TypeMeta {
        api_version: REVIEW_API_VERSIONS[0].to_string(),
        kind: REVIEW_KIND.to_string(),
    };
    serde_json::to_vec(&review).map(Bytes::from)
}

fn is_kind<T>(req: &AdmissionRequest) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    req.kind.group.eq_ignore_ascii_case(&T::group(&dt))
        && req.kind.kind.eq_ignore_ascii_case(&T::kind(&dt))
}
