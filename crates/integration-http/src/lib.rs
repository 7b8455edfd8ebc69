//! reqwest-backed implementation of the caseflow backend seams.

mod client;
mod transport;

pub use client::HttpCaseflowClient;
pub use transport::{
    build_url, status_error, ApiRequest, ApiTransport, HttpBackendConfig, HttpMethod,
    RequestBody, ReqwestTransport,
};
