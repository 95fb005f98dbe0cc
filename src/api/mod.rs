/// Client side of the IP Proof registration/lookup service.
///
/// The backend owns proof records and performs the OpenTimestamps/Bitcoin
/// anchoring; this crate only ever sends fingerprints and reads records back.
/// The `ProofApi` trait is the seam between the flows and the transport, so
/// the flows can be driven against a stub in tests.
pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::fingerprint::Fingerprint;

pub use http::HttpProofApi;
pub use types::{
    ProofRecord, ProofStatus, RegisterRequest, RegistrationOutcome, VerifyResponse,
};

pub const REGISTER_PATH: &str = "/api/v1/ip/register";
pub const VERIFY_PATH: &str = "/api/v1/ip/verify";
pub const CERTIFICATE_PATH: &str = "/api/v1/ip/certificate";

/// Fallback shown when a failed registration carries no message.
pub const REGISTRATION_FALLBACK_MESSAGE: &str = "Registration failed. Please try again.";

/// Trait for the proof registration backend.
///
/// Every call issues at most one request and never retries.
#[async_trait]
pub trait ProofApi: Send + Sync {
    /// Register a fingerprint. A duplicate is a successful outcome, not an error.
    async fn register(&self, request: &RegisterRequest) -> Result<RegistrationOutcome>;

    /// Look up the record for a fingerprint.
    /// A missing record is `Ok` with `exists == false`.
    async fn verify(&self, fingerprint: &Fingerprint) -> Result<VerifyResponse>;

    /// Direct download link for the backend-rendered certificate.
    fn certificate_url(&self, fingerprint: &Fingerprint) -> String;
}
