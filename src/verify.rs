/// Verification flow: look up the proof record for a fingerprint.
///
/// Single-shot and stateless. Input is validated before anything goes on the
/// wire; a malformed digest never reaches the backend. A record that does
/// not exist and a lookup that could not be completed are different
/// outcomes, so "no proof exists" is never confused with "we couldn't check".
///
/// There is no polling: the backend moves records from anchoring to
/// confirmed on its own schedule and the user re-verifies to see it.
use std::sync::Arc;

use reqwest::Url;
use tracing::{info, warn};

use crate::api::{ProofApi, ProofRecord};
use crate::error::ProofError;
use crate::fingerprint::Fingerprint;

pub const VERIFY_PAGE_PATH: &str = "/verify";
pub const REGISTER_PAGE_PATH: &str = "/ip-proof";

pub const NOT_FOUND_MESSAGE: &str = "No proof found for this file.";
pub const UNREACHABLE_MESSAGE: &str =
    "Could not reach the verification service. Please try again.";
pub const INVALID_FORMAT_MESSAGE: &str =
    "Invalid hash format. A SHA-256 hash is 64 hexadecimal characters.";

/// Public verification link for a fingerprint: `<site>/verify?hash=<digest>`.
pub fn verify_url(site_base: &str, fingerprint: &Fingerprint) -> String {
    format!(
        "{}{}?hash={}",
        site_base.trim_end_matches('/'),
        VERIFY_PAGE_PATH,
        fingerprint
    )
}

/// Where a user goes to register a file that has no proof yet.
pub fn register_url(site_base: &str) -> String {
    format!("{}{}", site_base.trim_end_matches('/'), REGISTER_PAGE_PATH)
}

/// Extract the `hash` query parameter from a full URL, a path with a query
/// (`/verify?hash=...`), or a bare query string (`hash=...`).
pub fn hash_from_query(input: &str) -> Option<String> {
    let query = match Url::parse(input) {
        Ok(url) => url.query()?.to_string(),
        Err(_) => input
            .split_once('?')
            .map(|(_, q)| q)
            .unwrap_or(input)
            .to_string(),
    };

    let parsed = Url::parse(&format!("http://localhost/?{query}")).ok()?;
    let hash = parsed
        .query_pairs()
        .find(|(key, _)| key == "hash")
        .map(|(_, value)| value.trim().to_string());
    hash.filter(|h| !h.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The input is not a 64-character hex digest. No request was made.
    InvalidFormat { input: String, message: String },
    Found {
        record: ProofRecord,
        certificate_url: String,
        verify_url: String,
    },
    /// The lookup succeeded and no record exists.
    NotFound {
        fingerprint: Fingerprint,
        message: String,
        register_url: String,
    },
    /// The lookup itself failed (network or server error).
    Failed {
        fingerprint: Fingerprint,
        message: String,
    },
}

impl VerificationOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, VerificationOutcome::Found { .. })
    }
}

pub struct VerificationFlow {
    api: Arc<dyn ProofApi>,
    site_base: String,
}

impl VerificationFlow {
    pub fn new(api: Arc<dyn ProofApi>, site_url: impl Into<String>) -> Self {
        Self {
            api,
            site_base: site_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Validate `input` and, if it is well formed, look it up once.
    pub async fn verify(&self, input: &str) -> VerificationOutcome {
        match Fingerprint::parse(input) {
            Ok(fingerprint) => self.verify_fingerprint(&fingerprint).await,
            Err(_) => {
                warn!(input_len = input.trim().len(), "Rejected malformed hash");
                VerificationOutcome::InvalidFormat {
                    input: input.to_string(),
                    message: INVALID_FORMAT_MESSAGE.to_string(),
                }
            }
        }
    }

    pub async fn verify_fingerprint(&self, fingerprint: &Fingerprint) -> VerificationOutcome {
        match self.api.verify(fingerprint).await {
            Ok(resp) if resp.exists => match resp.proof {
                Some(record) => {
                    info!(
                        fingerprint = %fingerprint,
                        status = %record.status,
                        "Proof found"
                    );
                    VerificationOutcome::Found {
                        record,
                        certificate_url: self.api.certificate_url(fingerprint),
                        verify_url: verify_url(&self.site_base, fingerprint),
                    }
                }
                None => VerificationOutcome::Failed {
                    fingerprint: fingerprint.clone(),
                    message: "Verification response did not include a proof record".to_string(),
                },
            },
            Ok(resp) => {
                info!(fingerprint = %fingerprint, "No proof found");
                VerificationOutcome::NotFound {
                    fingerprint: fingerprint.clone(),
                    message: if resp.message.trim().is_empty() {
                        NOT_FOUND_MESSAGE.to_string()
                    } else {
                        resp.message
                    },
                    register_url: register_url(&self.site_base),
                }
            }
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Verification request failed");
                let message = match e {
                    ProofError::Transport(_) => UNREACHABLE_MESSAGE.to_string(),
                    ProofError::Server { message, .. } => message,
                    other => other.to_string(),
                };
                VerificationOutcome::Failed {
                    fingerprint: fingerprint.clone(),
                    message,
                }
            }
        }
    }

    /// Auto-trigger on page load: if `url` carries a `hash` parameter, verify it.
    pub async fn on_load(&self, url: &str) -> Option<VerificationOutcome> {
        let hash = hash_from_query(url)?;
        Some(self.verify(&hash).await)
    }
}
