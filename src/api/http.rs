/// IP Proof backend over HTTP JSON (same contract the web client uses).
///
/// - `POST {base}/api/v1/ip/register`
/// - `GET  {base}/api/v1/ip/verify/{hash}`
/// - `GET  {base}/api/v1/ip/certificate/{hash}` (linked, never fetched here)
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{info, warn};

use super::types::{DuplicateResponse, ErrorBody, RegisterResponse};
use super::{
    ProofApi, RegisterRequest, RegistrationOutcome, VerifyResponse, CERTIFICATE_PATH,
    REGISTER_PATH, REGISTRATION_FALLBACK_MESSAGE, VERIFY_PATH,
};
use crate::config::ClientConfig;
use crate::error::{ProofError, Result};
use crate::fingerprint::Fingerprint;

const DUPLICATE_FALLBACK_MESSAGE: &str = "This file has already been registered.";

/// `ProofApi` backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpProofApi {
    client: Client,
    base_url: String,
}

/// Pull a non-empty `message` out of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}

impl HttpProofApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("whatstask-proof/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProofError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.api_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ProofApi for HttpProofApi {
    async fn register(&self, request: &RegisterRequest) -> Result<RegistrationOutcome> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, REGISTER_PATH))
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if status == StatusCode::CONFLICT {
            let dup: DuplicateResponse = serde_json::from_str(&body).unwrap_or_default();
            info!(
                fingerprint = %request.file_hash,
                existing_proof_id = ?dup.existing_proof_id,
                "Fingerprint already registered"
            );
            return Ok(RegistrationOutcome::AlreadyRegistered {
                existing_proof_id: dup.existing_proof_id,
                message: dup
                    .message
                    .unwrap_or_else(|| DUPLICATE_FALLBACK_MESSAGE.to_string()),
            });
        }

        if !status.is_success() {
            let message =
                error_message(&body).unwrap_or_else(|| REGISTRATION_FALLBACK_MESSAGE.to_string());
            warn!(
                fingerprint = %request.file_hash,
                status = status.as_u16(),
                message = %message,
                "Registration rejected"
            );
            return Err(ProofError::Registration(message));
        }

        let parsed: RegisterResponse = serde_json::from_str(&body).map_err(|e| {
            ProofError::Serialization(format!("Failed to parse register response: {e}"))
        })?;

        if !parsed.success {
            let message = if parsed.message.trim().is_empty() {
                REGISTRATION_FALLBACK_MESSAGE.to_string()
            } else {
                parsed.message
            };
            return Err(ProofError::Registration(message));
        }

        info!(
            fingerprint = %request.file_hash,
            proof_id = ?parsed.proof_id,
            "Fingerprint registered"
        );

        Ok(RegistrationOutcome::Registered {
            proof_id: parsed.proof_id,
            status: parsed.status,
            created_at: parsed.created_at,
            message: parsed.message,
        })
    }

    async fn verify(&self, fingerprint: &Fingerprint) -> Result<VerifyResponse> {
        let resp = self
            .client
            .get(format!("{}{}/{}", self.base_url, VERIFY_PATH, fingerprint))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        match serde_json::from_str::<VerifyResponse>(&body) {
            Ok(parsed) if parsed.success => Ok(parsed),
            Ok(parsed) => Err(ProofError::Server {
                status: status.as_u16(),
                message: if parsed.message.is_empty() {
                    "Verification failed".to_string()
                } else {
                    parsed.message
                },
            }),
            Err(_) if !status.is_success() => Err(ProofError::Server {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Verification failed")
                        .to_string()
                }),
            }),
            Err(e) => Err(ProofError::Serialization(format!(
                "Failed to parse verify response: {e}"
            ))),
        }
    }

    fn certificate_url(&self, fingerprint: &Fingerprint) -> String {
        format!("{}{}/{}", self.base_url, CERTIFICATE_PATH, fingerprint)
    }
}
