/// Wire types for the IP Proof HTTP API.
///
/// Field names are camelCase on the wire to match the backend.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::{FileDescriptor, Fingerprint};

/// Body of `POST /api/v1/ip/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub file_hash: Fingerprint,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub user_id: String,
}

impl RegisterRequest {
    pub fn new(
        fingerprint: Fingerprint,
        file: &FileDescriptor,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            file_hash: fingerprint,
            file_name: file.name.clone(),
            file_size: file.size,
            mime_type: file.mime_type.clone(),
            user_id: user_id.into(),
        }
    }
}

/// Success body (200/201) of the register endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub proof_id: Option<String>,
    pub status: Option<ProofStatus>,
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of a 409 from the register endpoint: the fingerprint already has a record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateResponse {
    pub existing_proof_id: Option<String>,
    pub message: Option<String>,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
}

/// Anchoring status of a proof record.
///
/// Open set: the backend may introduce statuses this client does not know.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProofStatus {
    /// Submitted, not yet in a confirmed Bitcoin block.
    Anchoring,
    /// Inclusion proof available.
    Confirmed,
    Other(String),
}

impl ProofStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ProofStatus::Anchoring => "anchoring",
            ProofStatus::Confirmed => "confirmed",
            ProofStatus::Other(s) => s,
        }
    }

    /// Human-readable label for certificates and terminal output.
    pub fn label(&self) -> String {
        match self {
            ProofStatus::Anchoring => "Anchoring to Bitcoin".to_string(),
            ProofStatus::Confirmed => "Confirmed on Bitcoin".to_string(),
            ProofStatus::Other(s) => {
                let mut chars = s.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => "Unknown".to_string(),
                }
            }
        }
    }
}

impl From<String> for ProofStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "anchoring" => ProofStatus::Anchoring,
            "confirmed" => ProofStatus::Confirmed,
            _ => ProofStatus::Other(s),
        }
    }
}

impl From<ProofStatus> for String {
    fn from(status: ProofStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The client's read-only projection of a backend proof record.
///
/// `confirmation_date`, `bitcoin_tx_id` and `bitcoin_block_height` are only
/// populated once `status` is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRecord {
    pub file_hash: Fingerprint,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    pub status: ProofStatus,
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    pub confirmation_date: Option<DateTime<Utc>>,
    pub bitcoin_tx_id: Option<String>,
    pub bitcoin_block_height: Option<u64>,
    pub proof_id: Option<String>,
}

impl ProofRecord {
    pub fn is_confirmed(&self) -> bool {
        self.status == ProofStatus::Confirmed
    }
}

/// Body of `GET /api/v1/ip/verify/{hash}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(default)]
    pub exists: bool,
    pub proof: Option<ProofRecord>,
    #[serde(default)]
    pub message: String,
}

/// Backend timestamps, read leniently.
///
/// RFC 3339 is preferred, but zone-less ISO 8601 values (taken as UTC) and
/// bare dates are accepted too. Anything else reads as `None` so that an odd
/// timestamp never invalidates an otherwise good response.
pub mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};

    const ZONED_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"];
    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in ZONED_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(raw, format) {
                return Some(dt.with_timezone(&Utc));
            }
        }
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        let Some(serde_json::Value::String(raw)) = raw else {
            return Ok(None);
        };
        let parsed = parse(&raw);
        if parsed.is_none() {
            tracing::warn!(value = %raw, "Ignoring unparseable timestamp");
        }
        Ok(parsed)
    }
}

/// Result of a registration request that the client treats as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A new record was created (200/201).
    Registered {
        proof_id: Option<String>,
        status: Option<ProofStatus>,
        created_at: Option<DateTime<Utc>>,
        message: String,
    },
    /// The fingerprint was already registered (409).
    AlreadyRegistered {
        existing_proof_id: Option<String>,
        message: String,
    },
}

impl RegistrationOutcome {
    /// The backend identifier of the record, whichever path produced it.
    pub fn proof_id(&self) -> Option<&str> {
        match self {
            RegistrationOutcome::Registered { proof_id, .. } => proof_id.as_deref(),
            RegistrationOutcome::AlreadyRegistered {
                existing_proof_id, ..
            } => existing_proof_id.as_deref(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RegistrationOutcome::Registered { message, .. }
            | RegistrationOutcome::AlreadyRegistered { message, .. } => message,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, RegistrationOutcome::AlreadyRegistered { .. })
    }
}
