/// Proof-of-existence certificate.
///
/// A certificate ties a file's descriptive metadata to its fingerprint and
/// carries a verification link built from the full digest. Anyone holding
/// the certificate can re-derive the proof record from that link without
/// the original file.
///
/// Rendering is split in two: `Certificate::lines` produces the layout
/// model (title block, metadata table, digest on two monospace lines,
/// verification URL, footer) and `pdf::render` turns it into a single-page
/// PDF. Saving the PDF is the "download"; no network call is involved.
pub mod pdf;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::api::{ProofStatus, RegistrationOutcome};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::fingerprint::{FileDescriptor, Fingerprint};
use crate::registration::RegistrationReceipt;
use crate::verify::verify_url;

pub const CERTIFICATE_TITLE: &str = "Certificate of Intellectual Property";
pub const CERTIFICATE_SUBTITLE: &str = "Proof of Existence - Whatstask IP Proof";
pub const ANCHORING_PROTOCOL: &str = "OpenTimestamps (Bitcoin blockchain)";
/// Shown in place of a proof id the backend has not assigned yet.
pub const PROOF_ID_PLACEHOLDER: &str = "PENDING";

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format a byte count with the largest fitting unit (1024 base, up to two decimals).
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

fn status_label(outcome: &RegistrationOutcome) -> String {
    match outcome {
        RegistrationOutcome::Registered { status, .. } => status
            .clone()
            .unwrap_or(ProofStatus::Anchoring)
            .label(),
        RegistrationOutcome::AlreadyRegistered { .. } => "Previously registered".to_string(),
    }
}

/// One element of the certificate layout, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateLine {
    Title(String),
    Subtitle(String),
    Heading(String),
    Field { label: String, value: String },
    Mono(String),
    Text(String),
    Footer(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub file_name: String,
    /// Already formatted, e.g. "10 MB".
    pub file_size: String,
    pub registered_at: DateTime<Utc>,
    pub status: String,
    pub fingerprint: Fingerprint,
    pub proof_id: String,
    pub verify_url: String,
    pub generated_at: DateTime<Utc>,
}

impl Certificate {
    /// Assemble a certificate; `None` unless both the fingerprint and the
    /// registration result are present. A partial certificate is never built.
    pub fn build(
        file: &FileDescriptor,
        fingerprint: Option<&Fingerprint>,
        outcome: Option<&RegistrationOutcome>,
        registered_at: DateTime<Utc>,
        config: &ClientConfig,
    ) -> Option<Self> {
        let fingerprint = fingerprint?;
        let outcome = outcome?;

        Some(Self {
            file_name: file.name.clone(),
            file_size: format_file_size(file.size),
            registered_at,
            status: status_label(outcome),
            fingerprint: fingerprint.clone(),
            proof_id: outcome
                .proof_id()
                .filter(|id| !id.is_empty())
                .unwrap_or(PROOF_ID_PLACEHOLDER)
                .to_string(),
            verify_url: verify_url(config.site_base(), fingerprint),
            generated_at: Utc::now(),
        })
    }

    /// Certificate for a completed registration.
    pub fn from_receipt(receipt: &RegistrationReceipt, config: &ClientConfig) -> Option<Self> {
        Self::build(
            &receipt.file,
            Some(&receipt.fingerprint),
            Some(&receipt.outcome),
            receipt.registered_at,
            config,
        )
    }

    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    /// Layout model of the single certificate page.
    pub fn lines(&self) -> Vec<CertificateLine> {
        let (first_half, second_half) = self.fingerprint.split_halves();
        let field = |label: &str, value: String| CertificateLine::Field {
            label: label.to_string(),
            value,
        };

        vec![
            CertificateLine::Title(CERTIFICATE_TITLE.to_string()),
            CertificateLine::Subtitle(CERTIFICATE_SUBTITLE.to_string()),
            CertificateLine::Heading("File Details".to_string()),
            field("File Name", self.file_name.clone()),
            field("File Size", self.file_size.clone()),
            field(
                "Registered",
                self.registered_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ),
            field("Status", self.status.clone()),
            field("Proof ID", self.proof_id.clone()),
            CertificateLine::Heading("SHA-256 Fingerprint".to_string()),
            CertificateLine::Mono(first_half.to_string()),
            CertificateLine::Mono(second_half.to_string()),
            CertificateLine::Heading("Verify".to_string()),
            CertificateLine::Text(self.verify_url.clone()),
            CertificateLine::Footer(format!("Anchored with {ANCHORING_PROTOCOL}")),
            CertificateLine::Footer(format!(
                "Generated {}",
                self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
            )),
        ]
    }

    /// Download file name, e.g. `whatstask-proof-ba7816bf.pdf`.
    pub fn file_name(&self) -> String {
        format!("whatstask-proof-{}.pdf", self.fingerprint.short())
    }

    pub fn render_pdf(&self) -> Result<Vec<u8>> {
        pdf::render(self)
    }

    /// Render and write the PDF into `dir`. Returns the written path.
    pub async fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let bytes = self.render_pdf()?;
        let path = dir.as_ref().join(self.file_name());
        tokio::fs::write(&path, &bytes).await?;
        info!(
            path = %path.display(),
            fingerprint = %self.fingerprint,
            bytes = bytes.len(),
            "Certificate saved"
        );
        Ok(path)
    }
}
