use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use whatstask_proof::api::{HttpProofApi, ProofApi, RegistrationOutcome};
use whatstask_proof::config::ClientConfig;
use whatstask_proof::crypto::chunked::ChunkedHasher;
use whatstask_proof::error::Result;
use whatstask_proof::fingerprint::{Fingerprint, SelectedFile};
use whatstask_proof::host::{HostCapabilities, HostUser, NoopHost, StaticHost};
use whatstask_proof::registration::{RegistrationFlow, RegistrationState};
use whatstask_proof::telemetry::{init_telemetry, TelemetryConfig};
use whatstask_proof::verify::{hash_from_query, VerificationFlow, VerificationOutcome};

#[derive(Parser)]
#[command(name = "whatstask-proof")]
#[command(about = "Fingerprint files locally and register proof of existence with Whatstask")]
#[command(version)]
struct Cli {
    /// Base URL of the IP Proof API (overrides WHATSTASK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Public site used in verification links (overrides WHATSTASK_SITE_URL)
    #[arg(long, global = true)]
    site_url: Option<String>,

    /// Telegram user id to register under
    #[arg(long, global = true)]
    user_id: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a file's fingerprint without contacting the server
    Hash { file: PathBuf },
    /// Fingerprint a file and register the fingerprint
    Register {
        file: PathBuf,
        /// Write a PDF certificate into this directory on success
        #[arg(long)]
        certificate_dir: Option<PathBuf>,
    },
    /// Look up the proof for a fingerprint or a /verify?hash= link
    Verify { hash_or_url: String },
    /// Print the certificate download link for a fingerprint
    CertificateUrl { hash: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_telemetry(&TelemetryConfig::from_env()) {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = ClientConfig::from_env();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(site_url) = cli.site_url {
        config.site_url = site_url;
    }
    config.validate()?;

    let host: Arc<dyn HostCapabilities> = match cli.user_id {
        Some(id) => Arc::new(StaticHost::new(Some(HostUser::new(id, "cli")))),
        None => Arc::new(NoopHost),
    };
    host.ready();

    match cli.command {
        Commands::Hash { file } => {
            let selected = SelectedFile::open(&file).await?;
            let hasher = ChunkedHasher::new(config.chunk_size, config.hash_mode())?;
            let fingerprint = hasher
                .fingerprint(selected.source.as_ref(), |progress| {
                    tracing::debug!(progress, "Hashing");
                })
                .await?;
            println!("{fingerprint}  {}", selected.descriptor.name);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Register {
            file,
            certificate_dir,
        } => register(&config, host, file, certificate_dir).await,
        Commands::Verify { hash_or_url } => verify(&config, hash_or_url).await,
        Commands::CertificateUrl { hash } => {
            let fingerprint = Fingerprint::parse(&hash)?;
            let api = HttpProofApi::from_config(&config)?;
            println!("{}", api.certificate_url(&fingerprint));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn register(
    config: &ClientConfig,
    host: Arc<dyn HostCapabilities>,
    file: PathBuf,
    certificate_dir: Option<PathBuf>,
) -> Result<ExitCode> {
    let api = Arc::new(HttpProofApi::from_config(config)?);
    let mut flow = RegistrationFlow::new(api, host, config)?;

    let mut rx = flow.subscribe();
    let progress_logger = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let progress = match &*rx.borrow() {
                RegistrationState::Hashing { progress, .. } => Some(*progress),
                _ => None,
            };
            if let Some(progress) = progress {
                tracing::info!(progress = %format!("{progress:.0}%"), "Hashing");
            }
        }
    });

    let selected = SelectedFile::open(&file).await?;
    let result = flow.run([selected]).await;
    progress_logger.abort();

    let receipt = match result {
        Ok(receipt) => receipt,
        Err(_) => {
            if let RegistrationState::Error { message, .. } = flow.state() {
                eprintln!("{message}");
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    match &receipt.outcome {
        RegistrationOutcome::Registered { message, .. } => {
            println!("Registered: {}", receipt.file.name);
            if !message.is_empty() {
                println!("{message}");
            }
        }
        RegistrationOutcome::AlreadyRegistered { message, .. } => {
            println!("Already registered: {}", receipt.file.name);
            println!("{message}");
        }
    }
    println!("Fingerprint: {}", receipt.fingerprint);
    if let Some(proof_id) = receipt.outcome.proof_id() {
        println!("Proof ID:    {proof_id}");
    }

    if let Some(dir) = certificate_dir {
        if let Some(certificate) = flow.certificate(config) {
            let path = certificate.save(&dir).await?;
            println!("Certificate: {}", path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn verify(config: &ClientConfig, hash_or_url: String) -> Result<ExitCode> {
    let api = Arc::new(HttpProofApi::from_config(config)?);
    let flow = VerificationFlow::new(api, config.site_base());

    let input = hash_from_query(&hash_or_url).unwrap_or(hash_or_url);
    match flow.verify(&input).await {
        VerificationOutcome::Found {
            record,
            certificate_url,
            verify_url,
        } => {
            println!("Proof found: {}", record.file_hash);
            if let Some(name) = &record.file_name {
                println!("File:        {name}");
            }
            println!("Status:      {}", record.status.label());
            if let Some(created_at) = record.created_at {
                println!("Registered:  {}", created_at.to_rfc3339());
            }
            if let Some(confirmed) = record.confirmation_date {
                println!("Confirmed:   {}", confirmed.to_rfc3339());
            }
            if let Some(tx) = &record.bitcoin_tx_id {
                println!("Bitcoin tx:  {tx}");
            }
            if let Some(height) = record.bitcoin_block_height {
                println!("Block:       {height}");
            }
            println!("Certificate: {certificate_url}");
            println!("Share:       {verify_url}");
            Ok(ExitCode::SUCCESS)
        }
        VerificationOutcome::NotFound {
            message,
            register_url,
            ..
        } => {
            println!("{message}");
            println!("Register it at {register_url}");
            Ok(ExitCode::from(1))
        }
        VerificationOutcome::InvalidFormat { message, .. }
        | VerificationOutcome::Failed { message, .. } => {
            eprintln!("{message}");
            Ok(ExitCode::from(2))
        }
    }
}
