pub mod api;
pub mod certificate;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fingerprint;
pub mod host;
pub mod registration;
pub mod telemetry;
pub mod verify;
