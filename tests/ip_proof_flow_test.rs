//! End-to-end flows against a mock IP Proof backend.

use std::sync::Arc;

use mockito::{Matcher, Server};
use sha2::{Digest, Sha256};

use whatstask_proof::api::{HttpProofApi, ProofStatus, RegistrationOutcome};
use whatstask_proof::config::ClientConfig;
use whatstask_proof::fingerprint::SelectedFile;
use whatstask_proof::host::NoopHost;
use whatstask_proof::registration::{RegistrationFlow, RegistrationState};
use whatstask_proof::verify::{VerificationFlow, VerificationOutcome};

const SITE: &str = "https://whatstask.com";

fn config(api_url: &str) -> ClientConfig {
    ClientConfig {
        api_url: api_url.to_string(),
        site_url: SITE.to_string(),
        ..ClientConfig::default()
    }
}

fn ten_megabytes() -> Vec<u8> {
    (0..10 * 1024 * 1024u32).map(|i| (i % 253) as u8).collect()
}

#[tokio::test]
async fn register_ten_megabyte_file_and_build_certificate() {
    let data = ten_megabytes();
    let digest = hex::encode(Sha256::digest(&data));

    let mut server = Server::new_async().await;
    let register = server
        .mock("POST", "/api/v1/ip/register")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "fileHash": digest,
            "fileName": "master.wav",
            "fileSize": 10 * 1024 * 1024,
            "mimeType": "audio/wav",
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "success": true,
                "message": "File registered",
                "proofId": "p1",
                "status": "anchoring",
                "createdAt": "2026-01-01T00:00:00Z",
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let config = config(&server.url());
    let api = Arc::new(HttpProofApi::from_config(&config).unwrap());
    let mut flow = RegistrationFlow::new(api, Arc::new(NoopHost), &config).unwrap();

    let receipt = flow
        .run([SelectedFile::from_bytes("master.wav", data)])
        .await
        .unwrap();
    register.assert_async().await;

    assert_eq!(receipt.fingerprint.as_str(), digest);
    assert_eq!(
        receipt.outcome,
        RegistrationOutcome::Registered {
            proof_id: Some("p1".into()),
            status: Some(ProofStatus::Anchoring),
            created_at: Some("2026-01-01T00:00:00Z".parse().unwrap()),
            message: "File registered".into(),
        }
    );
    assert!(matches!(flow.state(), RegistrationState::Complete(_)));

    let certificate = flow.certificate(&config).unwrap();
    assert_eq!(certificate.fingerprint.as_str(), digest);
    assert_eq!(certificate.file_size, "10 MB");
    assert_eq!(certificate.proof_id, "p1");
    assert_eq!(certificate.verify_url, format!("{SITE}/verify?hash={digest}"));

    let dir = tempfile::tempdir().unwrap();
    let path = certificate.save(dir.path()).await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn registering_same_bytes_twice_reuses_existing_proof() {
    let data = b"identical content".to_vec();
    let digest = hex::encode(Sha256::digest(&data));

    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", "/api/v1/ip/register")
        .with_status(201)
        .with_body(
            r#"{"success":true,"message":"File registered","proofId":"p1","status":"anchoring"}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let config = config(&server.url());
    let api = Arc::new(HttpProofApi::from_config(&config).unwrap());
    let mut flow = RegistrationFlow::new(api, Arc::new(NoopHost), &config).unwrap();

    let receipt = flow
        .run([SelectedFile::from_bytes("a.txt", data.clone())])
        .await
        .unwrap();
    assert_eq!(receipt.outcome.proof_id(), Some("p1"));
    first.assert_async().await;
    first.remove_async().await;

    let second = server
        .mock("POST", "/api/v1/ip/register")
        .match_body(Matcher::PartialJson(serde_json::json!({ "fileHash": digest })))
        .with_status(409)
        .with_body(
            serde_json::json!({
                "success": false,
                "message": "This file has already been registered",
                "existingProofId": "p1",
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    flow.reset().unwrap();
    let again = flow
        .run([SelectedFile::from_bytes("copy-of-a.txt", data)])
        .await
        .unwrap();
    second.assert_async().await;

    assert!(again.outcome.is_duplicate());
    assert_eq!(again.outcome.proof_id(), Some("p1"));
    assert_eq!(again.fingerprint, receipt.fingerprint);
    assert!(matches!(flow.state(), RegistrationState::Complete(_)));
}

#[tokio::test]
async fn verify_reports_not_found_distinctly_from_transport_failure() {
    let digest = hex::encode(Sha256::digest(b"never registered"));

    let mut server = Server::new_async().await;
    server
        .mock("GET", format!("/api/v1/ip/verify/{digest}").as_str())
        .with_status(200)
        .with_body(r#"{"success":true,"exists":false,"message":"No proof found for this hash"}"#)
        .create_async()
        .await;

    let api = Arc::new(HttpProofApi::from_config(&config(&server.url())).unwrap());
    let flow = VerificationFlow::new(api, SITE);

    let url = format!("{SITE}/verify?hash={}", digest.to_ascii_uppercase());
    match flow.on_load(&url).await.unwrap() {
        VerificationOutcome::NotFound {
            fingerprint,
            message,
            register_url,
        } => {
            assert_eq!(fingerprint.as_str(), digest);
            assert_eq!(message, "No proof found for this hash");
            assert_eq!(register_url, format!("{SITE}/ip-proof"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // Same query, backend unreachable.
    let offline = Arc::new(HttpProofApi::from_config(&config("http://127.0.0.1:9")).unwrap());
    let outcome = VerificationFlow::new(offline, SITE).verify(&digest).await;
    assert!(matches!(outcome, VerificationOutcome::Failed { .. }));
}

#[tokio::test]
async fn verify_confirmed_record() {
    let digest = hex::encode(Sha256::digest(b"anchored"));
    let body = serde_json::json!({
        "success": true,
        "exists": true,
        "message": "Proof found",
        "proof": {
            "fileHash": digest,
            "fileName": "anchored.txt",
            "fileSize": 8,
            "mimeType": "text/plain",
            "status": "confirmed",
            "createdAt": "2026-01-01T00:00:00Z",
            "confirmationDate": "2026-01-01T01:30:00Z",
            "bitcoinTxId": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            "bitcoinBlockHeight": 930001,
            "proofId": "p9"
        }
    });

    let mut server = Server::new_async().await;
    server
        .mock("GET", format!("/api/v1/ip/verify/{digest}").as_str())
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let api = Arc::new(HttpProofApi::from_config(&config(&server.url())).unwrap());
    let outcome = VerificationFlow::new(api, SITE).verify(&digest).await;

    match outcome {
        VerificationOutcome::Found {
            record,
            certificate_url,
            ..
        } => {
            assert!(record.is_confirmed());
            assert_eq!(record.bitcoin_block_height, Some(930001));
            assert_eq!(
                certificate_url,
                format!("{}/api/v1/ip/certificate/{digest}", server.url())
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
