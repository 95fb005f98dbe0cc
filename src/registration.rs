/// Registration flow: fingerprint a local file and register the digest.
///
/// States:
///
/// ```text
/// Upload ──begin──▶ Hashing ──fingerprint ok──▶ Registering ──200/201/409──▶ Complete
///                      │                             │
///                      └────────read failure─────────┴──────other failure──▶ Error
///
/// Complete / Error ──reset──▶ Upload
/// ```
///
/// Only the digest is sent to the backend; the file bytes never leave the
/// machine. Exactly one register request is issued per attempt and nothing
/// is retried: the user resets and selects the file again, which hashes it
/// from scratch.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::api::{ProofApi, RegisterRequest, RegistrationOutcome, REGISTRATION_FALLBACK_MESSAGE};
use crate::certificate::Certificate;
use crate::config::ClientConfig;
use crate::crypto::chunked::ChunkedHasher;
use crate::error::{ProofError, Result};
use crate::fingerprint::{FileDescriptor, Fingerprint, SelectedFile};
use crate::host::{HapticFeedback, HostCapabilities, ImpactStyle, NotificationKind};

pub const HASHING_FAILURE_MESSAGE: &str = "Failed to process file. Please try again.";
pub const NETWORK_FAILURE_MESSAGE: &str =
    "Network error. Please check your connection and try again.";

/// Everything known about a successfully registered (or already registered) file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub file: FileDescriptor,
    pub fingerprint: Fingerprint,
    pub outcome: RegistrationOutcome,
    /// Backend `createdAt` when provided, otherwise the local completion time.
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationState {
    Upload,
    Hashing {
        file: FileDescriptor,
        /// 0..=100; capped at 95 until the digest is done.
        progress: f64,
    },
    Registering {
        file: FileDescriptor,
        fingerprint: Fingerprint,
    },
    Complete(RegistrationReceipt),
    Error {
        file: Option<FileDescriptor>,
        message: String,
    },
}

impl RegistrationState {
    pub fn name(&self) -> &'static str {
        match self {
            RegistrationState::Upload => "upload",
            RegistrationState::Hashing { .. } => "hashing",
            RegistrationState::Registering { .. } => "registering",
            RegistrationState::Complete(_) => "complete",
            RegistrationState::Error { .. } => "error",
        }
    }

    /// An attempt is in flight; new selections are refused.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            RegistrationState::Hashing { .. } | RegistrationState::Registering { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegistrationState::Complete(_) | RegistrationState::Error { .. }
        )
    }
}

/// User-facing message for a failed registration request.
fn failure_message(err: &ProofError) -> String {
    match err {
        ProofError::Registration(message) => message.clone(),
        ProofError::Transport(_) => NETWORK_FAILURE_MESSAGE.to_string(),
        _ => REGISTRATION_FALLBACK_MESSAGE.to_string(),
    }
}

pub struct RegistrationFlow {
    api: Arc<dyn ProofApi>,
    host: Arc<dyn HostCapabilities>,
    hasher: ChunkedHasher,
    anonymous_user_id: String,
    state: watch::Sender<RegistrationState>,
    pending: Option<SelectedFile>,
}

impl RegistrationFlow {
    pub fn new(
        api: Arc<dyn ProofApi>,
        host: Arc<dyn HostCapabilities>,
        config: &ClientConfig,
    ) -> Result<Self> {
        let hasher = ChunkedHasher::new(config.chunk_size, config.hash_mode())?;
        let (state, _) = watch::channel(RegistrationState::Upload);
        Ok(Self {
            api,
            host,
            hasher,
            anonymous_user_id: config.anonymous_user_id.clone(),
            state,
            pending: None,
        })
    }

    /// Replace the hasher (window size, mode, cancellation).
    pub fn with_hasher(mut self, hasher: ChunkedHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> RegistrationState {
        self.state.borrow().clone()
    }

    /// Watch state transitions and hashing progress.
    pub fn subscribe(&self) -> watch::Receiver<RegistrationState> {
        self.state.subscribe()
    }

    /// `Upload → Hashing`. Only the first of `files` is used.
    ///
    /// Refused with `Busy` while an attempt is in flight, and with
    /// `InvalidTransition` from `Complete`/`Error` until `reset`.
    pub fn begin(&mut self, files: impl IntoIterator<Item = SelectedFile>) -> Result<()> {
        {
            let state = self.state.borrow();
            if state.is_busy() {
                warn!(state = state.name(), "Ignoring file selection while busy");
                return Err(ProofError::Busy);
            }
            if !matches!(*state, RegistrationState::Upload) {
                return Err(ProofError::InvalidTransition {
                    from: state.name(),
                    action: "select a file",
                });
            }
        }

        let selected = files
            .into_iter()
            .next()
            .ok_or(ProofError::NoFileSelected)?;

        info!(
            file_name = %selected.descriptor.name,
            size = selected.descriptor.size,
            "File selected"
        );

        self.state.send_replace(RegistrationState::Hashing {
            file: selected.descriptor.clone(),
            progress: 0.0,
        });
        self.pending = Some(selected);
        self.host.haptic(HapticFeedback::Impact(ImpactStyle::Light));
        Ok(())
    }

    fn hashing_file(&self) -> Result<FileDescriptor> {
        match &*self.state.borrow() {
            RegistrationState::Hashing { file, .. } => Ok(file.clone()),
            other => Err(ProofError::InvalidTransition {
                from: other.name(),
                action: "compute a fingerprint",
            }),
        }
    }

    fn registering_input(&self) -> Result<(FileDescriptor, Fingerprint)> {
        match &*self.state.borrow() {
            RegistrationState::Registering { file, fingerprint } => {
                Ok((file.clone(), fingerprint.clone()))
            }
            other => Err(ProofError::InvalidTransition {
                from: other.name(),
                action: "register",
            }),
        }
    }

    fn fail(&mut self, file: Option<FileDescriptor>, message: String) {
        self.pending = None;
        self.host
            .haptic(HapticFeedback::Notification(NotificationKind::Error));
        self.host.show_alert(&message);
        self.state
            .send_replace(RegistrationState::Error { file, message });
    }

    /// `Hashing → Registering` on success, `Hashing → Error` on any read failure.
    pub async fn compute_fingerprint(&mut self) -> Result<Fingerprint> {
        let file = self.hashing_file()?;
        let selected = self.pending.take().ok_or(ProofError::InvalidTransition {
            from: "hashing",
            action: "compute a fingerprint",
        })?;

        let state = &self.state;
        let result = self
            .hasher
            .fingerprint(selected.source.as_ref(), |progress| {
                state.send_modify(|s| {
                    if let RegistrationState::Hashing { progress: p, .. } = s {
                        *p = progress;
                    }
                });
            })
            .await;

        match result {
            Ok(fingerprint) => {
                info!(
                    file_name = %file.name,
                    fingerprint = %fingerprint,
                    "File fingerprinted"
                );
                self.state.send_replace(RegistrationState::Registering {
                    file,
                    fingerprint: fingerprint.clone(),
                });
                Ok(fingerprint)
            }
            Err(e) => {
                error!(file_name = %file.name, error = %e, "Hashing failed");
                self.fail(Some(file), HASHING_FAILURE_MESSAGE.to_string());
                Err(e)
            }
        }
    }

    /// `Registering → Complete | Error`. Issues exactly one request.
    pub async fn register(&mut self) -> Result<RegistrationReceipt> {
        let (file, fingerprint) = self.registering_input()?;

        let user_id = self
            .host
            .is_available()
            .then(|| self.host.user())
            .flatten()
            .map(|u| u.id.to_string())
            .unwrap_or_else(|| self.anonymous_user_id.clone());
        let request = RegisterRequest::new(fingerprint.clone(), &file, user_id);

        match self.api.register(&request).await {
            Ok(outcome) => {
                let registered_at = match &outcome {
                    RegistrationOutcome::Registered {
                        created_at: Some(created_at),
                        ..
                    } => *created_at,
                    _ => Utc::now(),
                };
                info!(
                    fingerprint = %fingerprint,
                    proof_id = ?outcome.proof_id(),
                    duplicate = outcome.is_duplicate(),
                    "Registration complete"
                );

                let receipt = RegistrationReceipt {
                    file,
                    fingerprint,
                    outcome,
                    registered_at,
                };
                self.state
                    .send_replace(RegistrationState::Complete(receipt.clone()));
                self.host
                    .haptic(HapticFeedback::Notification(NotificationKind::Success));
                Ok(receipt)
            }
            Err(e) => {
                error!(fingerprint = %fingerprint, error = %e, "Registration failed");
                self.fail(Some(file), failure_message(&e));
                Err(e)
            }
        }
    }

    /// Drive one full attempt: select, fingerprint, register.
    pub async fn run(
        &mut self,
        files: impl IntoIterator<Item = SelectedFile>,
    ) -> Result<RegistrationReceipt> {
        self.begin(files)?;
        self.compute_fingerprint().await?;
        self.register().await
    }

    /// `Complete | Error → Upload`, discarding file, digest, result and progress.
    pub fn reset(&mut self) -> Result<()> {
        if self.state.borrow().is_busy() {
            return Err(ProofError::Busy);
        }
        self.pending = None;
        self.state.send_replace(RegistrationState::Upload);
        Ok(())
    }

    /// The certificate for the completed attempt; `None` in any other state.
    pub fn certificate(&self, config: &ClientConfig) -> Option<Certificate> {
        match &*self.state.borrow() {
            RegistrationState::Complete(receipt) => Certificate::from_receipt(receipt, config),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ProofStatus, VerifyResponse};
    use crate::crypto::hash::sha256_hex;
    use crate::fingerprint::ByteSource;
    use crate::host::{HostEvent, HostUser, NoopHost, StaticHost};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Behavior {
        Created,
        Duplicate,
        Reject,
        Offline,
    }

    struct StubApi {
        behavior: Behavior,
        calls: AtomicUsize,
        last_request: Mutex<Option<RegisterRequest>>,
    }

    impl StubApi {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProofApi for StubApi {
        async fn register(&self, request: &RegisterRequest) -> Result<RegistrationOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            match self.behavior {
                Behavior::Created => Ok(RegistrationOutcome::Registered {
                    proof_id: Some("p1".into()),
                    status: Some(ProofStatus::Anchoring),
                    created_at: Some("2026-01-01T00:00:00Z".parse().unwrap()),
                    message: "Registered".into(),
                }),
                Behavior::Duplicate => Ok(RegistrationOutcome::AlreadyRegistered {
                    existing_proof_id: Some("p1".into()),
                    message: "File already registered".into(),
                }),
                Behavior::Reject => Err(ProofError::Registration("Quota exceeded".into())),
                Behavior::Offline => Err(ProofError::Transport("connection refused".into())),
            }
        }

        async fn verify(&self, _fingerprint: &Fingerprint) -> Result<VerifyResponse> {
            unreachable!("registration never verifies")
        }

        fn certificate_url(&self, fingerprint: &Fingerprint) -> String {
            format!("https://example.test/api/v1/ip/certificate/{fingerprint}")
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            chunk_size: 64,
            ..ClientConfig::default()
        }
    }

    fn flow(api: Arc<StubApi>) -> RegistrationFlow {
        RegistrationFlow::new(api, Arc::new(NoopHost), &config()).unwrap()
    }

    fn file(name: &str, data: &[u8]) -> SelectedFile {
        SelectedFile::from_bytes(name, data.to_vec())
    }

    #[tokio::test]
    async fn test_happy_path_reaches_complete() {
        let api = StubApi::new(Behavior::Created);
        let mut flow = flow(api.clone());
        assert_eq!(flow.state(), RegistrationState::Upload);

        let data = vec![7u8; 1000];
        let receipt = flow.run([file("notes.txt", &data)]).await.unwrap();

        assert_eq!(api.calls(), 1);
        assert_eq!(receipt.fingerprint.as_str(), sha256_hex(&data));
        assert_eq!(receipt.outcome.proof_id(), Some("p1"));
        assert_eq!(receipt.registered_at.to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert!(matches!(flow.state(), RegistrationState::Complete(_)));

        let sent = api.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.file_hash, receipt.fingerprint);
        assert_eq!(sent.file_name, "notes.txt");
        assert_eq!(sent.file_size, 1000);
        assert_eq!(sent.user_id, "anonymous");
    }

    #[tokio::test]
    async fn test_duplicate_is_complete_not_error() {
        let api = StubApi::new(Behavior::Duplicate);
        let mut flow = flow(api);

        let receipt = flow.run([file("a.bin", b"same bytes")]).await.unwrap();
        assert!(receipt.outcome.is_duplicate());
        assert_eq!(receipt.outcome.proof_id(), Some("p1"));
        assert!(matches!(flow.state(), RegistrationState::Complete(_)));
    }

    #[tokio::test]
    async fn test_rejection_carries_backend_message_then_resets() {
        let api = StubApi::new(Behavior::Reject);
        let mut flow = flow(api.clone());

        assert!(flow.run([file("a.bin", b"data")]).await.is_err());
        match flow.state() {
            RegistrationState::Error { file, message } => {
                assert_eq!(message, "Quota exceeded");
                assert_eq!(file.unwrap().name, "a.bin");
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert!(flow.certificate(&config()).is_none());

        flow.reset().unwrap();
        assert_eq!(flow.state(), RegistrationState::Upload);

        // Retrying re-hashes and issues a fresh request.
        assert!(flow.run([file("a.bin", b"data")]).await.is_err());
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_message() {
        let mut flow = flow(StubApi::new(Behavior::Offline));
        let err = flow.run([file("a.bin", b"data")]).await.unwrap_err();
        assert!(matches!(err, ProofError::Transport(_)));
        assert!(matches!(
            flow.state(),
            RegistrationState::Error { ref message, .. } if message == NETWORK_FAILURE_MESSAGE
        ));
    }

    #[tokio::test]
    async fn test_second_selection_rejected_while_busy() {
        let api = StubApi::new(Behavior::Created);
        let mut flow = flow(api.clone());

        flow.begin([file("first.txt", b"one")]).unwrap();
        assert!(flow.state().is_busy());

        let err = flow.begin([file("second.txt", b"two")]).unwrap_err();
        assert!(matches!(err, ProofError::Busy));
        assert!(matches!(flow.reset(), Err(ProofError::Busy)));

        let fp = flow.compute_fingerprint().await.unwrap();
        assert_eq!(fp.as_str(), sha256_hex(b"one"));
        assert!(matches!(flow.begin([file("second.txt", b"two")]), Err(ProofError::Busy)));

        let receipt = flow.register().await.unwrap();
        assert_eq!(receipt.file.name, "first.txt");
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_only_first_dropped_file_is_used() {
        let mut flow = flow(StubApi::new(Behavior::Created));
        let receipt = flow
            .run([file("a.txt", b"first"), file("b.txt", b"second")])
            .await
            .unwrap();
        assert_eq!(receipt.file.name, "a.txt");
        assert_eq!(receipt.fingerprint.as_str(), sha256_hex(b"first"));
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let mut flow = flow(StubApi::new(Behavior::Created));
        let err = flow.begin(Vec::<SelectedFile>::new()).unwrap_err();
        assert!(matches!(err, ProofError::NoFileSelected));
        assert_eq!(flow.state(), RegistrationState::Upload);
    }

    #[tokio::test]
    async fn test_complete_requires_reset_before_next_file() {
        let mut flow = flow(StubApi::new(Behavior::Created));
        flow.run([file("a.txt", b"a")]).await.unwrap();

        let err = flow.begin([file("b.txt", b"b")]).unwrap_err();
        assert!(matches!(
            err,
            ProofError::InvalidTransition {
                from: "complete",
                ..
            }
        ));

        flow.reset().unwrap();
        assert!(flow.certificate(&config()).is_none());
        flow.begin([file("b.txt", b"b")]).unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_steps_rejected() {
        let mut flow = flow(StubApi::new(Behavior::Created));
        assert!(matches!(
            flow.compute_fingerprint().await,
            Err(ProofError::InvalidTransition { from: "upload", .. })
        ));
        assert!(matches!(
            flow.register().await,
            Err(ProofError::InvalidTransition { from: "upload", .. })
        ));
    }

    #[tokio::test]
    async fn test_begin_starts_at_zero_progress() {
        let mut flow = flow(StubApi::new(Behavior::Created));
        let rx = flow.subscribe();

        flow.begin([file("a.bin", &[1u8; 640])]).unwrap();
        assert!(matches!(
            *rx.borrow(),
            RegistrationState::Hashing { progress, .. } if progress == 0.0
        ));

        flow.compute_fingerprint().await.unwrap();
        assert!(matches!(*rx.borrow(), RegistrationState::Registering { .. }));
    }

    /// Hands out windows one task switch at a time so watchers get to run.
    struct YieldingSource(Vec<u8>);

    #[async_trait]
    impl ByteSource for YieldingSource {
        fn len(&self) -> u64 {
            self.0.len() as u64
        }

        async fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
            tokio::task::yield_now().await;
            let start = offset as usize;
            Ok(self.0[start..start + len].to_vec())
        }
    }

    #[tokio::test]
    async fn test_watchers_see_clamped_progress_then_registering() {
        let mut flow = flow(StubApi::new(Behavior::Created));
        let mut rx = flow.subscribe();

        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                let done = matches!(state, RegistrationState::Registering { .. });
                seen.push(state);
                if done {
                    break;
                }
            }
            seen
        });

        let data = vec![3u8; 64 * 10];
        let source = SelectedFile::new(
            FileDescriptor::new("slow.bin", data.len() as u64, None),
            YieldingSource(data),
        );
        flow.begin([source]).unwrap();
        flow.compute_fingerprint().await.unwrap();

        let seen = observer.await.unwrap();
        let progress: Vec<f64> = seen
            .iter()
            .filter_map(|s| match s {
                RegistrationState::Hashing { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect();

        assert!(progress.len() > 2, "observed {progress:?}");
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        let (last, earlier) = progress.split_last().unwrap();
        assert!(earlier.iter().all(|p| *p <= 95.0));
        assert!(*last <= 100.0);
        assert!(matches!(
            seen.last(),
            Some(RegistrationState::Registering { .. })
        ));
    }

    #[tokio::test]
    async fn test_failure_alerts_host() {
        let host = Arc::new(StaticHost::new(None));
        let mut flow =
            RegistrationFlow::new(StubApi::new(Behavior::Reject), host.clone(), &config())
                .unwrap();

        assert!(flow.run([file("a.bin", b"data")]).await.is_err());
        assert_eq!(
            host.events(),
            vec![
                HostEvent::Haptic(HapticFeedback::Impact(ImpactStyle::Light)),
                HostEvent::Haptic(HapticFeedback::Notification(NotificationKind::Error)),
                HostEvent::Alert("Quota exceeded".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unavailable_host_user_is_ignored() {
        struct DetachedHost;

        impl HostCapabilities for DetachedHost {
            fn is_available(&self) -> bool {
                false
            }

            fn user(&self) -> Option<HostUser> {
                Some(HostUser::new(99, "Stale"))
            }

            fn show_alert(&self, _message: &str) {}

            fn haptic(&self, _feedback: HapticFeedback) {}

            fn ready(&self) {}
        }

        let api = StubApi::new(Behavior::Created);
        let mut flow =
            RegistrationFlow::new(api.clone(), Arc::new(DetachedHost), &config()).unwrap();
        flow.run([file("a.bin", b"data")]).await.unwrap();

        let sent = api.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.user_id, "anonymous");
    }

    #[tokio::test]
    async fn test_host_user_and_haptics() {
        let api = StubApi::new(Behavior::Created);
        let host = Arc::new(StaticHost::new(Some(HostUser::new(42, "Ada"))));
        let mut flow = RegistrationFlow::new(api.clone(), host.clone(), &config()).unwrap();

        flow.run([file("a.bin", b"data")]).await.unwrap();

        let sent = api.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.user_id, "42");
        assert_eq!(
            host.events(),
            vec![
                HostEvent::Haptic(HapticFeedback::Impact(ImpactStyle::Light)),
                HostEvent::Haptic(HapticFeedback::Notification(NotificationKind::Success)),
            ]
        );
    }

    #[tokio::test]
    async fn test_certificate_only_when_complete() {
        let mut flow = flow(StubApi::new(Behavior::Created));
        assert!(flow.certificate(&config()).is_none());

        let receipt = flow.run([file("a.bin", b"data")]).await.unwrap();
        let cert = flow.certificate(&config()).unwrap();
        assert_eq!(cert.fingerprint, receipt.fingerprint);
        assert_eq!(cert.proof_id, "p1");
    }
}
