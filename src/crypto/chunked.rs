/// Chunked (windowed) SHA-256 fingerprinting for local files.
///
/// The source is read in fixed-size windows (2 MiB by default), strictly in
/// order. After each window the caller receives a progress percentage,
/// clamped to 95 until the digest itself is computed, then exactly 100.
///
/// Two modes produce the same digest:
/// - Buffered: every window is appended to one contiguous buffer and a
///   single SHA-256 runs over the whole file at the end.
/// - Streaming: each window updates a running hash; memory stays at one
///   window regardless of file size.
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::crypto::hash::{sha256, DigestAccumulator};
use crate::error::{ProofError, Result};
use crate::fingerprint::{ByteSource, Fingerprint};

pub const WINDOW_SIZE: usize = 2 * 1024 * 1024; // 2 MiB

/// Sources above this size are hashed in streaming mode under `HashMode::Auto`.
pub const DEFAULT_STREAMING_THRESHOLD: u64 = 256 * 1024 * 1024; // 256 MiB

/// Highest progress reported before the digest is finished.
pub const PROGRESS_CEILING: f64 = 95.0;

/// How windows are turned into a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMode {
    Buffered,
    Streaming,
    /// Streaming above `streaming_threshold` bytes, buffered otherwise.
    Auto { streaming_threshold: u64 },
}

impl Default for HashMode {
    fn default() -> Self {
        HashMode::Auto {
            streaming_threshold: DEFAULT_STREAMING_THRESHOLD,
        }
    }
}

/// Progress after `read` of `total` bytes, before the digest is done.
fn window_progress(read: u64, total: u64) -> f64 {
    if total == 0 {
        return PROGRESS_CEILING;
    }
    (read as f64 / total as f64 * 100.0).min(PROGRESS_CEILING)
}

#[derive(Debug, Clone)]
pub struct ChunkedHasher {
    window_size: usize,
    mode: HashMode,
    cancel: Option<CancellationToken>,
}

impl Default for ChunkedHasher {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            mode: HashMode::default(),
            cancel: None,
        }
    }
}

impl ChunkedHasher {
    pub fn new(window_size: usize, mode: HashMode) -> Result<Self> {
        if window_size == 0 {
            return Err(ProofError::Config("window size must be non-zero".into()));
        }
        Ok(Self {
            window_size,
            mode,
            cancel: None,
        })
    }

    /// Abort between windows once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn mode(&self) -> HashMode {
        self.mode
    }

    fn streams(&self, total: u64) -> bool {
        match self.mode {
            HashMode::Buffered => false,
            HashMode::Streaming => true,
            HashMode::Auto {
                streaming_threshold,
            } => total > streaming_threshold,
        }
    }

    /// Compute the fingerprint of `source`, reporting progress (0..=100).
    ///
    /// Any failed or short window read aborts with `ProofError::Read`; no
    /// partial digest is produced. There is no retry at this layer.
    pub async fn fingerprint<F>(
        &self,
        source: &dyn ByteSource,
        mut on_progress: F,
    ) -> Result<Fingerprint>
    where
        F: FnMut(f64) + Send,
    {
        let total = source.len();
        let streaming = self.streams(total);

        let mut buffer: Vec<u8> = Vec::new();
        if !streaming {
            buffer.reserve(usize::try_from(total).unwrap_or(0));
        }
        let mut accumulator = DigestAccumulator::new();
        let mut offset: u64 = 0;

        while offset < total {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                return Err(ProofError::Cancelled);
            }

            let want = std::cmp::min(self.window_size as u64, total - offset) as usize;
            let window = source
                .read_at(offset, want)
                .await
                .map_err(|e| ProofError::Read(format!("window at offset {offset}: {e}")))?;

            if window.len() != want {
                return Err(ProofError::Read(format!(
                    "short read at offset {offset}: expected {want} bytes, got {}",
                    window.len()
                )));
            }

            if streaming {
                accumulator.update(&window);
            } else {
                buffer.extend_from_slice(&window);
            }
            offset += want as u64;

            on_progress(window_progress(offset, total));
        }

        let digest = if streaming {
            accumulator.finalize()
        } else {
            sha256(&buffer)
        };
        on_progress(100.0);

        let fingerprint = Fingerprint::from_digest(digest);
        debug!(
            fingerprint = %fingerprint,
            bytes = total,
            streaming,
            "Fingerprint computed"
        );
        Ok(fingerprint)
    }
}
