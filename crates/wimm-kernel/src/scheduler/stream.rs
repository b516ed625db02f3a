//! Bounded capture of a job's merged output.
//!
//! Both of the child's pipes drain into one shared ring buffer, so the
//! captured text interleaves stdout and stderr roughly in the order the tool
//! wrote them. When the tool is chatty the oldest bytes are evicted; the tail
//! of the output, where tools print their error summary, survives.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;

/// Default capture limit (10MB).
pub const DEFAULT_OUTPUT_LIMIT: usize = 10 * 1024 * 1024;

/// A shared, bounded byte buffer fed by several readers.
#[derive(Clone)]
pub struct OutputBuffer {
    inner: Arc<RwLock<OutputBufferInner>>,
}

struct OutputBufferInner {
    buffer: VecDeque<u8>,
    max_size: usize,
    /// Bytes written over the buffer's lifetime.
    total_written: u64,
    /// Bytes dropped from the front to stay under `max_size`.
    bytes_evicted: u64,
}

impl OutputBuffer {
    /// Create a buffer holding at most `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(OutputBufferInner {
                buffer: VecDeque::with_capacity(max_size.min(8192)),
                max_size,
                total_written: 0,
                bytes_evicted: 0,
            })),
        }
    }

    /// Append bytes, evicting the oldest if the limit would be exceeded.
    pub async fn write(&self, data: &[u8]) {
        let mut inner = self.inner.write().await;
        inner.total_written += data.len() as u64;

        if data.len() >= inner.max_size {
            let start = data.len() - inner.max_size;
            inner.bytes_evicted += inner.buffer.len() as u64 + start as u64;
            inner.buffer.clear();
            inner.buffer.extend(&data[start..]);
            return;
        }

        let available = inner.max_size.saturating_sub(inner.buffer.len());
        if data.len() > available {
            let evict = (data.len() - available).min(inner.buffer.len());
            inner.buffer.drain(..evict);
            inner.bytes_evicted += evict as u64;
        }

        inner.buffer.extend(data);
    }

    /// Snapshot of the captured bytes.
    pub async fn read(&self) -> Vec<u8> {
        let inner = self.inner.read().await;
        inner.buffer.iter().copied().collect()
    }

    /// Captured output as text (lossy UTF-8), noting any eviction up front.
    pub async fn read_string(&self) -> String {
        let inner = self.inner.read().await;
        let bytes: Vec<u8> = inner.buffer.iter().copied().collect();
        let text = String::from_utf8_lossy(&bytes);
        if inner.bytes_evicted > 0 {
            format!("[... {} bytes truncated ...]\n{}", inner.bytes_evicted, text)
        } else {
            text.into_owned()
        }
    }

    /// Bytes currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.buffer.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Bytes written over the buffer's lifetime, including evicted ones.
    pub async fn total_written(&self) -> u64 {
        self.inner.read().await.total_written
    }

    /// Bytes dropped to stay under the limit.
    pub async fn bytes_evicted(&self) -> u64 {
        self.inner.read().await.bytes_evicted
    }
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("inner", &"<locked>")
            .finish()
    }
}

/// Drain a pipe into `buffer` until EOF.
///
/// A missing pipe is a no-op. Read errors end the drain; whatever arrived
/// before the error stays in the buffer.
pub async fn drain_into<R>(reader: Option<R>, buffer: &OutputBuffer)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };

    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => buffer.write(&buf[..n]).await,
            Err(e) => {
                tracing::warn!("output drain read error: {}", e);
                break;
            }
        }
    }
}
