//! Output capture for subprocess pipes

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

/// Appended once to output cut at the byte ceiling
pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Default)]
struct Capture {
    data: Vec<u8>,
    limit: Option<usize>,
    truncated: bool,
    sealed: bool,
}

/// Growable byte buffer fed by one pipe reader.
///
/// A sealed buffer ignores further writes, so a terminal task's output
/// cannot change after the transition.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Capture>>,
}

impl CaptureBuffer {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Keeps at most `limit` bytes; the rest is counted as truncated and dropped
    pub fn with_limit(limit: usize) -> Self {
        Self { inner: Arc::new(Mutex::new(Capture { limit: Some(limit), ..Capture::default() })) }
    }

    /// Returns false once the buffer is sealed
    pub fn append(&self, chunk: &[u8]) -> bool {
        let mut cap = self.inner.lock();
        if cap.sealed {
            return false;
        }
        match cap.limit {
            Some(limit) => {
                let room = limit.saturating_sub(cap.data.len());
                if chunk.len() > room {
                    cap.truncated = true;
                }
                let take = chunk.len().min(room);
                cap.data.extend_from_slice(&chunk[..take]);
            }
            None => cap.data.extend_from_slice(chunk),
        }
        true
    }

    pub fn seal(&self) {
        self.inner.lock().sealed = true;
    }

    /// Captured bytes as text, with the truncation marker when the limit was hit
    pub fn render(&self) -> String {
        let cap = self.inner.lock();
        let mut text = String::from_utf8_lossy(&cap.data).into_owned();
        if cap.truncated {
            // A multi-byte char split at the limit decodes to U+FFFD; cut it off
            if let Some(limit) = cap.limit {
                truncate_at_char_boundary(&mut text, limit);
            }
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

/// Copy a pipe into `buf` until EOF or a read error
pub(crate) fn pump<R>(mut reader: R, buf: CaptureBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    // Keep reading after seal so the child never blocks on a full pipe
                    buf.append(&chunk[..n]);
                }
                Err(e) => {
                    tracing::debug!("pipe read failed: {e}");
                    break;
                }
            }
        }
    })
}

/// Wait for pipe readers, giving up after `grace`.
///
/// Grandchildren can hold a pipe open after the direct child exits.
pub(crate) async fn drain(mut readers: Vec<JoinHandle<()>>, grace: Duration) {
    let all = async {
        for reader in readers.iter_mut() {
            let _ = reader.await;
        }
    };
    if tokio::time::timeout(grace, all).await.is_err() {
        tracing::debug!("output readers still open after {:?}, detaching", grace);
        for reader in &readers {
            reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_truncates_with_single_marker() {
        let buf = CaptureBuffer::with_limit(10);
        buf.append(b"0123456");
        buf.append(b"789abcdef");
        buf.append(b"more");
        assert_eq!(buf.render(), format!("0123456789{TRUNCATION_MARKER}"));
    }

    #[test]
    fn test_exact_limit_is_not_truncated() {
        let buf = CaptureBuffer::with_limit(4);
        buf.append(b"abcd");
        assert_eq!(buf.render(), "abcd");
    }

    #[test]
    fn test_split_multibyte_char_is_dropped() {
        let buf = CaptureBuffer::with_limit(4);
        buf.append("abcé!".as_bytes());
        assert_eq!(buf.render(), format!("abc{TRUNCATION_MARKER}"));
    }

    #[test]
    fn test_sealed_buffer_ignores_writes() {
        let buf = CaptureBuffer::unbounded();
        assert!(buf.append(b"a"));
        buf.seal();
        assert!(!buf.append(b"b"));
        assert_eq!(buf.render(), "a");
    }
}
