//! Diagnostic Relay
//!
//! Copies a child's side-channel output (stderr) into a shared diagnostic
//! sink, up to a byte budget.
//!
//! The sink has two writers: the relay task and the session itself (its
//! `[system]` lines). They take turns through a single-permit token. The
//! session holds the token except while it is blocked waiting on the
//! child, so the child's output lands between the session's lines rather
//! than in the middle of them.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Prefix marking lines written by the judge rather than the child.
pub const SYSTEM_PREFIX: &str = "[system] ";

/// Append-only text destination shared by a session and its relay.
///
/// Writes are synchronous and happen on the calling task. Every write is
/// one short line or one relay chunk (at most 4 KiB), so a local file or
/// an in-memory buffer is assumed; a sink that can stall for long (a
/// network mount, a full pipe) stalls the runtime thread with it.
#[derive(Clone)]
pub struct DiagnosticSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    token: Arc<Semaphore>,
}

impl DiagnosticSink {
    /// Wrap any writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            token: Arc::new(Semaphore::new(1)),
        }
    }

    /// Create (truncate) a log file.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(File::create(path)?))
    }

    /// Wait for exclusive write access.
    ///
    /// Returns `None` only if the token was closed, which never happens
    /// while the sink is alive.
    pub async fn take_turn(&self) -> Option<SinkTurn> {
        let permit = self.token.clone().acquire_owned().await.ok()?;
        Some(SinkTurn {
            sink: self.clone(),
            _permit: permit,
        })
    }

    /// Append bytes without taking the token.
    ///
    /// Only for sinks with a single writer, such as the input transcript.
    pub fn append(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(bytes)?;
        writer.flush()
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticSink")
            .field("available", &self.token.available_permits())
            .finish_non_exhaustive()
    }
}

/// Exclusive write access to a [`DiagnosticSink`]. Released on drop.
pub struct SinkTurn {
    sink: DiagnosticSink,
    _permit: OwnedSemaphorePermit,
}

impl SinkTurn {
    /// Write raw bytes.
    pub fn write_raw(&self, bytes: &[u8]) -> io::Result<()> {
        self.sink.append(bytes)
    }

    /// Write one `[system]` line.
    pub fn system(&self, line: impl fmt::Display) {
        let text = format!("{SYSTEM_PREFIX}{line}\n");
        if let Err(e) = self.write_raw(text.as_bytes()) {
            warn!("diagnostic log write failed: {}", e);
        }
    }
}

/// Background copier from a child's stderr into a [`DiagnosticSink`].
pub struct DiagnosticRelay {
    handle: JoinHandle<usize>,
}

impl DiagnosticRelay {
    /// Start relaying `source` into `sink`, at most `limit` bytes.
    ///
    /// Without a sink the output is drained and discarded so the child
    /// never blocks on a full pipe. Past the limit a truncation notice is
    /// written once and the rest is discarded the same way.
    pub fn spawn<R>(source: R, sink: Option<DiagnosticSink>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self {
            handle: tokio::spawn(relay(source, sink, limit)),
        }
    }

    /// Wait up to `grace` for the source to reach end of stream.
    ///
    /// Returns the number of bytes copied, or `None` if the relay had to
    /// be aborted.
    pub async fn finish(mut self, grace: Duration) -> Option<usize> {
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(Ok(copied)) => Some(copied),
            Ok(Err(e)) => {
                debug!("diagnostic relay task failed: {}", e);
                None
            }
            Err(_) => {
                self.handle.abort();
                None
            }
        }
    }
}

async fn relay<R: AsyncRead + Unpin>(mut source: R, sink: Option<DiagnosticSink>, limit: usize) -> usize {
    let mut buf = [0u8; 4096];
    let mut copied = 0;
    let mut truncated = false;

    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("diagnostic source closed: {}", e);
                break;
            }
        };

        let Some(sink) = sink.as_ref() else { continue };
        if truncated {
            continue;
        }
        let Some(turn) = sink.take_turn().await else { break };

        let take = n.min(limit - copied);
        if let Err(e) = turn.write_raw(&buf[..take]) {
            warn!("diagnostic log write failed: {}", e);
        }
        copied += take;

        if copied >= limit {
            truncated = true;
            let notice = format!(
                "\n{SYSTEM_PREFIX}stderr output have reached the limit(MAX_SIZE={limit} bytes)\n"
            );
            if let Err(e) = turn.write_raw(notice.as_bytes()) {
                warn!("diagnostic log write failed: {}", e);
            }
        }
    }

    copied
}

/// In-memory writer for inspecting sink contents in tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(pub(crate) Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn sink() -> (DiagnosticSink, Self) {
        let buffer = Self::default();
        (DiagnosticSink::new(buffer.clone()), buffer)
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    const GRACE: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_relay_copies_everything_under_limit() {
        let (sink, buffer) = SharedBuffer::sink();
        let relay = DiagnosticRelay::spawn(&b"thinking...\n"[..], Some(sink), 1024);
        assert_eq!(relay.finish(GRACE).await, Some(12));
        assert_eq!(buffer.contents(), "thinking...\n");
    }

    #[tokio::test]
    async fn test_relay_truncates_at_limit() {
        let (sink, buffer) = SharedBuffer::sink();
        let relay = DiagnosticRelay::spawn(&b"0123456789"[..], Some(sink), 4);
        assert_eq!(relay.finish(GRACE).await, Some(4));
        assert_eq!(
            buffer.contents(),
            "0123\n[system] stderr output have reached the limit(MAX_SIZE=4 bytes)\n"
        );
    }

    #[tokio::test]
    async fn test_relay_without_sink_drains() {
        let relay = DiagnosticRelay::spawn(&b"ignored"[..], None, 4);
        assert_eq!(relay.finish(GRACE).await, Some(0));
    }

    #[tokio::test]
    async fn test_relay_waits_for_turn() {
        let (sink, buffer) = SharedBuffer::sink();
        let held = sink.take_turn().await.unwrap();
        held.system("turn: 1");

        let (mut tx, rx) = tokio::io::duplex(64);
        let relay = DiagnosticRelay::spawn(rx, Some(sink.clone()), 1024);
        tx.write_all(b"child says hi\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Still holding the token: nothing from the child yet
        held.system("spend time: 3");
        assert_eq!(buffer.contents(), "[system] turn: 1\n[system] spend time: 3\n");

        drop(held);
        drop(tx);
        relay.finish(GRACE).await;
        assert!(buffer.contents().ends_with("[system] spend time: 3\nchild says hi\n"));
    }

    #[tokio::test]
    async fn test_file_sink_receives_both_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player1.stderr");
        let sink = DiagnosticSink::create(&path).unwrap();

        let turn = sink.take_turn().await.unwrap();
        turn.system("Try : hand shake");
        drop(turn);

        let relay = DiagnosticRelay::spawn(&b"debug output\n"[..], Some(sink.clone()), 1024);
        assert_eq!(relay.finish(GRACE).await, Some(13));

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "[system] Try : hand shake\ndebug output\n");
    }

    #[test]
    fn test_append_bypasses_token() {
        let (sink, buffer) = SharedBuffer::sink();
        sink.append(b"12\n").unwrap();
        assert_eq!(buffer.contents(), "12\n");
    }
}
