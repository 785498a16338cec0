//! Deadline-Bounded Reply Channel
//!
//! Reads whitespace-separated integers from a child's output under a
//! deadline and a kill switch. The read future is dropped when either
//! fires, so nothing is left blocked behind it.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tracing::debug;

use crate::player::protocol::parse_int;

/// Tokens longer than this are cut off and fail to parse.
const MAX_TOKEN_LEN: usize = 1024;

/// Result of one deadline-bounded read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    /// All values arrived and parsed.
    Value(T),
    /// The deadline elapsed first.
    TimedOut,
    /// End of stream, I/O error, or the kill switch fired.
    Closed,
    /// A token was not a decimal integer.
    ParseError(String),
}

/// One-shot cancellation signal for in-flight reads.
#[derive(Clone, Debug)]
pub struct KillSwitch {
    tx: Arc<watch::Sender<bool>>,
}

impl KillSwitch {
    /// A fresh, untriggered switch.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the switch. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Has the switch been fired?
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader for a child's reply stream.
pub struct ReplyReader<R> {
    inner: BufReader<R>,
    cancel: watch::Receiver<bool>,
}

impl<R: AsyncRead + Unpin> ReplyReader<R> {
    /// Wrap `inner`; reads abort once `kill_switch` fires.
    pub fn new(inner: R, kill_switch: &KillSwitch) -> Self {
        Self {
            inner: BufReader::new(inner),
            cancel: kill_switch.subscribe(),
        }
    }

    /// Read `N` integers, giving up after `deadline`.
    ///
    /// A zero deadline still accepts a reply that is already buffered.
    pub async fn read_ints<const N: usize>(&mut self, deadline: Duration) -> ReadOutcome<[i32; N]> {
        let Self { inner, cancel } = self;
        tokio::select! {
            biased;
            _ = cancelled(cancel) => ReadOutcome::Closed,
            result = tokio::time::timeout(deadline, read_values::<_, N>(inner)) => {
                result.unwrap_or(ReadOutcome::TimedOut)
            }
        }
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|&fired| fired).await.is_err() {
        // Switch dropped without firing: never cancel.
        std::future::pending::<()>().await;
    }
}

async fn read_values<R: AsyncBufRead + Unpin, const N: usize>(reader: &mut R) -> ReadOutcome<[i32; N]> {
    let mut values = [0; N];
    for slot in values.iter_mut() {
        let token = match read_token(reader).await {
            Ok(Some(token)) => token,
            Ok(None) => return ReadOutcome::Closed,
            Err(e) => {
                debug!("reply stream error: {}", e);
                return ReadOutcome::Closed;
            }
        };
        match parse_int(&token) {
            Ok(value) => *slot = value,
            Err(msg) => return ReadOutcome::ParseError(msg),
        }
    }
    ReadOutcome::Value(values)
}

/// Next whitespace-delimited token, or `None` at end of stream.
async fn read_token<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut token = Vec::new();
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok((!token.is_empty()).then(|| String::from_utf8_lossy(&token).into_owned()));
        }

        let mut used = 0;
        let mut complete = false;
        for &b in buf {
            used += 1;
            if b.is_ascii_whitespace() {
                if token.is_empty() {
                    continue;
                }
                complete = true;
                break;
            }
            token.push(b);
            if token.len() >= MAX_TOKEN_LEN {
                complete = true;
                break;
            }
        }
        reader.consume(used);

        if complete {
            return Ok(Some(String::from_utf8_lossy(&token).into_owned()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    const LONG: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_reads_values_across_lines() {
        let switch = KillSwitch::new();
        let mut reader = ReplyReader::new(&b"  0\n-1\t 1\n"[..], &switch);
        assert_eq!(reader.read_ints::<1>(LONG).await, ReadOutcome::Value([0]));
        assert_eq!(reader.read_ints::<2>(LONG).await, ReadOutcome::Value([-1, 1]));
        assert_eq!(reader.read_ints::<1>(LONG).await, ReadOutcome::Closed);
    }

    #[tokio::test]
    async fn test_last_token_without_newline() {
        let switch = KillSwitch::new();
        let mut reader = ReplyReader::new(&b"1 0"[..], &switch);
        assert_eq!(reader.read_ints::<2>(LONG).await, ReadOutcome::Value([1, 0]));
    }

    #[tokio::test]
    async fn test_parse_error_reported() {
        let switch = KillSwitch::new();
        let mut reader = ReplyReader::new(&b"1 up\n"[..], &switch);
        match reader.read_ints::<2>(LONG).await {
            ReadOutcome::ParseError(msg) => assert!(msg.contains("\"up\"")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_partial_reply_then_eof_is_closed() {
        let switch = KillSwitch::new();
        let mut reader = ReplyReader::new(&b"1\n"[..], &switch);
        assert_eq!(reader.read_ints::<2>(LONG).await, ReadOutcome::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_writer_times_out() {
        let (_tx, rx) = tokio::io::duplex(64);
        let switch = KillSwitch::new();
        let mut reader = ReplyReader::new(rx, &switch);
        let outcome = reader.read_ints::<1>(Duration::from_millis(300)).await;
        assert_eq!(outcome, ReadOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_zero_deadline_accepts_buffered_reply() {
        let switch = KillSwitch::new();
        let mut reader = ReplyReader::new(&b"0\n"[..], &switch);
        assert_eq!(reader.read_ints::<1>(Duration::ZERO).await, ReadOutcome::Value([0]));
    }

    #[tokio::test]
    async fn test_kill_switch_unblocks_read() {
        let (_tx, rx) = tokio::io::duplex(64);
        let switch = KillSwitch::new();
        let mut reader = ReplyReader::new(rx, &switch);

        let trigger = switch.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });

        assert_eq!(reader.read_ints::<1>(LONG).await, ReadOutcome::Closed);
        assert!(switch.is_triggered());
    }

    #[tokio::test]
    async fn test_reply_split_across_writes() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let switch = KillSwitch::new();
        let mut reader = ReplyReader::new(rx, &switch);

        tokio::spawn(async move {
            tx.write_all(b"-").await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.write_all(b"1 1\n").await.unwrap();
        });

        assert_eq!(reader.read_ints::<2>(LONG).await, ReadOutcome::Value([-1, 1]));
    }
}
