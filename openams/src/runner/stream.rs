//! Line forwarding from a child's stdout/stderr.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::logging::OUTPUT_TARGET;

/// Merge both pipes line by line into `sink` until the child closes them.
///
/// Lines from the two pipes interleave in arrival order. Returns the number
/// of lines forwarded.
pub(super) async fn forward_lines<O, E, F>(stdout: O, stderr: E, mut sink: F) -> usize
where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
    F: FnMut(&str),
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let out = spawn_reader(stdout, "stdout", tx.clone());
    let err = spawn_reader(stderr, "stderr", tx);

    let mut forwarded = 0;
    while let Some(line) = rx.recv().await {
        sink(&line);
        forwarded += 1;
    }

    let _ = out.await;
    let _ = err.await;
    forwarded
}

/// Console gets the raw line; the log gets it without color codes.
pub(super) fn echo_and_log(line: &str) {
    println!("{}", line);
    tracing::info!(target: OUTPUT_TARGET, "{}", strip_ansi_codes(line));
}

fn spawn_reader<R>(reader: R, stream: &'static str, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(stream, "Failed to read from pipe: {}", e);
                    break;
                }
            }
        }
        tracing::trace!(stream, "Pipe closed");
    })
}

/// CSI escape sequences: colors, cursor motion, line erase.
static CSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").expect("CSI pattern is a valid regex"));

fn strip_ansi_codes(text: &str) -> Cow<'_, str> {
    CSI_RE.replace_all(text, "")
}
