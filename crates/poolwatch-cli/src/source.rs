//! Line sources feeding the processor.
//!
//! A source runs as its own task and pushes complete lines, in order, into a
//! single bounded channel. It stops quietly once the receiving side is gone.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::SourceError;

/// Lines longer than this are dropped.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Where raw lines come from.
#[derive(Debug, Clone)]
pub enum LineSource {
    /// Follow a growing file.
    File(FileTailer),
    /// Read standard input until EOF.
    Stdin,
}

impl LineSource {
    /// Runs the source until it ends or the receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns a `SourceError` if standard input cannot be read.
    pub async fn run(self, tx: mpsc::Sender<String>) -> Result<(), SourceError> {
        match self {
            Self::File(tailer) => {
                tailer.run(tx).await;
                Ok(())
            }
            Self::Stdin => read_lines(tokio::io::stdin(), tx).await,
        }
    }
}

/// Result of feeding bytes to a [`LineBuffer`].
#[derive(Debug, PartialEq, Eq)]
enum Fed {
    /// A complete line, without its terminator.
    Line(String),
    /// An over-long line ended and was discarded.
    Dropped,
    /// No line end yet.
    Partial,
}

/// Assembles lines from arbitrary byte chunks.
///
/// Bytes are kept until a newline arrives, so a line split across writes is
/// only emitted once it is complete. Lines over [`MAX_LINE_BYTES`] are
/// discarded without being buffered in full.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
    overflowed: bool,
}

impl LineBuffer {
    /// Consumes bytes up to and including the first newline.
    ///
    /// Returns how many bytes were consumed.
    fn feed(&mut self, bytes: &[u8]) -> (usize, Fed) {
        match bytes.iter().position(|b| *b == b'\n') {
            Some(end) => {
                self.append(&bytes[..end]);
                (end + 1, self.finish())
            }
            None => {
                self.append(bytes);
                (bytes.len(), Fed::Partial)
            }
        }
    }

    /// Emits whatever is buffered as a final, unterminated line.
    fn flush(&mut self) -> Fed {
        if self.pending.is_empty() && !self.overflowed {
            return Fed::Partial;
        }
        self.finish()
    }

    fn append(&mut self, bytes: &[u8]) {
        if self.overflowed {
            return;
        }
        if self.pending.len() + bytes.len() > MAX_LINE_BYTES {
            self.overflowed = true;
            self.pending = Vec::new();
        } else {
            self.pending.extend_from_slice(bytes);
        }
    }

    fn finish(&mut self) -> Fed {
        if std::mem::take(&mut self.overflowed) {
            return Fed::Dropped;
        }
        let line = String::from_utf8_lossy(&self.pending)
            .trim_end_matches('\r')
            .to_string();
        self.pending.clear();
        Fed::Line(line)
    }
}

/// Sends a completed line downstream.
///
/// Returns false once the receiver is gone.
async fn emit(tx: &mpsc::Sender<String>, fed: Fed) -> bool {
    match fed {
        Fed::Line(line) => tx.send(line).await.is_ok(),
        Fed::Dropped => {
            warn!(max = MAX_LINE_BYTES, "dropping over-long line");
            true
        }
        Fed::Partial => true,
    }
}

/// Reads newline-delimited text from any async reader until EOF.
///
/// A final line without a trailing newline is still delivered.
///
/// # Errors
///
/// Returns `SourceError::Io` if the reader fails.
pub async fn read_lines<R>(reader: R, tx: mpsc::Sender<String>) -> Result<(), SourceError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut lines = LineBuffer::default();

    loop {
        let bytes = reader.fill_buf().await?;
        let eof = bytes.is_empty();
        let fed = if eof {
            lines.flush()
        } else {
            let (used, fed) = lines.feed(bytes);
            reader.consume(used);
            fed
        };

        if !emit(&tx, fed).await {
            debug!("line receiver closed");
            return Ok(());
        }
        if eof {
            break;
        }
    }

    info!("input stream ended");
    Ok(())
}

/// Lifecycle of a [`FileTailer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    /// The file does not exist (yet) or could not be opened.
    WaitingForSource,
    /// The file is open and being followed.
    Streaming,
}

/// Follows a log file the way `tail -F` does.
///
/// - waits for the file to appear
/// - buffers a trailing partial line until its newline is written
/// - starts over from the beginning when the file shrinks (truncation or
///   copy-truncate rotation) or disappears
#[derive(Debug, Clone)]
pub struct FileTailer {
    path: PathBuf,
    poll_interval: Duration,
    wait_interval: Duration,
    from_end: bool,
}

impl FileTailer {
    /// Creates a tailer for `path` that starts reading at the beginning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: Duration::from_millis(100),
            wait_interval: Duration::from_secs(2),
            from_end: false,
        }
    }

    /// Sets how long to sleep at end of file.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets how long to sleep while waiting for the file to exist.
    #[must_use]
    pub const fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    /// Skips content already in the file when it is first opened.
    #[must_use]
    pub const fn from_end(mut self, from_end: bool) -> Self {
        self.from_end = from_end;
        self
    }

    /// Returns the followed path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Follows the file until the receiver is dropped.
    pub async fn run(self, tx: mpsc::Sender<String>) {
        let mut skip_existing = self.from_end;

        while let Some(file) = self.wait_for_file(&tx).await {
            match self.stream(file, skip_existing, &tx).await {
                StreamEnd::ReceiverClosed => break,
                StreamEnd::Reopen => skip_existing = false,
            }
        }
        debug!(path = %self.path.display(), "tailer stopped");
    }

    async fn wait_for_file(&self, tx: &mpsc::Sender<String>) -> Option<File> {
        let mut logged = false;
        loop {
            if tx.is_closed() {
                return None;
            }

            match File::open(&self.path).await {
                Ok(file) => return Some(file),
                Err(e) => {
                    if !logged {
                        info!(
                            path = %self.path.display(),
                            state = ?TailState::WaitingForSource,
                            error = %e,
                            "waiting for log file"
                        );
                        logged = true;
                    }
                    tokio::time::sleep(self.wait_interval).await;
                }
            }
        }
    }

    async fn stream(
        &self,
        mut file: File,
        skip_existing: bool,
        tx: &mpsc::Sender<String>,
    ) -> StreamEnd {
        let opened = match file.metadata().await {
            Ok(meta) => FileId::of(&meta),
            Err(_) => None,
        };

        let mut position = 0;
        if skip_existing {
            match file.seek(SeekFrom::End(0)).await {
                Ok(end) => position = end,
                Err(e) => {
                    warn!(error = %e, "failed to seek to end of log file");
                    return StreamEnd::Reopen;
                }
            }
        }

        info!(
            path = %self.path.display(),
            state = ?TailState::Streaming,
            offset = position,
            "following log file"
        );

        let mut reader = BufReader::new(file);
        let mut lines = LineBuffer::default();

        loop {
            let bytes = match reader.fill_buf().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "failed to read log file, reopening");
                    return StreamEnd::Reopen;
                }
            };

            if bytes.is_empty() {
                if tx.is_closed() {
                    return StreamEnd::ReceiverClosed;
                }
                if let Some(end) = self.check_rotation(position, opened).await {
                    return end;
                }
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let (used, fed) = lines.feed(bytes);
            reader.consume(used);
            position += used as u64;

            if !emit(tx, fed).await {
                return StreamEnd::ReceiverClosed;
            }
        }
    }

    /// Decides whether the file must be reopened after reaching its end.
    ///
    /// The path is reopened when it now names a different file, or when the
    /// file shrank below the read offset.
    async fn check_rotation(&self, position: u64, opened: Option<FileId>) -> Option<StreamEnd> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if opened.is_some() && FileId::of(&meta) != opened => {
                info!(path = %self.path.display(), "log file replaced, reopening");
                Some(StreamEnd::Reopen)
            }
            Ok(meta) if meta.len() < position => {
                warn!(
                    path = %self.path.display(),
                    size = meta.len(),
                    offset = position,
                    "log file truncated, reopening"
                );
                Some(StreamEnd::Reopen)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "log file disappeared");
                Some(StreamEnd::Reopen)
            }
        }
    }
}

enum StreamEnd {
    ReceiverClosed,
    Reopen,
}

/// Device and inode of an opened file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    #[cfg(unix)]
    fn of(meta: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::time::timeout;

    const STEP: Duration = Duration::from_secs(5);

    fn fast(path: impl Into<PathBuf>) -> FileTailer {
        FileTailer::new(path)
            .with_poll_interval(Duration::from_millis(10))
            .with_wait_interval(Duration::from_millis(10))
    }

    async fn next(rx: &mut mpsc::Receiver<String>) -> String {
        timeout(STEP, rx.recv()).await.unwrap().unwrap()
    }

    fn append(path: &std::path::Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    mod tailer_tests {
        use super::*;

        #[tokio::test]
        async fn reads_existing_then_new_lines() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("access.log");
            append(&path, "first\nsecond\n");

            let (tx, mut rx) = mpsc::channel(16);
            let task = tokio::spawn(fast(&path).run(tx));

            assert_eq!(next(&mut rx).await, "first");
            assert_eq!(next(&mut rx).await, "second");

            append(&path, "third\r\n");
            assert_eq!(next(&mut rx).await, "third");

            drop(rx);
            timeout(STEP, task).await.unwrap().unwrap();
        }

        #[tokio::test]
        async fn waits_for_file_to_appear() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("late.log");

            let (tx, mut rx) = mpsc::channel(16);
            let task = tokio::spawn(fast(&path).run(tx));

            tokio::time::sleep(Duration::from_millis(50)).await;
            append(&path, "hello\n");
            assert_eq!(next(&mut rx).await, "hello");

            drop(rx);
            timeout(STEP, task).await.unwrap().unwrap();
        }

        #[tokio::test]
        async fn joins_partial_writes() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("partial.log");
            append(&path, "pool=\"bl");

            let (tx, mut rx) = mpsc::channel(16);
            let task = tokio::spawn(fast(&path).run(tx));

            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(rx.try_recv().is_err());

            append(&path, "ue\"\n");
            assert_eq!(next(&mut rx).await, "pool=\"blue\"");

            drop(rx);
            timeout(STEP, task).await.unwrap().unwrap();
        }

        #[tokio::test]
        async fn from_end_skips_existing_content() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("old.log");
            append(&path, "old line\n");

            let (tx, mut rx) = mpsc::channel(16);
            let task = tokio::spawn(fast(&path).from_end(true).run(tx));

            tokio::time::sleep(Duration::from_millis(50)).await;
            append(&path, "new line\n");
            assert_eq!(next(&mut rx).await, "new line");

            drop(rx);
            timeout(STEP, task).await.unwrap().unwrap();
        }

        #[tokio::test]
        async fn restarts_after_truncation() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("rotated.log");
            append(&path, "a long line before rotation\n");

            let (tx, mut rx) = mpsc::channel(16);
            let task = tokio::spawn(fast(&path).run(tx));
            assert_eq!(next(&mut rx).await, "a long line before rotation");

            std::fs::write(&path, "").unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            append(&path, "after\n");
            assert_eq!(next(&mut rx).await, "after");

            drop(rx);
            timeout(STEP, task).await.unwrap().unwrap();
        }

        #[cfg(unix)]
        #[tokio::test]
        async fn follows_rename_and_create_rotation() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("access.log");
            append(&path, "old\n");

            let (tx, mut rx) = mpsc::channel(16);
            let task = tokio::spawn(fast(&path).run(tx));
            assert_eq!(next(&mut rx).await, "old");

            std::fs::rename(&path, dir.path().join("access.log.1")).unwrap();
            append(&path, "a first line in the new file, longer than the old one\n");
            assert_eq!(
                next(&mut rx).await,
                "a first line in the new file, longer than the old one"
            );

            append(&path, "second\n");
            assert_eq!(next(&mut rx).await, "second");

            drop(rx);
            timeout(STEP, task).await.unwrap().unwrap();
        }

        #[tokio::test]
        async fn stops_while_waiting_when_receiver_dropped() {
            let dir = tempfile::tempdir().unwrap();
            let (tx, rx) = mpsc::channel(1);
            let task = tokio::spawn(fast(dir.path().join("never.log")).run(tx));

            drop(rx);
            timeout(STEP, task).await.unwrap().unwrap();
        }
    }

    mod line_buffer_tests {
        use super::*;

        #[test]
        fn splits_on_newline_only() {
            let mut lines = LineBuffer::default();

            assert_eq!(lines.feed(b"abc"), (3, Fed::Partial));
            assert_eq!(lines.feed(b"def\r\nrest"), (5, Fed::Line("abcdef".to_string())));
            assert_eq!(lines.flush(), Fed::Partial);
        }

        #[test]
        fn flush_emits_unterminated_tail() {
            let mut lines = LineBuffer::default();
            lines.feed(b"tail");
            assert_eq!(lines.flush(), Fed::Line("tail".to_string()));
        }

        #[test]
        fn overflow_discards_whole_line() {
            let mut lines = LineBuffer::default();
            let big = vec![b'x'; MAX_LINE_BYTES];

            assert_eq!(lines.feed(&big).1, Fed::Partial);
            assert_eq!(lines.feed(b"yy").1, Fed::Partial);
            assert_eq!(lines.feed(b"z\n").1, Fed::Dropped);
            assert_eq!(lines.feed(b"ok\n").1, Fed::Line("ok".to_string()));
        }

        #[test]
        fn invalid_utf8_is_replaced() {
            let mut lines = LineBuffer::default();
            let (_, fed) = lines.feed(b"pool=\"blue\" \xff\n");
            assert_eq!(fed, Fed::Line("pool=\"blue\" \u{fffd}".to_string()));
        }
    }

    mod reader_tests {
        use super::*;

        #[tokio::test]
        async fn reads_lines_until_eof() {
            let input: &[u8] = b"one\ntwo\r\nthree";
            let (tx, mut rx) = mpsc::channel(16);

            read_lines(input, tx).await.unwrap();

            assert_eq!(rx.recv().await.unwrap(), "one");
            assert_eq!(rx.recv().await.unwrap(), "two");
            assert_eq!(rx.recv().await.unwrap(), "three");
            assert!(rx.recv().await.is_none());
        }

        #[tokio::test]
        async fn drops_over_long_lines() {
            let mut input = "x".repeat(MAX_LINE_BYTES + 10);
            input.push_str("\nshort\n");
            let (tx, mut rx) = mpsc::channel(16);

            read_lines(input.as_bytes(), tx).await.unwrap();

            assert_eq!(rx.recv().await.unwrap(), "short");
            assert!(rx.recv().await.is_none());
        }

        #[tokio::test]
        async fn stops_when_receiver_dropped() {
            let (tx, rx) = mpsc::channel(1);
            drop(rx);
            let input: &[u8] = b"a\nb\n";
            assert!(read_lines(input, tx).await.is_ok());
        }
    }
}
