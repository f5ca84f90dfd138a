//! Output multiplexing
//!
//! Every worker stream gets its own reader task. Readers persist raw bytes
//! to the worker's transcript and forward complete lines over a channel to
//! a single writer task, which is the only thing that touches the console.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::{OutputLine, StreamKind};

const CHANNEL_CAPACITY: usize = 1024;

/// Destination for multiplexed lines
pub trait LineSink: Send + 'static {
    fn write_line(&mut self, line: &OutputLine) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes prefixed lines to any `Write`, normally stdout
pub struct ConsoleSink<W: Write + Send + 'static> {
    out: W,
    colorize: bool,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send + 'static> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            colorize: true,
        }
    }

    pub fn colorize(mut self, enabled: bool) -> Self {
        self.colorize = enabled;
        self
    }

    fn prefix(&self, line: &OutputLine) -> String {
        let prefix = line.prefix();
        if !self.colorize {
            return prefix;
        }
        // Cycle through six ANSI colors per group; stderr is always red.
        let color = match line.stream {
            StreamKind::Stderr => 31,
            StreamKind::Stdout => 32 + (line.partition % 6) as u8,
        };
        format!("\x1b[{color}m{prefix}\x1b[0m")
    }
}

impl<W: Write + Send + 'static> LineSink for ConsoleSink<W> {
    fn write_line(&mut self, line: &OutputLine) -> io::Result<()> {
        let prefix = self.prefix(line);
        writeln!(self.out, "{} {}", prefix, line.text)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Owns the console writer task and hands out senders to readers
pub struct Multiplexer {
    tx: mpsc::Sender<OutputLine>,
    writer: JoinHandle<io::Result<u64>>,
}

impl Multiplexer {
    /// Start the writer task.
    ///
    /// The sink does blocking writes, so it runs on the blocking pool.
    pub fn start<S: LineSink>(mut sink: S) -> Self {
        let (tx, mut rx) = mpsc::channel::<OutputLine>(CHANNEL_CAPACITY);

        let writer = tokio::task::spawn_blocking(move || {
            let mut written = 0u64;
            while let Some(line) = rx.blocking_recv() {
                sink.write_line(&line)?;
                written += 1;
                // Flush once the burst is drained so live output stays live.
                if rx.is_empty() {
                    sink.flush()?;
                }
            }
            sink.flush()?;
            Ok(written)
        });

        Self { tx, writer }
    }

    pub fn sender(&self) -> mpsc::Sender<OutputLine> {
        self.tx.clone()
    }

    /// Attach reader tasks for one worker's stdout and stderr
    pub fn attach<O, E>(
        &self,
        partition: usize,
        stdout: O,
        stderr: E,
        transcript: Transcript,
    ) -> Vec<JoinHandle<io::Result<()>>>
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        vec![
            tokio::spawn(pump(
                partition,
                StreamKind::Stdout,
                stdout,
                transcript.clone(),
                self.sender(),
            )),
            tokio::spawn(pump(
                partition,
                StreamKind::Stderr,
                stderr,
                transcript,
                self.sender(),
            )),
        ]
    }

    /// Close the channel and wait until every queued line is written.
    ///
    /// Returns the number of lines written to the sink.
    pub async fn finish(self) -> io::Result<u64> {
        drop(self.tx);
        self.writer
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

/// Raw output capture shared by the two readers of one worker
#[derive(Clone)]
pub struct Transcript {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl Transcript {
    pub async fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::create(&path).await?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one chunk while holding the lock, keeping lines whole
    async fn append(&self, bytes: &[u8]) -> io::Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(bytes).await
    }

    async fn flush(&self) -> io::Result<()> {
        let mut file = self.file.lock().await;
        file.flush().await
    }
}

/// Copy one stream into the transcript and the console channel.
///
/// A closed console channel does not stop the copy: the transcript must
/// still receive everything the worker writes. A failed transcript write
/// does not stop it either; the pipe is drained to EOF and the first
/// write error is returned once the stream closes.
async fn pump<R>(
    partition: usize,
    stream: StreamKind,
    reader: R,
    transcript: Transcript,
    tx: mpsc::Sender<OutputLine>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut console_open = true;
    let mut transcript_error: Option<io::Error> = None;
    let mut lines = 0u64;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        lines += 1;

        if transcript_error.is_none() {
            if let Err(e) = transcript.append(&buf).await {
                warn!(
                    "group {} transcript {} write failed: {}; console only from here",
                    partition + 1,
                    transcript.path().display(),
                    e
                );
                transcript_error = Some(e);
            }
        }

        if console_open {
            let line = OutputLine::from_bytes(partition, stream, &buf);
            if tx.send(line).await.is_err() {
                warn!(
                    "Console sink closed; group {} output continues to transcript only",
                    partition + 1
                );
                console_open = false;
            }
        }
    }

    debug!("group {} {} closed after {} lines", partition + 1, stream, lines);
    match transcript_error {
        Some(e) => Err(io::Error::new(
            e.kind(),
            format!("{}: {e}", transcript.path().display()),
        )),
        None => transcript.flush().await,
    }
}
