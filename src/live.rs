//! Live listener: feeds a control channel from a reopenable line source.
//!
//! The listener reads one line at a time and waits for each command,
//! renders included, to finish before reading the next. Reaching end of
//! stream does not stop it: the source is reopened and reading resumes
//! until a terminal command arrives or the source reports it is exhausted.

use std::collections::VecDeque;
use std::future::Future;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::control::{ChannelState, ControlChannel, ControlEvent, Dispatch};
use crate::error::{ControlError, RenderError};

/// Pause before reopening a source whose stream failed mid-session.
const REOPEN_BACKOFF: Duration = Duration::from_millis(250);

/// Something the listener can (re)open to obtain a line stream.
pub trait ControlSource {
    type Reader: AsyncBufRead + Unpin + Send;

    /// Open the next session. `Ok(None)` means the source will never
    /// produce another one.
    fn open(&mut self) -> impl Future<Output = io::Result<Option<Self::Reader>>> + Send;
}

/// A named pipe written by an external key-event helper. Opening blocks
/// until a writer appears.
#[derive(Debug, Clone)]
pub struct FifoSource {
    path: PathBuf,
}

impl FifoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FifoSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlSource for FifoSource {
    type Reader = BufReader<File>;

    async fn open(&mut self) -> io::Result<Option<Self::Reader>> {
        debug!(path = %self.path.display(), "opening control pipe");
        if tokio::fs::metadata(&self.path).await?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory, not a pipe", self.path.display()),
            ));
        }
        let file = File::open(&self.path).await?;
        Ok(Some(BufReader::new(file)))
    }
}

/// Pre-recorded sessions, replayed in order. Each session ends with EOF.
#[derive(Debug, Clone, Default)]
pub struct ScriptSource {
    sessions: VecDeque<Vec<u8>>,
}

impl ScriptSource {
    pub fn new<I, B>(sessions: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        ScriptSource {
            sessions: sessions.into_iter().map(Into::into).collect(),
        }
    }

    /// A single session holding the whole file.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        Ok(ScriptSource::new([std::fs::read(path)?]))
    }
}

impl ControlSource for ScriptSource {
    type Reader = Cursor<Vec<u8>>;

    async fn open(&mut self) -> io::Result<Option<Self::Reader>> {
        Ok(self.sessions.pop_front().map(Cursor::new))
    }
}

/// Why the listener stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenExit {
    /// `q` or `exit` was received.
    Terminated,
    /// The source has no more sessions.
    Exhausted,
}

enum Flow {
    Continue,
    Stop,
}

pub struct Listener {
    channel: ControlChannel,
    events: Option<mpsc::UnboundedSender<ControlEvent>>,
}

impl Listener {
    pub fn new(channel: ControlChannel) -> Self {
        Listener {
            channel,
            events: None,
        }
    }

    /// Forward every applied command's event to `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<ControlEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn channel(&self) -> &ControlChannel {
        &self.channel
    }

    pub fn into_channel(self) -> ControlChannel {
        self.channel
    }

    /// Read commands from `source` until a terminal command or exhaustion.
    /// Failing to open the source, or a session that fails before yielding
    /// a single line, is returned as an error. A stream that fails later is
    /// reopened after a short backoff.
    pub async fn run<S: ControlSource>(&mut self, source: &mut S) -> Result<ListenExit, ControlError> {
        loop {
            if self.channel.state() == ChannelState::Closed {
                return Ok(ListenExit::Terminated);
            }
            let Some(mut reader) = source.open().await.map_err(ControlError::Source)? else {
                info!("control source exhausted");
                self.channel.transition(ChannelState::Closed);
                return Ok(ListenExit::Exhausted);
            };
            self.channel.transition(ChannelState::Listening);

            let mut buf = Vec::new();
            let mut lines = 0usize;
            let mut failed = false;
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) if buf.last() != Some(&b'\n') => {
                        debug!(bytes = buf.len(), "discarding unterminated line at end of stream");
                        break;
                    }
                    Ok(_) => lines += 1,
                    Err(e) if lines == 0 => {
                        error!(error = %e, "control stream unreadable");
                        self.channel.transition(ChannelState::Closed);
                        return Err(ControlError::Source(e));
                    }
                    Err(e) => {
                        warn!(error = %e, lines, "control stream read failed, reopening");
                        failed = true;
                        break;
                    }
                }
                let line = String::from_utf8_lossy(&buf);
                if let Flow::Stop = self.step(&line).await {
                    return Ok(ListenExit::Terminated);
                }
            }
            self.channel.transition(ChannelState::Disconnected);
            if failed {
                tokio::time::sleep(REOPEN_BACKOFF).await;
            }
        }
    }

    async fn step(&mut self, line: &str) -> Flow {
        match self.channel.handle_line(line) {
            Ok(Dispatch::Applied(event)) => self.emit(event),
            Ok(Dispatch::Render(job)) => {
                let result = tokio::task::spawn_blocking(move || job.execute())
                    .await
                    .unwrap_or_else(|e| Err(RenderError::Task(e.to_string())));
                match result {
                    Ok(report) => self.emit(ControlEvent::Rendered {
                        path: report.path,
                        samples: report.samples,
                    }),
                    Err(e) => error!(error = %e, "render failed"),
                }
            }
            Ok(Dispatch::Ignored) => {}
            Ok(Dispatch::Quit) => {
                info!("exit requested");
                self.emit(ControlEvent::Closed);
                return Flow::Stop;
            }
            Err(e) => warn!(error = %e, line = line.trim(), "command rejected"),
        }
        Flow::Continue
    }

    fn emit(&self, event: ControlEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching
            let _ = tx.send(event);
        }
    }
}
