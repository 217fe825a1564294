//! [`Mixer`] implementation backed by the `sox` command-line tool.

use std::ffi::OsString;
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};

use super::{parse_bit_rate, MergeFailure, Mixer};
use crate::config::BroadcastConfig;
use crate::error::MixerError;
use crate::Source;

/// Base bytes kept for replay while the mixer has not produced output yet.
/// Larger than a pipe buffer, so a mixer that never reads loses nothing.
const REPLAY_LIMIT: usize = 256 * 1024;

/// Drives one short-lived `sox` process per probe or merge.
#[derive(Debug, Clone)]
pub struct SoxMixer {
    program: String,
    audio_format: String,
    song_volume: String,
    fx_volume: String,
    chunk_size: usize,
    output_timeout: Duration,
}

impl SoxMixer {
    pub fn new(config: &BroadcastConfig) -> Self {
        Self {
            program: config.mixer_program.clone(),
            audio_format: config.audio_format.clone(),
            song_volume: config.song_volume.clone(),
            fx_volume: config.fx_volume.clone(),
            chunk_size: config.chunk_size.max(1),
            output_timeout: config.mixer_timeout(),
        }
    }

    fn probe_args(path: &Path) -> Vec<OsString> {
        vec!["--i".into(), "-B".into(), path.as_os_str().to_os_string()]
    }

    /// Base on stdin, effect from `effect`, merged output on stdout.
    fn merge_args(&self, effect: &Path) -> Vec<OsString> {
        let format = self.audio_format.as_str();
        vec![
            "-t".into(),
            format.into(),
            "-v".into(),
            self.song_volume.as_str().into(),
            "-m".into(),
            "-".into(),
            "-t".into(),
            format.into(),
            "-v".into(),
            self.fx_volume.as_str().into(),
            effect.as_os_str().to_os_string(),
            "-t".into(),
            format.into(),
            "-".into(),
        ]
    }

    fn spawn_error(&self, source: io::Error) -> MixerError {
        MixerError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

impl Mixer for SoxMixer {
    fn probe_bit_rate(&self, path: &Path) -> Result<u64, MixerError> {
        // `output` drains stdout and stderr concurrently.
        let output = Command::new(&self.program)
            .args(Self::probe_args(path))
            .stdin(Stdio::null())
            .output()
            .map_err(|source| self.spawn_error(source))?;

        let error = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !error.is_empty() {
            return Err(MixerError::Probe(error));
        }
        if !output.status.success() {
            return Err(MixerError::Probe(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        parse_bit_rate(&String::from_utf8_lossy(&output.stdout))
    }

    fn merge(&self, base: Source, effect: &Path) -> Result<Source, MergeFailure> {
        let spawned = Command::new(&self.program)
            .args(self.merge_args(effect))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                return Err(MergeFailure {
                    error: self.spawn_error(source),
                    base,
                })
            }
        };

        let (Some(stdin), Some(mut stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MergeFailure {
                error: MixerError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "mixer pipes unavailable",
                )),
                base,
            });
        };
        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || log_stderr(stderr));
        }

        let chunk_size = self.chunk_size;
        let producing = Arc::new(AtomicBool::new(false));
        let feeder = {
            let producing = producing.clone();
            thread::spawn(move || feed_stdin(base, stdin, chunk_size, &producing))
        };

        // Hold the splice until the mixer proves it is producing audio.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut first = vec![0_u8; chunk_size];
            let read = stdout.read(&mut first);
            let _ = tx.send((read, first, stdout));
        });

        match rx.recv_timeout(self.output_timeout) {
            Ok((Ok(read), mut first, stdout)) if read > 0 => {
                first.truncate(read);
                producing.store(true, Ordering::SeqCst);
                debug!("mixer producing output for {}", effect.display());
                Ok(Box::new(MergedStream {
                    output: Cursor::new(Bytes::from(first)).chain(stdout),
                    child,
                }))
            }
            Ok((Ok(_), _, _)) => Err(abandon(
                child,
                feeder,
                MixerError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "mixer exited without output",
                )),
            )),
            Ok((Err(err), _, _)) => Err(abandon(child, feeder, MixerError::Io(err))),
            Err(_) => Err(abandon(
                child,
                feeder,
                MixerError::Timeout(self.output_timeout),
            )),
        }
    }
}

/// Merged output of a running mixer. Dropping it terminates the process.
struct MergedStream {
    output: io::Chain<Cursor<Bytes>, ChildStdout>,
    child: Child,
}

impl Read for MergedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.output.read(buf)
    }
}

impl Drop for MergedStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Tail of the base bytes handed to a mixer that has not answered yet.
struct Replay {
    bytes: VecDeque<u8>,
    limit: usize,
    dropped: u64,
}

impl Replay {
    fn new(limit: usize) -> Self {
        Self {
            bytes: VecDeque::new(),
            limit,
            dropped: 0,
        }
    }

    fn record(&mut self, chunk: &[u8]) {
        self.bytes.extend(chunk);
        let excess = self.bytes.len().saturating_sub(self.limit);
        if excess > 0 {
            self.bytes.drain(..excess);
            self.dropped += excess as u64;
        }
    }

    fn clear(&mut self) {
        self.bytes = VecDeque::new();
    }

    /// Put the recorded bytes, then `pending`, back in front of `base`.
    fn restore(self, pending: &[u8], base: Source) -> Source {
        if self.dropped > 0 {
            warn!("{} base bytes lost inside the mixer", self.dropped);
        }
        let mut bytes = Vec::from(self.bytes);
        bytes.extend_from_slice(pending);
        Box::new(Cursor::new(Bytes::from(bytes)).chain(base))
    }
}

/// Copy `base` into the mixer's stdin, closing it at end of stream.
///
/// Until `producing` is set, written bytes are also kept for replay: nothing
/// the mixer swallowed before its first output ever reached a listener.
///
/// # Returns
/// What a fallback pipeline should play instead of the mixer output: the
/// replayed bytes followed by the unwritten remainder of `base`.
fn feed_stdin(
    mut base: Source,
    mut stdin: ChildStdin,
    chunk_size: usize,
    producing: &AtomicBool,
) -> Source {
    let mut buf = vec![0_u8; chunk_size];
    let mut replay = Replay::new(REPLAY_LIMIT);
    let mut recording = true;
    loop {
        if recording && producing.load(Ordering::SeqCst) {
            recording = false;
            replay.clear();
        }

        let read = match base.read(&mut buf) {
            Ok(0) => return replay.restore(&[], base),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("base stream read failed while mixing: {}", err);
                return replay.restore(&[], base);
            }
        };
        if let Err(err) = stdin.write_all(&buf[..read]) {
            debug!("mixer stdin closed: {}", err);
            return replay.restore(&buf[..read], base);
        }
        if recording {
            replay.record(&buf[..read]);
        }
    }
}

fn log_stderr(stderr: ChildStderr) {
    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
        let line = line.trim();
        if !line.is_empty() {
            debug!("mixer: {}", line);
        }
    }
}

/// Kill a mixer that failed to produce output and recover the base stream.
fn abandon(mut child: Child, feeder: JoinHandle<Source>, error: MixerError) -> MergeFailure {
    let _ = child.kill();
    let _ = child.wait();
    let base = feeder
        .join()
        .unwrap_or_else(|_| -> Source { Box::new(io::empty()) });
    MergeFailure { error, base }
}
