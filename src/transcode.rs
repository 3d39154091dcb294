//! External transcoder invocation.
//!
//! The source object is streamed into the transcoder's stdin while the
//! process runs, so the original never has to be staged on local disk.

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};

use crate::config::TranscoderConfig;
use crate::error::TranscodeError;
use crate::store::SourceStream;

/// Longest stderr tail kept in an error
const MAX_STDERR: usize = 2048;

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert the source into a mono 16-bit PCM WAV file at `output`
    async fn transcode_to_file(&self, input: SourceStream, output: &Path) -> Result<(), TranscodeError>;

    /// Decode the source into raw mono samples at [`Transcoder::sample_rate`]
    async fn decode_pcm(&self, input: SourceStream) -> Result<Vec<i16>, TranscodeError>;

    fn sample_rate(&self) -> u32;
}

/// Runs an ffmpeg-compatible binary per request
pub struct FfmpegTranscoder {
    program: String,
    sample_rate: u32,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>, sample_rate: u32, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            sample_rate,
            timeout,
        }
    }

    pub fn from_config(config: &TranscoderConfig) -> Self {
        Self::new(config.program.clone(), config.sample_rate, config.timeout())
    }

    fn base_args(&self) -> Vec<String> {
        [
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            "pipe:0",
            "-vn",
            "-ac",
            "1",
            "-ar",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(self.sample_rate.to_string()))
        .collect()
    }

    /// Spawn the transcoder, feed `input` to stdin and collect stdout
    async fn run(&self, args: Vec<String>, input: SourceStream) -> Result<Vec<u8>, TranscodeError> {
        debug!("Running {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TranscodeError::Io(std::io::Error::other("transcoder stdin not captured")))?;

        // Dropping the child on timeout kills the process
        let (fed, output) = tokio::time::timeout(self.timeout, async {
            tokio::join!(feed_stdin(stdin, input), child.wait_with_output())
        })
        .await
        .map_err(|_| TranscodeError::TimedOut(self.timeout))?;

        let output = output?;
        let fed = match fed {
            Err(TranscodeError::Input(msg)) => return Err(TranscodeError::Input(msg)),
            other => other,
        };
        if !output.status.success() {
            return Err(TranscodeError::Exit {
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        fed?;

        Ok(output.stdout)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode_to_file(&self, input: SourceStream, output: &Path) -> Result<(), TranscodeError> {
        let mut args = self.base_args();
        args.extend(
            ["-acodec", "pcm_s16le", "-f", "wav", "-y"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(output.to_string_lossy().into_owned());

        self.run(args, input).await?;
        Ok(())
    }

    async fn decode_pcm(&self, input: SourceStream) -> Result<Vec<i16>, TranscodeError> {
        let mut args = self.base_args();
        args.extend(
            ["-acodec", "pcm_s16le", "-f", "s16le", "pipe:1"]
                .iter()
                .map(|s| s.to_string()),
        );

        let raw = self.run(args, input).await?;
        Ok(raw
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Copy the source stream into the transcoder's stdin, closing it at the end.
/// A transcoder that stops reading early is not an input failure.
async fn feed_stdin(mut stdin: ChildStdin, mut input: SourceStream) -> Result<(), TranscodeError> {
    while let Some(chunk) = input.next().await {
        let chunk = chunk.map_err(|e| TranscodeError::Input(e.to_string()))?;
        match stdin.write_all(&chunk).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(TranscodeError::Io(e)),
        }
    }
    match stdin.shutdown().await {
        Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(TranscodeError::Io(e)),
        _ => Ok(()),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= MAX_STDERR {
        return text.to_string();
    }
    let mut start = text.len() - MAX_STDERR;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
