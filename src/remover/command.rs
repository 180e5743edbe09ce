//! External program backend.
//!
//! Encodes the input as PNG, writes it to the child's stdin and decodes
//! whatever image the child writes to stdout. The default invocation is
//! `rembg i - -`. With a deadline set, a child still running when it
//! expires is killed and reaped before `remove` returns.

use std::io::{Cursor, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat, RgbaImage};

use super::{BackgroundRemover, RemovalError};
use crate::config::DEFAULT_MAX_DIMENSION;
use crate::imaging;

/// How often a child with a deadline is polled for exit.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct CommandRemover {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    max_dimension: u32,
}

impl CommandRemover {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            timeout: None,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Kill the child if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap the width and height of the image read back from the child.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, RemovalError> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                // The child may exit between try_wait and kill; wait() reaps either way.
                if let Err(e) = child.kill() {
                    tracing::debug!(error = %e, "Kill after deadline failed");
                }
                child.wait()?;
                tracing::warn!(
                    program = %self.program,
                    timeout_secs = timeout.as_secs(),
                    "Removal process killed after deadline"
                );
                return Err(RemovalError::TimedOut {
                    program: self.program.clone(),
                    seconds: timeout.as_secs(),
                });
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_reader(handle: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>, RemovalError> {
    let read = handle
        .join()
        .map_err(|_| RemovalError::Unsupported("pipe reader thread panicked".to_string()))?;
    Ok(read?)
}

impl BackgroundRemover for CommandRemover {
    fn name(&self) -> &'static str {
        "command"
    }

    fn remove(&self, image: DynamicImage) -> Result<RgbaImage, RemovalError> {
        let mut input = Vec::new();
        image.write_to(&mut Cursor::new(&mut input), ImageFormat::Png)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RemovalError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Pipes are serviced from their own threads so a child that streams
        // output before consuming all input cannot deadlock on a full pipe.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RemovalError::Unsupported("child stdin unavailable".to_string()))?;
        let writer = std::thread::spawn(move || stdin.write_all(&input));
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        // On timeout the pipe threads are left detached; they end once the
        // killed child's pipes close.
        let status = self.wait(&mut child)?;

        let written = writer.join().map_err(|_| {
            RemovalError::Unsupported("stdin writer thread panicked".to_string())
        })?;
        let stdout = join_reader(stdout)?;
        let stderr = join_reader(stderr)?;

        // A failing child often exits before reading its input, so the exit
        // status takes precedence over a broken pipe on stdin.
        if !status.success() {
            return Err(RemovalError::CommandFailed {
                program: self.program.clone(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        written?;

        tracing::debug!(
            program = %self.program,
            output_bytes = stdout.len(),
            "Removal process finished"
        );

        Ok(imaging::read_limited(&stdout, self.max_dimension)?.into_rgba8())
    }
}
