//! Process-filter bridge — routes a pipeline through an external command.
//!
//! The upstream's bytes are fed to the child's stdin from a background task;
//! the child's stdout, re-framed into line records, becomes the downstream
//! pipeline. Stderr is not wired. A launch failure (missing executable,
//! permission) is reported as the first item of the downstream pipeline,
//! because the caller already holds the handle by the time the failure is
//! known.

use crate::error::Error;
use crate::pipeline::Pipeline;
use crate::record::LineRecord;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Launch options for [`Pipeline::spawn_with`]. Stdio wiring is fixed:
/// stdin and stdout piped, stderr ignored.
#[derive(Debug, Default, Clone)]
pub struct SpawnOptions {
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,
}

pub(crate) fn spawn_filter(
    upstream: BoxStream<'static, crate::Result<LineRecord>>,
    command: String,
    args: Vec<OsString>,
    options: SpawnOptions,
) -> Pipeline {
    let mut cmd = Command::new(&command);
    cmd.args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    if let Some(cwd) = options.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in options.env {
        cmd.env(key, value);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            tracing::debug!(command = %command, error = %source, "filter launch failed");
            return Pipeline::fail(Error::Spawn { command, source });
        }
    };
    tracing::debug!(command = %command, "filter process launched");

    let mut stdin = child.stdin.take().expect("stdin was configured as piped");
    let stdout = child.stdout.take().expect("stdout was configured as piped");

    tokio::spawn(async move {
        let mut upstream = upstream;
        while let Some(item) = upstream.next().await {
            match item {
                Ok(record) => {
                    // The filter may close its input early (e.g. `head`);
                    // stop feeding, its output stands on its own.
                    if stdin.write_all(record.as_bytes()).await.is_err() {
                        tracing::debug!(command = %command, "filter closed its input");
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(command = %command, error = %e, "upstream failed while feeding filter");
                    break;
                }
            }
        }
        // Upstream end-of-input: close the child's stdin without touching
        // its stdout.
        drop(stdin);
        match child.wait().await {
            Ok(status) => tracing::debug!(command = %command, %status, "filter exited"),
            Err(e) => tracing::warn!(command = %command, error = %e, "failed to reap filter"),
        }
    });

    Pipeline::from_reader(stdout)
}
