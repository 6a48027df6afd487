//! Subprocess plumbing shared by the gpg and git adapters.

use std::io;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Run `cmd` to completion with stdin closed, capturing stdout and stderr.
pub(crate) async fn run(mut cmd: Command) -> io::Result<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd.output().await
}

/// Run `cmd` to completion, feeding `input` on stdin.
///
/// stdin is written from a separate task so a child that fills its stdout pipe
/// before reading all of its input cannot deadlock us.
pub(crate) async fn run_with_input(mut cmd: Command, input: &[u8]) -> io::Result<Output> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stdin not captured"))?;

    let input = input.to_vec();
    let writer = tokio::spawn(async move {
        let written = stdin.write_all(&input).await;
        drop(stdin);
        written
    });

    let output = child.wait_with_output().await?;

    match writer.await {
        Ok(Ok(())) => {}
        // The child exited without draining its input; its exit status and
        // stderr already describe what went wrong.
        Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => return Err(e),
        Err(join) => return Err(io::Error::new(io::ErrorKind::Other, join)),
    }

    Ok(output)
}

/// stderr of a finished process as trimmed text, for error messages.
pub(crate) fn diagnostics(output: &Output) -> String {
    let text = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if text.is_empty() {
        format!("exited with {}", output.status)
    } else {
        text
    }
}
