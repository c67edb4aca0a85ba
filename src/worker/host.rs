use std::{path::PathBuf, process::Stdio};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    process::{Child, Command},
};

use crate::{
    config::RemoteConfig,
    error::{VivifyError, VivifyResult},
    model::AnimationResult,
    progress::{ProgressSink, Stage},
    worker::protocol::{decode_animation, WorkerErrorKind, WorkerReply, WorkerRequest},
};

/// Environment override for the encoder worker binary.
pub const WORKER_ENV: &str = "VIVIFY_WORKER";
/// Default worker binary name, looked up next to the current executable and
/// then on `PATH`.
pub const WORKER_BIN: &str = "vivify-worker";

/// Run one encode request in a separate worker process.
///
/// The worker gets the request on stdin and streams replies on stdout; its
/// stderr is drained for the crash report. Structured error replies map back
/// onto decode/encode errors, while a dead or misbehaving process (nonzero
/// exit, EOF without a result, garbage output, timeout) is a worker crash.
pub async fn run_encode_job(
    cfg: &RemoteConfig,
    request: &WorkerRequest,
    progress: &ProgressSink,
) -> VivifyResult<AnimationResult> {
    let binary = worker_binary(cfg);
    tracing::debug!(binary = %binary.display(), "Spawning encoder worker");

    let mut child = Command::new(&binary)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            VivifyError::worker_crash(format!(
                "failed to spawn encoder worker '{}': {e}",
                binary.display()
            ))
        })?;

    match tokio::time::timeout(cfg.worker_timeout, drive_worker(&mut child, request, progress))
        .await
    {
        Ok(result) => result,
        Err(_) => {
            let _ = child.kill().await;
            Err(VivifyError::worker_crash(format!(
                "encoder worker timed out after {:?}",
                cfg.worker_timeout
            )))
        }
    }
}

async fn drive_worker(
    child: &mut Child,
    request: &WorkerRequest,
    progress: &ProgressSink,
) -> VivifyResult<AnimationResult> {
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| VivifyError::worker_crash("worker stdin unavailable"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| VivifyError::worker_crash("worker stdout unavailable"))?;
    // Drain stderr from the start so a chatty worker cannot fill the pipe
    // and deadlock against our stdout read.
    let stderr = child.stderr.take();
    let stderr_drain = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_end(&mut buf).await;
        }
        buf
    });

    let mut request_line = serde_json::to_string(request)
        .map_err(|e| VivifyError::Other(e.into()))?;
    request_line.push('\n');
    stdin
        .write_all(request_line.as_bytes())
        .await
        .map_err(|e| VivifyError::worker_crash(format!("failed to send encode request: {e}")))?;
    drop(stdin);

    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| VivifyError::worker_crash(format!("failed to read worker output: {e}")))?
    {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WorkerReply>(&line) {
            Ok(WorkerReply::Progress { frame, total_frames }) => {
                if total_frames > 0 {
                    let percent = 95 + ((5 * frame + total_frames / 2) / total_frames).min(5) as u8;
                    progress.emit(
                        Stage::Encoding,
                        percent,
                        format!("Encoding frame {frame}/{total_frames}..."),
                    );
                }
            }
            Ok(WorkerReply::Result {
                gif,
                apng,
                frame_count,
                width,
                height,
            }) => {
                let animation = decode_animation(&gif, &apng, frame_count, width, height)
                    .map_err(|e| {
                        VivifyError::worker_crash(format!("worker sent invalid result payload: {e}"))
                    })?;
                let _ = child.wait().await;
                tracing::info!(frame_count, width, height, "Worker encode complete");
                return Ok(animation);
            }
            Ok(WorkerReply::Error { kind, message }) => {
                return Err(match kind {
                    WorkerErrorKind::Decode => VivifyError::decode(message),
                    WorkerErrorKind::Encode => VivifyError::encode(message),
                });
            }
            Err(_) => {
                return Err(VivifyError::worker_crash(format!(
                    "unexpected worker output: {line}"
                )));
            }
        }
    }

    // EOF without a terminal reply: the worker died or closed stdout early.
    let status = child
        .wait()
        .await
        .map_err(|e| VivifyError::worker_crash(format!("failed to reap encoder worker: {e}")))?;
    let stderr = stderr_drain.await.unwrap_or_default();
    let stderr = String::from_utf8_lossy(&stderr);
    let stderr = stderr.trim();
    if status.success() {
        Err(VivifyError::worker_crash(
            "encoder worker closed its output without a result",
        ))
    } else if stderr.is_empty() {
        Err(VivifyError::worker_crash(format!(
            "encoder worker exited with {status}"
        )))
    } else {
        Err(VivifyError::worker_crash(format!(
            "encoder worker exited with {status}: {stderr}"
        )))
    }
}

fn worker_binary(cfg: &RemoteConfig) -> PathBuf {
    if let Some(path) = &cfg.worker_path {
        return path.clone();
    }
    if let Ok(path) = std::env::var(WORKER_ENV)
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let sibling = dir.join(format!("{WORKER_BIN}{}", std::env::consts::EXE_SUFFIX));
        if sibling.is_file() {
            return sibling;
        }
    }
    PathBuf::from(WORKER_BIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_worker_path_wins() {
        let mut cfg = RemoteConfig::new("test-key").unwrap();
        cfg.worker_path = Some(PathBuf::from("/opt/custom/worker"));
        assert_eq!(worker_binary(&cfg), PathBuf::from("/opt/custom/worker"));
    }
}
