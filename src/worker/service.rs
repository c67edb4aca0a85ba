use std::{
    io::{BufRead, Write},
    path::Path,
};

use rayon::prelude::*;

use crate::{
    chroma::{apply_reverse, KeyColor, KeyTuning},
    error::{VivifyError, VivifyResult},
    model::AnimationResult,
    worker::{
        encode_apng::encode_apng,
        encode_gif::encode_gif,
        extract::extract_frames,
        protocol::{WorkerErrorKind, WorkerReply, WorkerRequest},
    },
};

/// Serve one encode request over the given streams.
///
/// Media failures (undecodable clip, encoder errors) are reported as
/// structured error replies and the call returns `Ok`. Protocol violations
/// and stream failures propagate as errors so the process exits nonzero.
/// An empty input stream is a no-op.
pub fn run(input: &mut impl BufRead, output: &mut impl Write) -> VivifyResult<()> {
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .map_err(|e| VivifyError::validation(format!("failed to read encode request: {e}")))?;
    if read == 0 || line.trim().is_empty() {
        return Ok(());
    }
    let request: WorkerRequest = serde_json::from_str(line.trim())
        .map_err(|e| VivifyError::validation(format!("invalid encode request: {e}")))?;

    let WorkerRequest::Encode {
        video_path,
        fps,
        loops,
        max_duration_secs,
        use_chroma_key,
    } = request;
    tracing::info!(
        video = %video_path.display(),
        fps,
        use_chroma_key,
        "Encode request received"
    );

    match encode_animation(&video_path, fps, loops, max_duration_secs, use_chroma_key, output) {
        Ok(animation) => write_reply(output, &WorkerReply::from_animation(&animation)),
        Err(e) => match reply_for_error(&e) {
            Some(reply) => {
                tracing::error!(error = %e, "Encode failed");
                write_reply(output, &reply)
            }
            None => Err(e),
        },
    }
}

fn encode_animation(
    video_path: &Path,
    fps: u32,
    loops: u16,
    max_duration_secs: f64,
    use_chroma_key: bool,
    output: &mut impl Write,
) -> VivifyResult<AnimationResult> {
    let (width, height, mut frames) = extract_frames(video_path, fps, max_duration_secs)?;

    if use_chroma_key {
        let tuning = KeyTuning::default();
        frames
            .par_iter_mut()
            .try_for_each(|frame| apply_reverse(frame, KeyColor::MAGENTA, &tuning))?;
    }

    let frame_count = frames.len() as u32;
    let gif = encode_gif(&frames, fps, loops, |frame, total_frames| {
        write_reply(output, &WorkerReply::Progress { frame, total_frames })
    })?;
    let apng = encode_apng(&frames, fps)?;

    Ok(AnimationResult {
        gif,
        apng,
        frame_count,
        width,
        height,
    })
}

/// Media errors become structured replies; anything else crashes the worker.
fn reply_for_error(err: &VivifyError) -> Option<WorkerReply> {
    let (kind, message) = match err {
        VivifyError::Decode(msg) => (WorkerErrorKind::Decode, msg.clone()),
        VivifyError::Encode(msg) | VivifyError::Validation(msg) => {
            (WorkerErrorKind::Encode, msg.clone())
        }
        _ => return None,
    };
    Some(WorkerReply::Error { kind, message })
}

fn write_reply(output: &mut impl Write, reply: &WorkerReply) -> VivifyResult<()> {
    let line = serde_json::to_string(reply).map_err(|e| VivifyError::Other(e.into()))?;
    writeln!(output, "{line}")
        .and_then(|()| output.flush())
        .map_err(|e| VivifyError::Other(e.into()))?;
    Ok(())
}
