use std::path::Path;

use crate::{
    error::{VivifyError, VivifyResult},
    model::FrameRgba,
};

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Decode the first frame as PNG and read the dimensions from its header.
///
/// Avoids a second external tool: ffmpeg itself answers the probe, and the
/// IHDR chunk sits at a fixed offset in any valid PNG.
pub(crate) fn probe_dimensions(video_path: &Path) -> VivifyResult<(u32, u32)> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(video_path)
        .args(["-vframes", "1", "-f", "image2pipe", "-vcodec", "png", "pipe:1"])
        .output()
        .map_err(|e| VivifyError::decode(format!("failed to run ffmpeg for probe: {e}")))?;
    if !out.status.success() {
        return Err(VivifyError::decode(format!(
            "ffmpeg probe failed for '{}': {}",
            video_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    parse_png_dimensions(&out.stdout).ok_or_else(|| {
        VivifyError::decode(format!(
            "ffmpeg probe produced no parseable PNG for '{}'",
            video_path.display()
        ))
    })
}

fn parse_png_dimensions(png: &[u8]) -> Option<(u32, u32)> {
    if png.len() < 24 || png[..8] != PNG_SIGNATURE || &png[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
    let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
    (width > 0 && height > 0).then_some((width, height))
}

/// Resample the clip to `fps`, capped at `max_duration_secs`, and return the
/// raw RGBA frames. A trailing partial frame from the pipe is dropped.
pub(crate) fn extract_frames(
    video_path: &Path,
    fps: u32,
    max_duration_secs: f64,
) -> VivifyResult<(u32, u32, Vec<FrameRgba>)> {
    if fps == 0 {
        return Err(VivifyError::decode("cannot resample video at zero fps"));
    }
    if !(max_duration_secs.is_finite() && max_duration_secs > 0.0) {
        return Err(VivifyError::decode(format!(
            "invalid max duration: {max_duration_secs}"
        )));
    }

    let (width, height) = probe_dimensions(video_path)?;

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(video_path)
        .args([
            "-t",
            &format!("{max_duration_secs}"),
            "-vf",
            &format!("fps={fps}"),
            "-pix_fmt",
            "rgba",
            "-f",
            "rawvideo",
            "pipe:1",
        ])
        .output()
        .map_err(|e| VivifyError::decode(format!("failed to run ffmpeg for frame decode: {e}")))?;
    if !out.status.success() {
        return Err(VivifyError::decode(format!(
            "ffmpeg frame decode failed for '{}': {}",
            video_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let frame_size = width as usize * height as usize * 4;
    let frames = out
        .stdout
        .chunks_exact(frame_size)
        .map(|chunk| FrameRgba::new(width, height, chunk.to_vec()))
        .collect::<VivifyResult<Vec<_>>>()?;
    if frames.is_empty() {
        return Err(VivifyError::decode(format!(
            "video '{}' decoded to zero frames",
            video_path.display()
        )));
    }

    tracing::debug!(width, height, frames = frames.len(), "Frames extracted");
    Ok((width, height, frames))
}
