//! Wire format between the host and the encoder worker.
//!
//! One JSON value per line over the worker's stdio: the host writes a single
//! request, the worker streams progress replies and ends with exactly one
//! result or error reply. Binary buffers travel base64-encoded.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};

use crate::model::AnimationResult;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    Encode {
        video_path: PathBuf,
        fps: u32,
        loops: u16,
        max_duration_secs: f64,
        use_chroma_key: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerErrorKind {
    Decode,
    Encode,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerReply {
    Progress {
        frame: u32,
        total_frames: u32,
    },
    Result {
        gif: String,
        apng: String,
        frame_count: u32,
        width: u32,
        height: u32,
    },
    Error {
        kind: WorkerErrorKind,
        message: String,
    },
}

impl WorkerReply {
    pub fn from_animation(animation: &AnimationResult) -> Self {
        WorkerReply::Result {
            gif: BASE64_STANDARD.encode(&animation.gif),
            apng: BASE64_STANDARD.encode(&animation.apng),
            frame_count: animation.frame_count,
            width: animation.width,
            height: animation.height,
        }
    }
}

/// Rebuild the animation from a `Result` reply's fields.
pub fn decode_animation(
    gif: &str,
    apng: &str,
    frame_count: u32,
    width: u32,
    height: u32,
) -> Result<AnimationResult, base64::DecodeError> {
    Ok(AnimationResult {
        gif: BASE64_STANDARD.decode(gif)?,
        apng: BASE64_STANDARD.decode(apng)?,
        frame_count,
        width,
        height,
    })
}
