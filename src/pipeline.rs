use std::path::PathBuf;

use crate::{
    chroma::{composite_forward, KeyColor},
    config::RemoteConfig,
    error::{VivifyError, VivifyResult},
    model::{AnimationResult, CutoutImage, GenerateOptions, MotionSpec},
    presets::find_preset,
    progress::{ProgressSink, Stage},
    queue::{self, JobRequest, MODEL_MAX_FRAMES, NEGATIVE_PROMPT},
    upload,
    worker::{self, WorkerRequest},
};

/// End-to-end animation pipeline: composite, upload, generate, download,
/// re-key and encode.
///
/// One instance is cheap and reusable; `generate` can run concurrently from
/// multiple tasks since all state lives in the config and the HTTP client.
pub struct Animator {
    cfg: RemoteConfig,
    client: reqwest::Client,
}

impl Animator {
    pub fn new(cfg: RemoteConfig) -> VivifyResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            client: reqwest::Client::new(),
        })
    }

    /// Config from [`RemoteConfig::from_env`].
    pub fn from_env() -> VivifyResult<Self> {
        Self::new(RemoteConfig::from_env()?)
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.cfg
    }

    /// Turn a static cutout into a short looping animation.
    ///
    /// Stages, in order: composite the cutout onto the key color, upload,
    /// submit to the generation queue, poll until the clip is ready, download
    /// it, then hand it to the encoder worker which keys the backdrop back
    /// out and produces GIF and APNG buffers. Progress lands on `progress`
    /// as a monotonically increasing percentage.
    pub async fn generate(
        &self,
        cutout: &CutoutImage,
        motion: &MotionSpec,
        options: &GenerateOptions,
        progress: &ProgressSink,
    ) -> VivifyResult<AnimationResult> {
        options.validate()?;
        let (prompt, num_frames, fps) = resolve_motion(motion, options)?;
        tracing::info!(
            width = cutout.width,
            height = cutout.height,
            num_frames,
            fps,
            "Starting animation generation"
        );

        progress.emit(Stage::Uploading, 5, "Uploading image...");
        let png = if options.use_chroma_key {
            composite_forward(cutout, KeyColor::MAGENTA).to_png()?
        } else {
            cutout.to_png()?
        };
        let image_url = upload::upload_cutout(&self.client, &self.cfg, &png).await?;

        progress.emit(Stage::Submitting, 10, "Starting generation...");
        let job = queue::submit_job(
            &self.client,
            &self.cfg,
            &JobRequest {
                image_url,
                prompt,
                negative_prompt: NEGATIVE_PROMPT.to_string(),
                num_frames,
                frames_per_second: fps,
            },
        )
        .await?;

        progress.emit(Stage::Queued, 15, "Generating video...");
        let output = queue::await_completion(&self.client, &self.cfg, &job, progress).await?;
        let video_url = output.video_url()?;

        progress.emit(Stage::Downloading, 92, "Downloading video...");
        let video = queue::download_video(&self.client, video_url).await?;

        let video_path = std::env::temp_dir().join(format!(
            "vivify_clip_{}_{}.mp4",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        let _video_tmp = TempFileGuard(Some(video_path.clone()));
        tokio::fs::write(&video_path, &video)
            .await
            .map_err(|e| VivifyError::download(format!("failed to stage downloaded video: {e}")))?;

        progress.emit(Stage::Encoding, 95, "Encoding GIF...");
        let animation = worker::run_encode_job(
            &self.cfg,
            &WorkerRequest::Encode {
                video_path,
                fps,
                loops: options.loops,
                max_duration_secs: options.max_duration_secs,
                use_chroma_key: options.use_chroma_key,
            },
            progress,
        )
        .await?;

        tracing::info!(
            frames = animation.frame_count,
            gif_bytes = animation.gif.len(),
            apng_bytes = animation.apng.len(),
            "Animation ready"
        );
        Ok(animation)
    }
}

/// Resolve a motion spec to (prompt, num_frames, fps).
///
/// Preset frame counts are clamped to the duration cap; custom counts default
/// to it. Everything is clamped to the model's frame ceiling.
fn resolve_motion(motion: &MotionSpec, options: &GenerateOptions) -> VivifyResult<(String, u32, u32)> {
    match motion {
        MotionSpec::Preset { name } => {
            let preset = find_preset(name)
                .ok_or_else(|| VivifyError::validation(format!("unknown preset '{name}'")))?;
            let fps = if preset.fps > 0 { preset.fps } else { options.fps };
            let num_frames = preset
                .num_frames
                .min(duration_frame_cap(fps, options.max_duration_secs))
                .min(MODEL_MAX_FRAMES);
            Ok((preset.prompt, num_frames, fps))
        }
        MotionSpec::Custom { prompt, num_frames } => {
            let prompt = prompt.trim();
            if prompt.is_empty() {
                return Err(VivifyError::validation("custom motion requires a prompt"));
            }
            if let Some(0) = num_frames {
                return Err(VivifyError::validation("num_frames must be non-zero"));
            }
            let fps = options.fps;
            let num_frames = num_frames
                .unwrap_or_else(|| duration_frame_cap(fps, options.max_duration_secs))
                .min(MODEL_MAX_FRAMES);
            Ok((prompt.to_string(), num_frames, fps))
        }
    }
}

fn duration_frame_cap(fps: u32, max_duration_secs: f64) -> u32 {
    ((f64::from(fps) * max_duration_secs).floor() as u32).max(1)
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
