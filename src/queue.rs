use tokio::time::sleep;

use crate::{
    config::RemoteConfig,
    error::{VivifyError, VivifyResult},
    progress::{ProgressSink, Stage},
    upload::error_detail,
};

/// Hard ceiling the video model puts on frame count per job.
pub const MODEL_MAX_FRAMES: u32 = 65;

/// Steers the model away from the usual image-to-video artifacts. Background
/// terms matter most: the frames are later keyed against a solid backdrop, so
/// any scenery the model invents would survive into the output.
pub const NEGATIVE_PROMPT: &str = "distortion, morphing, deformation, extra limbs, extra body parts, disfigured, mutated, ugly, blurry, low quality, watermark, text, unrealistic proportions, melting, stretching, warping, duplicate, clone, split body, merged body parts, background change, new background, scenery, environment, landscape, background replacement, color shift";

/// What gets submitted to the queue.
#[derive(Clone, Debug)]
pub struct JobRequest {
    pub image_url: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub num_frames: u32,
    pub frames_per_second: u32,
}

#[derive(serde::Serialize)]
struct SubmitBody<'a> {
    image_url: &'a str,
    prompt: &'a str,
    negative_prompt: &'a str,
    num_frames: u32,
    frames_per_second: u32,
    resolution: &'static str,
    aspect_ratio: &'static str,
    num_inference_steps: u32,
    guidance_scale: f64,
    enable_safety_checker: bool,
}

#[derive(Debug, serde::Deserialize)]
struct SubmitResponse {
    request_id: Option<String>,
    status_url: Option<String>,
    response_url: Option<String>,
}

/// A queued generation job. The URLs come from the submit response and are
/// used as-is for every later request; nothing about their shape is assumed.
#[derive(Clone, Debug)]
pub struct GenerationJob {
    pub request_id: String,
    pub status_url: String,
    pub response_url: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InQueue,
    InProgress,
    Completed,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, serde::Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: JobStatus,
    #[serde(default)]
    queue_position: Option<u32>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
pub struct MediaRef {
    pub url: String,
}

/// Final payload of a completed job.
#[derive(Debug, serde::Deserialize)]
pub struct GenerationOutput {
    #[serde(default)]
    pub video: Option<MediaRef>,
}

impl GenerationOutput {
    pub fn video_url(&self) -> VivifyResult<&str> {
        self.video
            .as_ref()
            .map(|v| v.url.as_str())
            .ok_or_else(|| VivifyError::remote("generation response contained no video URL"))
    }
}

/// Submit a generation job to the queue.
pub async fn submit_job(
    client: &reqwest::Client,
    cfg: &RemoteConfig,
    request: &JobRequest,
) -> VivifyResult<GenerationJob> {
    tracing::info!(
        num_frames = request.num_frames,
        fps = request.frames_per_second,
        "Submitting generation job"
    );

    let response = client
        .post(cfg.submit_url())
        .header("Authorization", format!("Key {}", cfg.api_key))
        .json(&SubmitBody {
            image_url: &request.image_url,
            prompt: &request.prompt,
            negative_prompt: &request.negative_prompt,
            num_frames: request.num_frames,
            frames_per_second: request.frames_per_second,
            resolution: "480p",
            aspect_ratio: "1:1",
            num_inference_steps: 27,
            guidance_scale: 3.5,
            enable_safety_checker: false,
        })
        .send()
        .await
        .map_err(|e| VivifyError::submission(format!("queue submit failed: {e}")))?;
    if !response.status().is_success() {
        return Err(VivifyError::submission(format!(
            "queue submit failed: {}",
            error_detail(response).await
        )));
    }
    let submitted: SubmitResponse = response
        .json()
        .await
        .map_err(|e| VivifyError::submission(format!("invalid queue submit response: {e}")))?;

    let (Some(status_url), Some(response_url)) = (submitted.status_url, submitted.response_url)
    else {
        return Err(VivifyError::submission(
            "queue submit returned no status/response URLs",
        ));
    };
    let job = GenerationJob {
        request_id: submitted.request_id.unwrap_or_default(),
        status_url,
        response_url,
    };
    tracing::info!(request_id = %job.request_id, "Job queued");
    Ok(job)
}

enum PollStep {
    Done(GenerationOutput),
    Failed(Option<serde_json::Value>),
    Pending(StatusResponse),
}

/// Poll the job until it completes, fails, or the poll budget runs out.
///
/// A failed poll (network error, non-success status, unparseable body) is
/// retried after `retry_interval`; both kinds of poll draw on the same
/// budget, and running it out is always a timeout, so callers can tell
/// "the service said no" from "we gave up". A remote FAILED status is
/// terminal immediately. Unrecognized statuses keep polling.
pub async fn await_completion(
    client: &reqwest::Client,
    cfg: &RemoteConfig,
    job: &GenerationJob,
    progress: &ProgressSink,
) -> VivifyResult<GenerationOutput> {
    sleep(cfg.initial_poll_delay).await;

    let mut polls = 0u32;
    loop {
        polls += 1;
        if polls > cfg.poll_limit {
            return Err(VivifyError::poll_timeout(cfg.poll_limit));
        }

        match poll_once(client, cfg, job).await {
            Ok(PollStep::Done(output)) => {
                tracing::info!(request_id = %job.request_id, polls, "Generation complete");
                return Ok(output);
            }
            Ok(PollStep::Failed(detail)) => {
                let detail = match detail {
                    Some(serde_json::Value::String(s)) => s,
                    Some(v) => v.to_string(),
                    None => "video generation failed".to_string(),
                };
                return Err(VivifyError::remote(detail));
            }
            Ok(PollStep::Pending(status)) => {
                match status.status {
                    JobStatus::InQueue => {
                        let position = status
                            .queue_position
                            .map_or_else(|| "?".to_string(), |p| p.to_string());
                        progress.emit(
                            Stage::Queued,
                            percent_for_queue(polls),
                            format!("In queue (position {position})..."),
                        );
                    }
                    _ => {
                        progress.emit(Stage::Generating, percent_for_progress(polls), "Generating...");
                    }
                }
                sleep(cfg.poll_interval).await;
            }
            Err(e) => {
                if polls >= cfg.poll_limit {
                    tracing::warn!(error = %e, polls, "Status poll failed with no budget left");
                    return Err(VivifyError::poll_timeout(cfg.poll_limit));
                }
                tracing::warn!(error = %e, polls, "Status poll failed, retrying");
                sleep(cfg.retry_interval).await;
            }
        }
    }
}

async fn poll_once(
    client: &reqwest::Client,
    cfg: &RemoteConfig,
    job: &GenerationJob,
) -> VivifyResult<PollStep> {
    let response = client
        .get(&job.status_url)
        .header("Authorization", format!("Key {}", cfg.api_key))
        .send()
        .await
        .map_err(|e| VivifyError::remote(format!("status poll failed: {e}")))?;
    if !response.status().is_success() {
        return Err(VivifyError::remote(format!(
            "status poll failed: {}",
            error_detail(response).await
        )));
    }
    let status: StatusResponse = response
        .json()
        .await
        .map_err(|e| VivifyError::remote(format!("invalid status response: {e}")))?;

    match status.status {
        JobStatus::Completed => {
            let response = client
                .get(&job.response_url)
                .header("Authorization", format!("Key {}", cfg.api_key))
                .send()
                .await
                .map_err(|e| VivifyError::remote(format!("result fetch failed: {e}")))?;
            if !response.status().is_success() {
                return Err(VivifyError::remote(format!(
                    "result fetch failed: {}",
                    error_detail(response).await
                )));
            }
            let output: GenerationOutput = response
                .json()
                .await
                .map_err(|e| VivifyError::remote(format!("invalid result response: {e}")))?;
            Ok(PollStep::Done(output))
        }
        JobStatus::Failed => Ok(PollStep::Failed(status.error)),
        _ => Ok(PollStep::Pending(status)),
    }
}

fn percent_for_queue(polls: u32) -> u8 {
    (2 * polls).min(15) as u8
}

fn percent_for_progress(polls: u32) -> u8 {
    (15 + 3 * polls).min(90) as u8
}

/// Fetch the generated clip. The URL is a CDN capability URL; no auth.
pub async fn download_video(client: &reqwest::Client, url: &str) -> VivifyResult<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| VivifyError::download(format!("video download failed: {e}")))?;
    if !response.status().is_success() {
        return Err(VivifyError::download(format!(
            "video download failed: {}",
            error_detail(response).await
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| VivifyError::download(format!("video download failed: {e}")))?;
    tracing::info!(bytes = bytes.len(), "Video downloaded");
    Ok(bytes.to_vec())
}
