//! Full `Animator::generate` runs against a stubbed remote service, with the
//! encoder worker replaced by a script (happy path) or `/bin/false` (crash).
#![cfg(unix)]

mod common;

use std::{path::PathBuf, time::Duration};

use tokio::net::TcpListener;
use vivify::{
    Animator, RemoteConfig, VivifyError,
    model::{CutoutImage, GenerateOptions, MotionSpec},
    progress::{ProgressSink, Stage},
};

// Both tests scan the temp dir for leftover vivify_clip_* files, and the
// clip names only differ by timestamp within one process. Serialize them.
static TEMP_DIR_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

fn test_config(base: &str, worker_path: PathBuf) -> RemoteConfig {
    let mut cfg = RemoteConfig::new("test-key").unwrap();
    cfg.storage_base = base.to_string();
    cfg.queue_base = base.to_string();
    cfg.poll_limit = 10;
    cfg.initial_poll_delay = Duration::from_millis(5);
    cfg.poll_interval = Duration::from_millis(2);
    cfg.retry_interval = Duration::from_millis(2);
    cfg.worker_path = Some(worker_path);
    cfg
}

/// 64x64 cutout: opaque 32x32 center square, transparent border.
fn center_square_cutout() -> CutoutImage {
    let mut rgba = vec![0u8; 64 * 64 * 4];
    for y in 16..48 {
        for x in 16..48 {
            let at = (y * 64 + x) * 4;
            rgba[at..at + 4].copy_from_slice(&[40, 180, 90, 255]);
        }
    }
    CutoutImage::new(64, 64, rgba).unwrap()
}

/// Stub the whole remote flow: upload slot, PUT, submit, one pending poll,
/// completion, result payload, video download.
fn serve_remote(listener: TcpListener, base: String) {
    let mut status_polls = 0u32;
    common::serve(listener, move |line| {
        if line.starts_with("POST /storage/upload/initiate") {
            (
                200,
                format!(r#"{{"upload_url":"{base}/put/cutout","file_url":"{base}/files/cutout.png"}}"#)
                    .into_bytes(),
            )
        } else if line.starts_with("PUT /put/cutout") {
            (200, b"{}".to_vec())
        } else if line.starts_with("POST /fal-ai/wan/v2.2-a14b/image-to-video") {
            (
                200,
                format!(
                    r#"{{"request_id":"req-9","status_url":"{base}/q/req-9/status","response_url":"{base}/q/req-9/response"}}"#
                )
                .into_bytes(),
            )
        } else if line.starts_with("GET /q/req-9/status") {
            status_polls += 1;
            let body = if status_polls == 1 {
                r#"{"status":"IN_PROGRESS"}"#
            } else {
                r#"{"status":"COMPLETED"}"#
            };
            (200, body.as_bytes().to_vec())
        } else if line.starts_with("GET /q/req-9/response") {
            (
                200,
                format!(r#"{{"video":{{"url":"{base}/media/clip.mp4"}}}}"#).into_bytes(),
            )
        } else if line.starts_with("GET /media/clip.mp4") {
            (200, b"\x00\x00not a real mp4".to_vec())
        } else {
            (404, b"{}".to_vec())
        }
    });
}

fn leftover_clips() -> Vec<PathBuf> {
    let prefix = format!("vivify_clip_{}_", std::process::id());
    std::fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .collect()
}

/// Write an executable stand-in for the worker binary that swallows the
/// request and replies like a successful 3-frame encode.
fn write_fake_worker(dir: &std::path::Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt as _;

    let path = dir.join("fake-vivify-worker.sh");
    let script = concat!(
        "#!/bin/sh\n",
        "cat > /dev/null\n",
        r#"echo '{"type":"progress","frame":1,"total_frames":3}'"#,
        "\n",
        r#"echo '{"type":"progress","frame":2,"total_frames":3}'"#,
        "\n",
        r#"echo '{"type":"result","gif":"R0lGODlh","apng":"iVBORw0KGgo=","frame_count":3,"width":64,"height":64}'"#,
        "\n",
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn generate_runs_the_full_pipeline_against_a_stub_remote() {
    let _guard = TEMP_DIR_LOCK.lock().await;
    let (listener, base) = common::bind().await;
    serve_remote(listener, base.clone());

    let worker_dir = std::env::temp_dir().join(format!("vivify_fake_worker_{}", std::process::id()));
    std::fs::create_dir_all(&worker_dir).unwrap();
    let worker = write_fake_worker(&worker_dir);

    let animator = Animator::new(test_config(&base, worker)).unwrap();
    let (progress, mut events) = ProgressSink::channel();
    let animation = animator
        .generate(
            &center_square_cutout(),
            &MotionSpec::Custom {
                prompt: "The subject gently sways".to_string(),
                num_frames: Some(3),
            },
            &GenerateOptions::default(),
            &progress,
        )
        .await
        .unwrap();
    drop(progress);

    assert_eq!(animation.frame_count, 3);
    assert_eq!((animation.width, animation.height), (64, 64));
    assert!(!animation.gif.is_empty());
    assert!(!animation.apng.is_empty());

    // Stages arrive in pipeline order with monotonic percentages.
    let mut seen = Vec::new();
    let mut last_pct = 0u8;
    while let Ok(event) = events.try_recv() {
        assert!(event.percent >= last_pct, "{event:?}");
        last_pct = event.percent;
        if seen.last() != Some(&event.stage) {
            seen.push(event.stage);
        }
    }
    assert_eq!(
        seen,
        vec![
            Stage::Uploading,
            Stage::Submitting,
            Stage::Queued,
            Stage::Generating,
            Stage::Downloading,
            Stage::Encoding,
        ]
    );

    assert!(leftover_clips().is_empty(), "temp clip not cleaned up");
    let _ = std::fs::remove_dir_all(&worker_dir);
}

#[tokio::test]
async fn worker_crash_is_reported_and_the_temp_clip_removed() {
    let _guard = TEMP_DIR_LOCK.lock().await;
    let (listener, base) = common::bind().await;
    serve_remote(listener, base.clone());

    let animator = Animator::new(test_config(&base, PathBuf::from("/bin/false"))).unwrap();
    let err = animator
        .generate(
            &center_square_cutout(),
            &MotionSpec::Custom {
                prompt: "The subject gently sways".to_string(),
                num_frames: Some(3),
            },
            &GenerateOptions::default(),
            &ProgressSink::disabled(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, VivifyError::WorkerCrash(_)), "{err}");
    assert!(leftover_clips().is_empty(), "temp clip not cleaned up");
}
