use std::{fmt, path::PathBuf, time::Duration};

use crate::error::{VivifyError, VivifyResult};

/// Environment variable holding the fal.ai API key.
pub const API_KEY_ENV: &str = "FAL_API_KEY";

const DEFAULT_STORAGE_BASE: &str = "https://rest.fal.ai";
const DEFAULT_QUEUE_BASE: &str = "https://queue.fal.run";
const DEFAULT_MODEL_PATH: &str = "fal-ai/wan/v2.2-a14b/image-to-video";

/// Everything the remote pipeline needs: credentials, endpoints and timing.
///
/// Constructed once and passed in, so tests can point it at a local stub
/// server and shrink the poll intervals to milliseconds.
#[derive(Clone)]
pub struct RemoteConfig {
    pub api_key: String,
    pub storage_base: String,
    pub queue_base: String,
    pub model_path: String,
    /// Status polls allowed before the job counts as timed out.
    pub poll_limit: u32,
    /// Wait before the first status poll.
    pub initial_poll_delay: Duration,
    /// Wait between successful status polls.
    pub poll_interval: Duration,
    /// Wait before retrying after a failed status poll.
    pub retry_interval: Duration,
    /// Hard ceiling on one encoder worker run.
    pub worker_timeout: Duration,
    /// Explicit encoder worker binary. When unset the worker is looked up
    /// next to the current executable, then on `PATH`.
    pub worker_path: Option<PathBuf>,
}

impl RemoteConfig {
    pub fn new(api_key: impl Into<String>) -> VivifyResult<Self> {
        let cfg = Self {
            api_key: api_key.into(),
            storage_base: DEFAULT_STORAGE_BASE.to_string(),
            queue_base: DEFAULT_QUEUE_BASE.to_string(),
            model_path: DEFAULT_MODEL_PATH.to_string(),
            poll_limit: 120,
            initial_poll_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            retry_interval: Duration::from_secs(2),
            worker_timeout: Duration::from_secs(120),
            worker_path: None,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read the API key from [`API_KEY_ENV`].
    pub fn from_env() -> VivifyResult<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(key),
            _ => Err(VivifyError::config(format!(
                "{API_KEY_ENV} is not set; animation generation is unavailable"
            ))),
        }
    }

    /// Whether generation is available at all in this environment.
    pub fn key_in_env() -> bool {
        std::env::var(API_KEY_ENV).is_ok_and(|key| !key.trim().is_empty())
    }

    pub fn validate(&self) -> VivifyResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(VivifyError::config("API key must not be empty"));
        }
        if self.storage_base.trim().is_empty() || self.queue_base.trim().is_empty() {
            return Err(VivifyError::config("endpoint base URLs must not be empty"));
        }
        if self.model_path.trim().is_empty() {
            return Err(VivifyError::config("model path must not be empty"));
        }
        if self.poll_limit == 0 {
            return Err(VivifyError::config("poll_limit must be at least 1"));
        }
        Ok(())
    }

    /// URL for requesting an upload slot.
    pub fn upload_init_url(&self) -> String {
        format!(
            "{}/storage/upload/initiate?storage_type=fal-cdn-v3",
            self.storage_base
        )
    }

    /// URL for submitting a generation job to the queue.
    pub fn submit_url(&self) -> String {
        format!("{}/{}", self.queue_base, self.model_path)
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("api_key", &"<redacted>")
            .field("storage_base", &self.storage_base)
            .field("queue_base", &self.queue_base)
            .field("model_path", &self.model_path)
            .field("poll_limit", &self.poll_limit)
            .field("initial_poll_delay", &self.initial_poll_delay)
            .field("poll_interval", &self.poll_interval)
            .field("retry_interval", &self.retry_interval)
            .field("worker_timeout", &self.worker_timeout)
            .field("worker_path", &self.worker_path)
            .finish()
    }
}
