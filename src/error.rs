pub type VivifyResult<T> = Result<T, VivifyError>;

#[derive(thiserror::Error, Debug)]
pub enum VivifyError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("upload init error: {0}")]
    UploadInit(String),

    #[error("upload transfer error: {0}")]
    UploadTransfer(String),

    #[error("submission error: {0}")]
    Submission(String),

    #[error("generation timed out after {polls} status polls")]
    PollTimeout { polls: u32 },

    #[error("remote generation failed: {0}")]
    Remote(String),

    #[error("download error: {0}")]
    Download(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("encoder worker crashed: {0}")]
    WorkerCrash(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VivifyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upload_init(msg: impl Into<String>) -> Self {
        Self::UploadInit(msg.into())
    }

    pub fn upload_transfer(msg: impl Into<String>) -> Self {
        Self::UploadTransfer(msg.into())
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    pub fn poll_timeout(polls: u32) -> Self {
        Self::PollTimeout { polls }
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn worker_crash(msg: impl Into<String>) -> Self {
        Self::WorkerCrash(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            VivifyError::config("x")
                .to_string()
                .contains("configuration error:")
        );
        assert!(
            VivifyError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            VivifyError::upload_init("x")
                .to_string()
                .contains("upload init error:")
        );
        assert!(
            VivifyError::remote("x")
                .to_string()
                .contains("remote generation failed:")
        );
        assert!(
            VivifyError::worker_crash("x")
                .to_string()
                .contains("encoder worker crashed:")
        );
    }

    #[test]
    fn poll_timeout_reports_poll_count() {
        let err = VivifyError::poll_timeout(120);
        assert!(err.to_string().contains("120"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = VivifyError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
