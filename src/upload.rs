use crate::{
    config::RemoteConfig,
    error::{VivifyError, VivifyResult},
};

#[derive(serde::Serialize)]
struct UploadInitBody {
    content_type: &'static str,
    file_name: &'static str,
}

#[derive(Debug, serde::Deserialize)]
struct UploadSlot {
    upload_url: String,
    file_url: String,
}

/// Upload a composited PNG to remote storage and return its public URL.
///
/// Two phases: ask the storage API for an upload slot, then PUT the bytes to
/// the slot's presigned URL. The presigned PUT carries no auth header.
pub async fn upload_cutout(
    client: &reqwest::Client,
    cfg: &RemoteConfig,
    png: &[u8],
) -> VivifyResult<String> {
    tracing::info!(bytes = png.len(), "Uploading composited image");

    let response = client
        .post(cfg.upload_init_url())
        .header("Authorization", format!("Key {}", cfg.api_key))
        .json(&UploadInitBody {
            content_type: "image/png",
            file_name: "cutout.png",
        })
        .send()
        .await
        .map_err(|e| VivifyError::upload_init(format!("upload slot request failed: {e}")))?;
    if !response.status().is_success() {
        return Err(VivifyError::upload_init(format!(
            "upload slot request failed: {}",
            error_detail(response).await
        )));
    }
    let slot: UploadSlot = response
        .json()
        .await
        .map_err(|e| VivifyError::upload_init(format!("invalid upload slot response: {e}")))?;

    let response = client
        .put(&slot.upload_url)
        .header("Content-Type", "image/png")
        .body(png.to_vec())
        .send()
        .await
        .map_err(|e| VivifyError::upload_transfer(format!("image upload failed: {e}")))?;
    if !response.status().is_success() {
        return Err(VivifyError::upload_transfer(format!(
            "image upload failed: {}",
            error_detail(response).await
        )));
    }

    tracing::debug!(file_url = %slot.file_url, "Upload complete");
    Ok(slot.file_url)
}

/// Summarize a non-success response as "status CODE: body" for error messages.
pub(crate) async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        format!("status {status}")
    } else {
        format!("status {status}: {body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_slot_requires_both_urls() {
        let slot: UploadSlot = serde_json::from_str(
            r#"{"upload_url": "https://cdn.example/put/1", "file_url": "https://cdn.example/f/1"}"#,
        )
        .unwrap();
        assert_eq!(slot.upload_url, "https://cdn.example/put/1");
        assert_eq!(slot.file_url, "https://cdn.example/f/1");

        let missing = serde_json::from_str::<UploadSlot>(r#"{"upload_url": "https://x"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn init_body_serializes_fixed_fields() {
        let body = serde_json::to_value(UploadInitBody {
            content_type: "image/png",
            file_name: "cutout.png",
        })
        .unwrap();
        assert_eq!(body["content_type"], "image/png");
        assert_eq!(body["file_name"], "cutout.png");
    }
}
