use image::ImageEncoder as _;

use crate::error::{VivifyError, VivifyResult};

/// A static cutout: straight-alpha RGBA8 pixels, transparent background.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CutoutImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl CutoutImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> VivifyResult<Self> {
        if width == 0 || height == 0 {
            return Err(VivifyError::validation(
                "cutout width/height must be non-zero",
            ));
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(VivifyError::validation(format!(
                "cutout buffer size mismatch: got {} bytes, expected {expected}",
                rgba.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn from_png(bytes: &[u8]) -> VivifyResult<Self> {
        let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .map_err(|e| VivifyError::validation(format!("could not decode cutout PNG: {e}")))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }

    pub fn to_png(&self) -> VivifyResult<Vec<u8>> {
        let mut out = Vec::new();
        image::codecs::png::PngEncoder::new(&mut out)
            .write_image(
                &self.rgba,
                self.width,
                self.height,
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| VivifyError::encode(format!("png encode failed: {e}")))?;
        Ok(out)
    }
}

/// Cutout flattened onto the key color. Opaque RGB8, the upload payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositedImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl CompositedImage {
    pub fn to_png(&self) -> VivifyResult<Vec<u8>> {
        let mut out = Vec::new();
        image::codecs::png::PngEncoder::new(&mut out)
            .write_image(
                &self.rgb,
                self.width,
                self.height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| VivifyError::encode(format!("png encode failed: {e}")))?;
        Ok(out)
    }
}

/// One decoded video frame, straight-alpha RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameRgba {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> VivifyResult<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(VivifyError::validation(format!(
                "frame buffer size mismatch: got {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

/// Finished animation: both output formats plus the shared geometry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimationResult {
    pub gif: Vec<u8>,
    pub apng: Vec<u8>,
    pub frame_count: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MotionSpec {
    /// A motion from the preset catalog, looked up by name.
    Preset { name: String },
    /// A free-form motion prompt. `num_frames` defaults to the duration cap.
    Custom {
        prompt: String,
        #[serde(default)]
        num_frames: Option<u32>,
    },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    pub fps: u32,
    /// GIF loop count, 0 = infinite.
    pub loops: u16,
    /// Videos longer than this are trimmed during encoding.
    pub max_duration_secs: f64,
    pub use_chroma_key: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            fps: 16,
            loops: 0,
            max_duration_secs: 4.0,
            use_chroma_key: true,
        }
    }
}

impl GenerateOptions {
    pub fn validate(&self) -> VivifyResult<()> {
        if self.fps == 0 {
            return Err(VivifyError::validation("fps must be non-zero"));
        }
        if !self.max_duration_secs.is_finite() || self.max_duration_secs <= 0.0 {
            return Err(VivifyError::validation(
                "max_duration_secs must be positive and finite",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutout_rejects_size_mismatch() {
        assert!(CutoutImage::new(2, 2, vec![0u8; 15]).is_err());
        assert!(CutoutImage::new(0, 2, vec![]).is_err());
        assert!(CutoutImage::new(2, 2, vec![0u8; 16]).is_ok());
    }

    #[test]
    fn frame_rejects_size_mismatch() {
        assert!(FrameRgba::new(3, 1, vec![0u8; 12]).is_ok());
        assert!(FrameRgba::new(3, 1, vec![0u8; 11]).is_err());
    }

    #[test]
    fn composited_png_roundtrips_dimensions() {
        let img = CompositedImage {
            width: 3,
            height: 2,
            rgb: vec![255u8; 18],
        };
        let png = img.to_png().unwrap();
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!((back.width(), back.height()), (3, 2));
    }

    #[test]
    fn cutout_from_png_roundtrips() {
        let img = CompositedImage {
            width: 2,
            height: 2,
            rgb: vec![10u8; 12],
        };
        let png = img.to_png().unwrap();
        let cutout = CutoutImage::from_png(&png).unwrap();
        assert_eq!((cutout.width, cutout.height), (2, 2));
        assert_eq!(cutout.rgba.len(), 16);
    }

    #[test]
    fn options_validate_bounds() {
        assert!(GenerateOptions::default().validate().is_ok());
        assert!(
            GenerateOptions {
                fps: 0,
                ..GenerateOptions::default()
            }
            .validate()
            .is_err()
        );
        assert!(
            GenerateOptions {
                max_duration_secs: 0.0,
                ..GenerateOptions::default()
            }
            .validate()
            .is_err()
        );
    }
}
