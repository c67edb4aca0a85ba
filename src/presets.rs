use async_trait::async_trait;
use image::ImageEncoder as _;

use crate::{
    error::{VivifyError, VivifyResult},
    model::CutoutImage,
};

/// One motion the user can pick: a prompt plus the frame budget it suits.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MotionPreset {
    pub name: String,
    pub label: String,
    pub description: String,
    pub prompt: String,
    pub num_frames: u32,
    pub fps: u32,
}

/// At most this many suggested presets are kept.
pub const MAX_SUGGESTED_PRESETS: usize = 3;

/// Suggested frame counts above this are clamped (4 s at 16 fps).
const MAX_SUGGESTED_FRAMES: u32 = 64;

/// Vision models identify the subject fine at this resolution; full-size
/// cutouts only slow inference down.
pub const VISION_MAX_DIM: u32 = 384;

/// Instruction text for vision collaborators that invent subject-specific
/// presets. Kept here so every implementation asks for the same JSON shape.
pub const SUGGESTION_PROMPT: &str = r#"Look at this cutout image. Identify the subject.

Suggest exactly 3 animation motions that would look natural for THIS subject.

Examples:
- A cat: stretch, flick tail, yawn
- A flower: bloom, sway in wind, breathe
- A person: wave, nod, turn head
- A logo: pulse, rotate, bounce

Return ONLY a JSON object (no markdown, no code blocks):
{
  "subject": "<what the subject is, 2-4 words>",
  "presets": [
    {
      "name": "<kebab-case-id>",
      "label": "<Short 1-2 Word Label>",
      "description": "<6-8 word description>",
      "prompt": "<animation prompt, 15-25 words describing the motion>",
      "num_frames": 33,
      "fps": 16
    }
  ]
}

Rules:
- label: 1-2 words max, e.g. "Stretch", "Tail Wag", "Nod"
- prompt: start with "The subject" or "The <type>", describe smooth natural motion
- Only the subject should move, background stays unchanged
- Use 33 frames for short motions, 49 for longer/flowing motions
- Do NOT include an icon field"#;

/// The generic catalog. Intentionally subject-agnostic so it works with any
/// cutout when no vision collaborator is available.
pub fn static_presets() -> Vec<MotionPreset> {
    fn preset(
        name: &str,
        label: &str,
        description: &str,
        prompt: &str,
        num_frames: u32,
    ) -> MotionPreset {
        MotionPreset {
            name: name.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            prompt: prompt.to_string(),
            num_frames,
            fps: 16,
        }
    }

    vec![
        preset(
            "breathe",
            "Breathe",
            "Subtle breathing, gently expanding and contracting",
            "The subject gently breathing with subtle movement, soft and alive, slight expansion and contraction, smooth looping motion",
            33,
        ),
        preset(
            "sway",
            "Sway",
            "Gentle swaying side to side like a breeze",
            "The subject gently swaying side to side as if in a light breeze, smooth natural movement, soft organic motion",
            49,
        ),
        preset(
            "bounce",
            "Bounce",
            "Playful bouncing up and down",
            "The subject bouncing up and down playfully, lively energetic movement, fun bouncing motion with slight squash and stretch",
            33,
        ),
        preset(
            "wobble",
            "Wobble",
            "Jelly-like wobbling and shaking",
            "The subject wobbling like jelly, playful shaking motion, fun jiggly movement with slight rotation",
            33,
        ),
        preset(
            "float",
            "Float",
            "Dreamy floating upward with slow drift",
            "The subject slowly floating upward with a dreamy drifting motion, weightless and ethereal, gentle rising movement",
            49,
        ),
        preset(
            "zoom",
            "Zoom In",
            "Cinematic slow zoom towards the subject",
            "Cinematic slow zoom in towards the subject, camera gradually moving closer, dramatic focus pull effect",
            49,
        ),
    ]
}

pub fn find_preset(name: &str) -> Option<MotionPreset> {
    static_presets().into_iter().find(|p| p.name == name)
}

/// External collaborator that looks at the cutout and invents presets.
///
/// Implementations own their transport and model choice; `None` means
/// "unavailable or produced nothing usable" and triggers the static fallback.
#[async_trait]
pub trait PresetSuggester: Send + Sync {
    async fn suggest_presets(&self, cutout_png: &[u8]) -> Option<Vec<MotionPreset>>;
}

/// Ask the collaborator, normalize whatever comes back, fall back to the
/// static catalog when it declines or returns nothing.
pub async fn suggest_or_static(
    suggester: &dyn PresetSuggester,
    cutout_png: &[u8],
) -> Vec<MotionPreset> {
    match suggester.suggest_presets(cutout_png).await {
        Some(raw) => {
            let normalized = normalize_suggested(raw);
            if normalized.is_empty() {
                tracing::info!("suggester returned no usable presets, using static catalog");
                static_presets()
            } else {
                normalized
            }
        }
        None => {
            tracing::info!("preset suggester unavailable, using static catalog");
            static_presets()
        }
    }
}

/// Clamp and sanitize collaborator output: at most three presets, kebab-case
/// names, frame counts inside the duration cap, missing fields defaulted.
pub fn normalize_suggested(presets: Vec<MotionPreset>) -> Vec<MotionPreset> {
    presets
        .into_iter()
        .take(MAX_SUGGESTED_PRESETS)
        .map(|p| {
            let name = if p.name.trim().is_empty() {
                "motion".to_string()
            } else {
                p.name
                    .chars()
                    .map(|c| {
                        if c.is_ascii_alphanumeric() || c == '-' {
                            c.to_ascii_lowercase()
                        } else {
                            '-'
                        }
                    })
                    .collect()
            };
            let label = if p.label.trim().is_empty() {
                "Motion".to_string()
            } else {
                p.label
            };
            let num_frames = if p.num_frames == 0 { 33 } else { p.num_frames };
            MotionPreset {
                name,
                label,
                num_frames: num_frames.min(MAX_SUGGESTED_FRAMES),
                fps: if p.fps == 0 { 16 } else { p.fps },
                ..p
            }
        })
        .collect()
}

/// Downscale the cutout for a vision collaborator. Images already inside
/// `max_dim` are re-encoded as-is.
pub fn thumbnail_png(cutout: &CutoutImage, max_dim: u32) -> VivifyResult<Vec<u8>> {
    if max_dim == 0 {
        return Err(VivifyError::validation("thumbnail max_dim must be non-zero"));
    }

    if cutout.width <= max_dim && cutout.height <= max_dim {
        return encode_rgba_png(cutout.width, cutout.height, &cutout.rgba);
    }

    let img = image::RgbaImage::from_raw(cutout.width, cutout.height, cutout.rgba.clone())
        .ok_or_else(|| VivifyError::validation("cutout buffer does not match its dimensions"))?;
    let scale = f64::from(max_dim) / f64::from(cutout.width.max(cutout.height));
    let new_w = ((f64::from(cutout.width) * scale).round() as u32).max(1);
    let new_h = ((f64::from(cutout.height) * scale).round() as u32).max(1);
    let resized = image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Triangle);
    encode_rgba_png(new_w, new_h, resized.as_raw())
}

fn encode_rgba_png(width: u32, height: u32, rgba: &[u8]) -> VivifyResult<Vec<u8>> {
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(rgba, width, height, image::ExtendedColorType::Rgba8)
        .map_err(|e| VivifyError::encode(format!("png encode failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_six_unique_presets() {
        let presets = static_presets();
        assert_eq!(presets.len(), 6);
        let mut names: Vec<_> = presets.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 6);
        assert!(presets.iter().all(|p| p.fps == 16));
        assert!(presets.iter().all(|p| p.num_frames == 33 || p.num_frames == 49));
    }

    #[test]
    fn find_preset_matches_by_name() {
        assert_eq!(find_preset("sway").unwrap().num_frames, 49);
        assert!(find_preset("teleport").is_none());
    }

    #[test]
    fn normalize_caps_count_frames_and_names() {
        let raw = vec![
            MotionPreset {
                name: "Big Stretch!".to_string(),
                label: String::new(),
                description: String::new(),
                prompt: "The subject stretches".to_string(),
                num_frames: 100,
                fps: 0,
            };
            5
        ];
        let out = normalize_suggested(raw);
        assert_eq!(out.len(), MAX_SUGGESTED_PRESETS);
        assert_eq!(out[0].name, "big-stretch-");
        assert_eq!(out[0].label, "Motion");
        assert_eq!(out[0].num_frames, MAX_SUGGESTED_FRAMES);
        assert_eq!(out[0].fps, 16);
    }

    struct FixedSuggester(Option<Vec<MotionPreset>>);

    #[async_trait]
    impl PresetSuggester for FixedSuggester {
        async fn suggest_presets(&self, _cutout_png: &[u8]) -> Option<Vec<MotionPreset>> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn suggestion_falls_back_to_static_catalog() {
        let none = FixedSuggester(None);
        assert_eq!(suggest_or_static(&none, &[]).await.len(), 6);

        let empty = FixedSuggester(Some(Vec::new()));
        assert_eq!(suggest_or_static(&empty, &[]).await.len(), 6);

        let some = FixedSuggester(Some(vec![MotionPreset {
            name: "tail-wag".to_string(),
            label: "Tail Wag".to_string(),
            description: "Happy tail wagging".to_string(),
            prompt: "The subject wags its tail".to_string(),
            num_frames: 33,
            fps: 16,
        }]));
        let out = suggest_or_static(&some, &[]).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "tail-wag");
    }

    #[test]
    fn thumbnail_downscales_to_max_dim() {
        let cutout = CutoutImage::new(800, 200, vec![0u8; 800 * 200 * 4]).unwrap();
        let png = thumbnail_png(&cutout, VISION_MAX_DIM).unwrap();
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!((back.width(), back.height()), (384, 96));

        let small = CutoutImage::new(64, 64, vec![0u8; 64 * 64 * 4]).unwrap();
        let png = thumbnail_png(&small, VISION_MAX_DIM).unwrap();
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!((back.width(), back.height()), (64, 64));
    }
}
