use crate::{
    error::{VivifyError, VivifyResult},
    model::{CompositedImage, CutoutImage, FrameRgba},
};

/// Solid background color the cutout is flattened onto before upload.
///
/// Must be a "secondary" hue: two channels high, one channel low. The reverse
/// key measures how far the weak channel stays below the other two, so a key
/// with no clearly weak channel cannot be removed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KeyColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

// The weak channel must sit at least this far below both dominant channels.
const MIN_KEY_SEPARATION: u8 = 100;

impl KeyColor {
    /// Magenta rather than green: green subjects (plants, frogs, clothing)
    /// would be keyed out, while magenta is extremely rare in natural subjects.
    pub const MAGENTA: Self = Self { r: 255, g: 0, b: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> VivifyResult<Self> {
        let key = Self { r, g, b };
        let ch = key.channels();
        let wi = key.weak_index();
        for (i, &c) in ch.iter().enumerate() {
            if i == wi {
                continue;
            }
            if u16::from(c) < u16::from(ch[wi]) + u16::from(MIN_KEY_SEPARATION) {
                return Err(VivifyError::validation(format!(
                    "key color ({r}, {g}, {b}) needs one channel at least {MIN_KEY_SEPARATION} below the other two"
                )));
            }
        }
        Ok(key)
    }

    fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    fn weak_index(self) -> usize {
        let ch = self.channels();
        let mut wi = 0;
        for (i, &c) in ch.iter().enumerate() {
            if c < ch[wi] {
                wi = i;
            }
        }
        wi
    }

    fn dominant_indices(self) -> (usize, usize) {
        match self.weak_index() {
            0 => (1, 2),
            1 => (0, 2),
            _ => (0, 1),
        }
    }
}

/// Thresholds for the reverse key. Scores above `strong_score` (with both
/// dominant channels above `strong_floor`) cut to full transparency; scores in
/// the soft band ramp alpha linearly and subtract key spill from the dominant
/// channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KeyTuning {
    pub strong_score: u8,
    pub strong_floor: u8,
    pub soft_score: u8,
    pub soft_floor: u8,
}

impl Default for KeyTuning {
    fn default() -> Self {
        Self {
            strong_score: 80,
            strong_floor: 150,
            soft_score: 40,
            soft_floor: 100,
        }
    }
}

impl KeyTuning {
    pub fn validate(&self) -> VivifyResult<()> {
        if self.soft_score >= self.strong_score {
            return Err(VivifyError::validation(
                "key tuning soft_score must be below strong_score",
            ));
        }
        Ok(())
    }
}

/// Flatten a straight-alpha cutout onto the key color.
///
/// Per channel: `out = round(fg * a / 255 + key * (255 - a) / 255)`, output
/// fully opaque. The remote service hallucinates scenery when it receives
/// transparency, so the key color stands in for the background.
pub fn composite_forward(cutout: &CutoutImage, key: KeyColor) -> CompositedImage {
    let key_ch = key.channels();
    let mut rgb = Vec::with_capacity(cutout.width as usize * cutout.height as usize * 3);

    for px in cutout.rgba.chunks_exact(4) {
        let a = u16::from(px[3]);
        let inv = 255u16 - a;
        for c in 0..3 {
            let v = u16::from(mul_div255(u16::from(px[c]), a))
                + u16::from(mul_div255(u16::from(key_ch[c]), inv));
            rgb.push(v.min(255) as u8);
        }
    }

    CompositedImage {
        width: cutout.width,
        height: cutout.height,
        rgb,
    }
}

/// Key the background color back out of one decoded frame, in place.
///
/// Keyness score per pixel: `min(dominant channels) - weak channel`. Strongly
/// keyed pixels become fully transparent with RGB zeroed; the soft band gets a
/// linear alpha ramp plus spill correction; everything else is untouched.
pub fn apply_reverse(frame: &mut FrameRgba, key: KeyColor, tuning: &KeyTuning) -> VivifyResult<()> {
    tuning.validate()?;
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.data.len() != expected {
        return Err(VivifyError::validation(
            "apply_reverse expects a frame buffer of width*height*4 bytes",
        ));
    }

    let wi = key.weak_index();
    let (d1, d2) = key.dominant_indices();
    let band = u32::from(tuning.strong_score - tuning.soft_score);

    for px in frame.data.chunks_exact_mut(4) {
        let weak = px[wi];
        let dom_min = px[d1].min(px[d2]);
        let score = i16::from(dom_min) - i16::from(weak);

        if score > i16::from(tuning.strong_score) && dom_min > tuning.strong_floor {
            px.copy_from_slice(&[0, 0, 0, 0]);
        } else if score > i16::from(tuning.soft_score) && dom_min > tuning.soft_floor {
            let over = (score - i16::from(tuning.soft_score)) as u32;
            let ramp = (over * 255 + band / 2) / band;
            let alpha = 255u32.saturating_sub(ramp) as u8;
            px[3] = alpha;

            if alpha == 0 {
                px[0] = 0;
                px[1] = 0;
                px[2] = 0;
            } else {
                // Pull the dominant channels back toward the weak channel,
                // scaled by how transparent the pixel became.
                let inv = 255u16 - u16::from(alpha);
                for di in [d1, d2] {
                    let excess = px[di].saturating_sub(weak);
                    let spill = mul_div255(u16::from(excess), inv);
                    px[di] = px[di].saturating_sub(spill);
                }
            }
        }
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
