use std::borrow::Cow;

use rayon::prelude::*;

use crate::{
    error::{VivifyError, VivifyResult},
    model::FrameRgba,
};

/// NeuQuant sample factor: 1 is exhaustive, 10 is the usual speed tradeoff.
const QUANT_SAMPLE_FACTOR: i32 = 10;
const PALETTE_COLORS: usize = 256;

struct QuantizedFrame {
    palette_rgb: Vec<u8>,
    indices: Vec<u8>,
    transparent: Option<u8>,
}

/// Encode frames as a looping GIF with one 256-color palette per frame.
///
/// GIF has no partial alpha: pixels below half alpha collapse onto the
/// frame's transparent slot, the rest become opaque. Background disposal
/// keeps cleared pixels from smearing across frames. `on_frame` is called
/// once per written frame with (1-based index, total).
pub(crate) fn encode_gif(
    frames: &[FrameRgba],
    fps: u32,
    loops: u16,
    mut on_frame: impl FnMut(u32, u32) -> VivifyResult<()>,
) -> VivifyResult<Vec<u8>> {
    let Some(first) = frames.first() else {
        return Err(VivifyError::encode("no frames to encode"));
    };
    if fps == 0 {
        return Err(VivifyError::encode("fps must be non-zero"));
    }
    if first.width > u32::from(u16::MAX) || first.height > u32::from(u16::MAX) {
        return Err(VivifyError::encode(format!(
            "{}x{} exceeds GIF dimension limits",
            first.width, first.height
        )));
    }
    if frames
        .iter()
        .any(|f| f.width != first.width || f.height != first.height)
    {
        return Err(VivifyError::encode("frame dimensions are not uniform"));
    }

    let delay_cs = centiseconds_per_frame(fps);
    let quantized: Vec<QuantizedFrame> = frames.par_iter().map(quantize_frame).collect();

    let mut out = Vec::new();
    {
        let mut encoder =
            gif::Encoder::new(&mut out, first.width as u16, first.height as u16, &[])
                .map_err(|e| VivifyError::encode(format!("gif encode failed: {e}")))?;
        let repeat = if loops == 0 {
            gif::Repeat::Infinite
        } else {
            gif::Repeat::Finite(loops)
        };
        encoder
            .set_repeat(repeat)
            .map_err(|e| VivifyError::encode(format!("gif encode failed: {e}")))?;

        let total = frames.len() as u32;
        for (i, q) in quantized.into_iter().enumerate() {
            let frame = gif::Frame {
                width: first.width as u16,
                height: first.height as u16,
                buffer: Cow::Owned(q.indices),
                palette: Some(q.palette_rgb),
                transparent: q.transparent,
                delay: delay_cs,
                dispose: gif::DisposalMethod::Background,
                ..gif::Frame::default()
            };
            encoder
                .write_frame(&frame)
                .map_err(|e| VivifyError::encode(format!("gif encode failed: {e}")))?;
            on_frame(i as u32 + 1, total)?;
        }
    }
    Ok(out)
}

fn quantize_frame(frame: &FrameRgba) -> QuantizedFrame {
    let mut data = frame.data.clone();
    let mut has_transparent = false;
    for px in data.chunks_exact_mut(4) {
        if px[3] < 128 {
            px.copy_from_slice(&[0, 0, 0, 0]);
            has_transparent = true;
        } else {
            px[3] = 255;
        }
    }

    let nq = color_quant::NeuQuant::new(QUANT_SAMPLE_FACTOR, PALETTE_COLORS, &data);
    let transparent = has_transparent.then(|| nq.index_of(&[0, 0, 0, 0]) as u8);
    let palette_rgb: Vec<u8> = nq
        .color_map_rgba()
        .chunks_exact(4)
        .flat_map(|c| [c[0], c[1], c[2]])
        .collect();
    let indices: Vec<u8> = data
        .chunks_exact(4)
        .map(|px| nq.index_of(px) as u8)
        .collect();
    QuantizedFrame {
        palette_rgb,
        indices,
        transparent,
    }
}

/// GIF delays have centisecond resolution; round and keep at least one tick.
fn centiseconds_per_frame(fps: u32) -> u16 {
    let ms = (1000 + fps / 2) / fps;
    (((ms + 5) / 10).max(1)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone_frame(width: u32, height: u32) -> FrameRgba {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for i in 0..width * height {
            if i == 0 {
                data.extend_from_slice(&[0, 0, 0, 0]);
            } else {
                data.extend_from_slice(&[255, 0, 0, 255]);
            }
        }
        FrameRgba::new(width, height, data).unwrap()
    }

    #[test]
    fn gif_round_trips_frames_delay_and_transparency() {
        let frames = vec![two_tone_frame(16, 16), two_tone_frame(16, 16)];
        let mut seen = Vec::new();
        let gif = encode_gif(&frames, 16, 0, |frame, total| {
            seen.push((frame, total));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(1, 2), (2, 2)]);

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(&gif[..]).unwrap();
        assert_eq!((decoder.width(), decoder.height()), (16, 16));

        let mut count = 0;
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            count += 1;
            assert_eq!(frame.delay, 6);
            // First pixel was fully transparent, the rest solid red.
            assert_eq!(frame.buffer[3], 0);
            assert_eq!(frame.buffer[7], 255);
            assert!(frame.buffer[4] > 200 && frame.buffer[5] < 60);
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = encode_gif(&[], 16, 0, |_, _| Ok(())).unwrap_err();
        assert!(err.to_string().contains("no frames"));
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let frames = vec![two_tone_frame(16, 16), two_tone_frame(8, 8)];
        let err = encode_gif(&frames, 16, 0, |_, _| Ok(())).unwrap_err();
        assert!(err.to_string().contains("not uniform"));
    }

    #[test]
    fn frame_delay_rounds_to_centiseconds() {
        assert_eq!(centiseconds_per_frame(16), 6);
        assert_eq!(centiseconds_per_frame(50), 2);
        assert_eq!(centiseconds_per_frame(1000), 1);
    }
}
