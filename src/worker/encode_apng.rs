use crate::{
    error::{VivifyError, VivifyResult},
    model::FrameRgba,
};

/// Encode frames as an APNG with full 8-bit alpha.
///
/// This is the lossless counterpart to the GIF pass: same frames, same
/// timing, but soft chroma-key edges survive.
pub(crate) fn encode_apng(frames: &[FrameRgba], fps: u32) -> VivifyResult<Vec<u8>> {
    let Some(first) = frames.first() else {
        return Err(VivifyError::encode("no frames to encode"));
    };
    if fps == 0 {
        return Err(VivifyError::encode("fps must be non-zero"));
    }
    if frames
        .iter()
        .any(|f| f.width != first.width || f.height != first.height)
    {
        return Err(VivifyError::encode("frame dimensions are not uniform"));
    }

    let delay_ms = ((1000 + fps / 2) / fps) as u16;
    let meta = apng_encoder::apng::Meta {
        width: first.width,
        height: first.height,
        color: apng_encoder::apng::Color::RGBA(8),
        frames: frames.len() as u32,
        // None means loop forever.
        plays: None,
    };

    let mut out = Vec::new();
    let mut encoder = apng_encoder::apng::encoder::Encoder::create(&mut out, meta)
        .map_err(|e| VivifyError::encode(format!("apng encode failed: {e}")))?;
    let frame_meta = apng_encoder::apng::Frame {
        delay: Some(apng_encoder::apng::Delay::new(delay_ms, 1000)),
        ..Default::default()
    };
    for frame in frames {
        encoder
            .write_frame(&frame.data, Some(&frame_meta), None, None)
            .map_err(|e| VivifyError::encode(format!("apng encode failed: {e}")))?;
    }
    encoder
        .finish()
        .map_err(|e| VivifyError::encode(format!("apng encode failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32, alpha: u8) -> FrameRgba {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for i in 0..width * height {
            data.extend_from_slice(&[(i % 256) as u8, 80, 200, alpha]);
        }
        FrameRgba::new(width, height, data).unwrap()
    }

    fn chunk_payload<'a>(png: &'a [u8], name: &[u8; 4]) -> Option<&'a [u8]> {
        let pos = png.windows(4).position(|w| w == name)?;
        Some(&png[pos + 4..])
    }

    #[test]
    fn apng_carries_frame_count_and_infinite_loop() {
        let frames = vec![gradient_frame(8, 8, 255), gradient_frame(8, 8, 128)];
        let apng = encode_apng(&frames, 16).unwrap();

        assert_eq!(&apng[..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        // acTL payload: num_frames then num_plays, both big-endian.
        let actl = chunk_payload(&apng, b"acTL").unwrap();
        assert_eq!(u32::from_be_bytes([actl[0], actl[1], actl[2], actl[3]]), 2);
        assert_eq!(u32::from_be_bytes([actl[4], actl[5], actl[6], actl[7]]), 0);
        assert!(chunk_payload(&apng, b"fcTL").is_some());

        let still = image::load_from_memory(&apng).unwrap();
        assert_eq!((still.width(), still.height()), (8, 8));
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = encode_apng(&[], 16).unwrap_err();
        assert!(err.to_string().contains("no frames"));
    }
}
