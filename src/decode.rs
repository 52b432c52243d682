use std::io::Cursor;
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, ImageFormat, RgbaImage};

use crate::error::{FlipbookError, FlipbookResult};

/// Floor applied to authored zero/near-zero frame delays. Encoders commonly
/// write 0ms delays that hosts are expected to clamp.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(10);

/// Delay assigned to the single frame of a non-animated source.
pub const STATIC_FRAME_DELAY: Duration = Duration::from_millis(100);

/// One decoded frame: full-canvas RGBA8 plus its authored display time.
///
/// Never mutated after decode; shared read-only through the owning
/// [`FrameSequence`].
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    /// Composited full-canvas pixels.
    pub rgba: RgbaImage,
    /// Authored display duration, floored at [`MIN_FRAME_DELAY`].
    pub delay: Duration,
}

/// Ordered decoded frames for one animated image, plus the total natural
/// playback duration summed from each frame's authored display time.
#[derive(Clone, Debug)]
pub struct FrameSequence {
    /// Frames in playback order. Non-empty by construction.
    pub frames: Vec<DecodedFrame>,
    /// Sum of all frame delays.
    pub natural_duration: Duration,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
}

impl FrameSequence {
    /// Number of frames in the sequence.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn from_frames(frames: Vec<DecodedFrame>) -> FlipbookResult<Self> {
        let Some(first) = frames.first() else {
            return Err(FlipbookError::decode("image has no frames"));
        };
        let (width, height) = (first.rgba.width(), first.rgba.height());
        let natural_duration = frames.iter().map(|f| f.delay).sum();
        Ok(Self {
            frames,
            natural_duration,
            width,
            height,
        })
    }
}

/// Decode encoded image bytes into a [`FrameSequence`].
///
/// Animated GIF, APNG, and animated WebP decode to their full frame list with
/// per-frame authored delays. Any other recognized image decodes to a
/// single-frame sequence with [`STATIC_FRAME_DELAY`]. Malformed input fails
/// with [`FlipbookError::Decode`]; no partial sequence is ever produced.
pub fn decode_frames(bytes: &[u8]) -> FlipbookResult<FrameSequence> {
    let format = image::guess_format(bytes)
        .map_err(|e| FlipbookError::decode(format!("unrecognized image container: {e}")))?;

    match format {
        ImageFormat::Gif => {
            let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(decode_err)?;
            collect_animation(decoder)
        }
        ImageFormat::Png => {
            let decoder = PngDecoder::new(Cursor::new(bytes)).map_err(decode_err)?;
            if decoder.is_apng().map_err(decode_err)? {
                collect_animation(decoder.apng().map_err(decode_err)?)
            } else {
                decode_single(bytes)
            }
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(bytes)).map_err(decode_err)?;
            if decoder.has_animation() {
                collect_animation(decoder)
            } else {
                decode_single(bytes)
            }
        }
        _ => decode_single(bytes),
    }
}

fn collect_animation<'a>(decoder: impl AnimationDecoder<'a>) -> FlipbookResult<FrameSequence> {
    let frames = decoder.into_frames().collect_frames().map_err(decode_err)?;

    let mut out = Vec::with_capacity(frames.len());
    for frame in frames {
        let (num, den) = frame.delay().numer_denom_ms();
        let delay = round_delay_ms(num, den).max(MIN_FRAME_DELAY);
        out.push(DecodedFrame {
            rgba: frame.into_buffer(),
            delay,
        });
    }

    let sequence = FrameSequence::from_frames(out)?;
    tracing::debug!(
        frames = sequence.frame_count(),
        natural_ms = sequence.natural_duration.as_millis() as u64,
        "decoded animated image"
    );
    Ok(sequence)
}

fn decode_single(bytes: &[u8]) -> FlipbookResult<FrameSequence> {
    let rgba = image::load_from_memory(bytes)
        .map_err(decode_err)?
        .to_rgba8();
    FrameSequence::from_frames(vec![DecodedFrame {
        rgba,
        delay: STATIC_FRAME_DELAY,
    }])
}

/// `Delay::numer_denom_ms` yields a fractional millisecond value (num/den ms);
/// round to the nearest whole millisecond.
fn round_delay_ms(num: u32, den: u32) -> Duration {
    if den == 0 {
        return MIN_FRAME_DELAY;
    }
    let ms = (u64::from(num) + u64::from(den) / 2) / u64::from(den);
    Duration::from_millis(ms)
}

fn decode_err(e: image::ImageError) -> FlipbookError {
    FlipbookError::decode(e.to_string())
}
