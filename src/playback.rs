use std::num::NonZeroU32;
use std::time::Duration;

use crate::decode::FrameSequence;
use crate::error::{FlipbookError, FlipbookResult};

/// How long one pass through a frame sequence should take.
///
/// At most one of target fps and explicit duration may be set; with neither,
/// the sequence's natural duration applies. Resolution priority is fixed:
/// target fps, then explicit duration, then natural duration.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct PlaybackSpec {
    target_fps: Option<NonZeroU32>,
    duration: Option<Duration>,
}

impl PlaybackSpec {
    /// Play at the sequence's natural duration.
    pub fn natural() -> Self {
        Self::default()
    }

    /// Derive the duration from a target frame rate. `fps` must be > 0.
    pub fn with_fps(fps: u32) -> FlipbookResult<Self> {
        let fps = NonZeroU32::new(fps)
            .ok_or_else(|| FlipbookError::validation("target fps must be > 0"))?;
        Ok(Self {
            target_fps: Some(fps),
            duration: None,
        })
    }

    /// Play one pass over a fixed wall-clock duration.
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            target_fps: None,
            duration: Some(duration),
        }
    }

    /// Build from optional parts, rejecting the over-constrained case where
    /// both a target fps and an explicit duration are supplied.
    pub fn new(target_fps: Option<u32>, duration: Option<Duration>) -> FlipbookResult<Self> {
        match (target_fps, duration) {
            (Some(_), Some(_)) => Err(FlipbookError::validation(
                "target fps and explicit duration are mutually exclusive",
            )),
            (Some(fps), None) => Self::with_fps(fps),
            (None, Some(d)) => Ok(Self::with_duration(d)),
            (None, None) => Ok(Self::natural()),
        }
    }

    /// Configured target frame rate, if any.
    pub fn target_fps(&self) -> Option<u32> {
        self.target_fps.map(NonZeroU32::get)
    }

    /// Configured explicit duration, if any.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

/// Resolve the effective total playback duration for `sequence` under `spec`.
///
/// Exactly one branch applies, in priority order: `frame_count / target_fps`
/// (rounded to the nearest millisecond), else the explicit duration, else
/// the sequence's natural duration.
pub fn resolve_duration(spec: &PlaybackSpec, sequence: &FrameSequence) -> Duration {
    if let Some(fps) = spec.target_fps {
        let secs = sequence.frame_count() as f64 / f64::from(fps.get());
        return Duration::from_millis((secs * 1000.0).round() as u64);
    }
    if let Some(duration) = spec.duration {
        return duration;
    }
    sequence.natural_duration
}

/// Map a normalized playback position in `[0.0, 1.0]` to a frame index.
///
/// `floor((frame_count - 1) * t)`, clamped into `[0, frame_count - 1]`:
/// `t = 0` is exactly the first frame, `t = 1` exactly the last, and the
/// mapping is monotonic in between, which is what makes manual scrubbing
/// land precisely on the endpoints. A not-yet-loaded sequence
/// (`frame_count == 0`) maps to index 0.
pub fn frame_index(position: f64, frame_count: usize) -> usize {
    if frame_count == 0 {
        return 0;
    }
    let t = position.clamp(0.0, 1.0);
    let index = ((frame_count - 1) as f64 * t).floor() as usize;
    index.min(frame_count - 1)
}
