//! Flipbook loads animated images, caches their decoded frames process-wide,
//! and maps a normalized playback position onto a frame index.
//!
//! The public API is player-oriented:
//!
//! - Describe where the bytes live with a [`Source`]
//! - Load it through a [`Player`] wired to a [`PlaybackClock`]
//! - On every clock tick, read the current frame and hand it to your renderer
#![forbid(unsafe_code)]

pub mod cache;
pub mod clock;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod playback;
pub mod player;
pub mod source;

pub use cache::FrameCache;
pub use clock::{ClockListener, ListenerId, ManualClock, PlaybackClock, TimerClock};
pub use decode::{DecodedFrame, FrameSequence, decode_frames};
pub use error::{FlipbookError, FlipbookResult};
pub use fetch::{AssetBundle, DirBundle, Fetcher, StaticBundle};
pub use playback::{PlaybackSpec, frame_index, resolve_duration};
pub use player::{CompletionFn, LoadState, Player};
pub use source::{Source, SourceKey};

/// Lock a mutex, recovering the guard if a panicking holder poisoned it.
/// Every critical section in this crate is short and panic-free.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
