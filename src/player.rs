use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::FrameCache;
use crate::clock::{ListenerId, PlaybackClock};
use crate::decode::{FrameSequence, decode_frames};
use crate::error::FlipbookResult;
use crate::fetch::Fetcher;
use crate::lock;
use crate::playback::{PlaybackSpec, frame_index, resolve_duration};
use crate::source::Source;

/// Zero-argument notification fired exactly once per successful load.
pub type CompletionFn = Arc<dyn Fn() + Send + Sync>;

/// Load lifecycle of a player instance.
///
/// `Idle -> Loading -> Ready`, re-entering `Loading` whenever the source
/// changes. While not `Ready` there is nothing to render and the host shows
/// its placeholder.
#[derive(Clone, Debug, Default)]
pub enum LoadState {
    /// No load requested yet.
    #[default]
    Idle,
    /// A load is in flight (or has failed; failures stay here).
    Loading,
    /// Frames are available.
    Ready(Arc<FrameSequence>),
}

impl LoadState {
    /// Whether frames are available.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

#[derive(Default)]
struct PlayerShared {
    state: Mutex<LoadState>,
    spec: Mutex<PlaybackSpec>,
    effective_duration: Mutex<Option<Duration>>,
    current_index: AtomicUsize,
    // Load epoch: bumped by every load and by teardown. A completion whose
    // epoch is stale is suppressed.
    epoch: AtomicU64,
    torn_down: AtomicBool,
    on_ready: Mutex<Option<CompletionFn>>,
}

impl PlayerShared {
    fn on_tick(&self, position: f64) {
        if self.torn_down.load(Ordering::Acquire) {
            return;
        }
        if let LoadState::Ready(sequence) = &*lock(&self.state) {
            let index = frame_index(position, sequence.frame_count());
            self.current_index.store(index, Ordering::Release);
        }
    }
}

/// Per-instance coordinator: resolves a source against the frame cache,
/// runs fetch/decode on misses, and answers clock ticks with a frame index.
///
/// A cache hit completes synchronously within the `load` call. On a miss the
/// decoded sequence is published via the cache's insert-if-absent, so
/// concurrent first-loads of one key converge on a single canonical
/// sequence. After [`teardown`] every late completion is suppressed: no
/// notification, no state change, no panic. An in-flight load's cache
/// insert still lands, since it benefits future loads.
///
/// [`teardown`]: Player::teardown
pub struct Player {
    shared: Arc<PlayerShared>,
    cache: Arc<FrameCache>,
    fetcher: Arc<Fetcher>,
    clock: Arc<dyn PlaybackClock>,
    listener: ListenerId,
}

impl Player {
    /// Player using the process-wide cache and a default fetcher.
    pub fn new(clock: Arc<dyn PlaybackClock>) -> Self {
        Self::with_parts(FrameCache::global(), Arc::new(Fetcher::new()), clock)
    }

    /// Player with every collaborator injected.
    pub fn with_parts(
        cache: Arc<FrameCache>,
        fetcher: Arc<Fetcher>,
        clock: Arc<dyn PlaybackClock>,
    ) -> Self {
        let shared = Arc::new(PlayerShared::default());
        let listener = {
            let shared = shared.clone();
            clock.subscribe(Arc::new(move |position| shared.on_tick(position)))
        };
        Self {
            shared,
            cache,
            fetcher,
            clock,
            listener,
        }
    }

    /// Replace the playback spec. Takes effect at the next completed load.
    pub fn set_spec(&self, spec: PlaybackSpec) {
        *lock(&self.shared.spec) = spec;
    }

    /// Register the completion notification, fired once per successful load.
    pub fn set_on_ready(&self, on_ready: impl Fn() + Send + Sync + 'static) {
        *lock(&self.shared.on_ready) = Some(Arc::new(on_ready));
    }

    /// Load `source`, reusing the cache when possible.
    ///
    /// Re-entrant: calling again with a new source supersedes the previous
    /// load (its completion is suppressed when it eventually lands). Errors
    /// from fetch or decode propagate to the caller and leave the player in
    /// `Loading` with nothing cached.
    #[tracing::instrument(skip(self, source), fields(key = %source.cache_key()))]
    pub async fn load(&self, source: Source) -> FlipbookResult<Arc<FrameSequence>> {
        let epoch = self.begin_load();
        let key = source.cache_key();

        if let Some(sequence) = self.cache.lookup(&key) {
            tracing::debug!("frame cache hit");
            self.finish(epoch, sequence.clone());
            return Ok(sequence);
        }

        tracing::debug!("frame cache miss, fetching");
        let bytes = self.fetcher.fetch(&source).await?;
        let sequence = Arc::new(decode_frames(&bytes)?);
        // The insert still lands when this load has been superseded or torn
        // down: the decoded sequence is canonical for the key and benefits
        // future loads.
        let canonical = self.cache.insert_if_absent(key, sequence);

        self.finish(epoch, canonical.clone());
        Ok(canonical)
    }

    /// Current load state.
    pub fn state(&self) -> LoadState {
        lock(&self.shared.state).clone()
    }

    /// The loaded sequence plus the frame index for the clock's position,
    /// or `None` while nothing is loaded.
    pub fn current(&self) -> Option<(Arc<FrameSequence>, usize)> {
        match &*lock(&self.shared.state) {
            LoadState::Ready(sequence) => Some((
                sequence.clone(),
                self.shared.current_index.load(Ordering::Acquire),
            )),
            _ => None,
        }
    }

    /// Frame index computed at the most recent clock tick (0 while loading).
    pub fn current_index(&self) -> usize {
        self.shared.current_index.load(Ordering::Acquire)
    }

    /// Effective total duration resolved at the last completed load.
    pub fn effective_duration(&self) -> Option<Duration> {
        *lock(&self.shared.effective_duration)
    }

    /// The clock driving this player.
    pub fn clock(&self) -> &Arc<dyn PlaybackClock> {
        &self.clock
    }

    /// Detach from the clock and suppress any in-flight completion.
    ///
    /// Idempotent. A fetch/decode already running is left to finish; its
    /// result is discarded apart from the cache insert.
    pub fn teardown(&self) {
        if self.shared.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        self.clock.unsubscribe(self.listener);
    }

    fn begin_load(&self) -> u64 {
        let epoch = self.shared.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        *lock(&self.shared.state) = LoadState::Loading;
        epoch
    }

    /// Transition to `Ready`, resolve the effective duration, and fire the
    /// completion notification, unless this load is stale.
    fn finish(&self, epoch: u64, sequence: Arc<FrameSequence>) {
        let shared = &self.shared;
        if shared.torn_down.load(Ordering::Acquire)
            || shared.epoch.load(Ordering::Acquire) != epoch
        {
            tracing::debug!("suppressing stale load completion");
            return;
        }

        let effective = resolve_duration(&lock(&shared.spec), &sequence);
        *lock(&shared.effective_duration) = Some(effective);

        let index = frame_index(self.clock.value(), sequence.frame_count());
        shared.current_index.store(index, Ordering::Release);
        *lock(&shared.state) = LoadState::Ready(sequence);

        let on_ready = lock(&shared.on_ready).clone();
        if let Some(on_ready) = on_ready {
            on_ready();
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("state", &self.state())
            .field("current_index", &self.current_index())
            .field("effective_duration", &self.effective_duration())
            .finish()
    }
}
