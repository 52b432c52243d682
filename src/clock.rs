use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::lock;

/// Callback invoked with the new normalized value on every clock change.
pub type ClockListener = Arc<dyn Fn(f64) + Send + Sync>;

/// Handle returned by [`PlaybackClock::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Host timeline capability driving playback.
///
/// The clock owns a normalized position in `[0.0, 1.0]` and notifies
/// subscribers on every change. Any host scheduler satisfying this interface
/// works; the crate ships [`ManualClock`] for scrubbing/tests and
/// [`TimerClock`] as a self-contained default.
pub trait PlaybackClock: Send + Sync {
    /// Current normalized position in `[0.0, 1.0]`.
    fn value(&self) -> f64;

    /// Assign the position directly (manual scrub). Clamped into range.
    fn set_value(&self, value: f64);

    /// Register a change listener.
    fn subscribe(&self, listener: ClockListener) -> ListenerId;

    /// Remove a previously registered listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: ListenerId);

    /// Rewind to 0.0.
    fn reset(&self);

    /// Run once from the current position to 1.0.
    fn forward(&self);

    /// Loop from the current position, wrapping at 1.0.
    fn repeat(&self);

    /// Halt without changing the position.
    fn stop(&self);
}

/// Value storage plus listener fan-out shared by the built-in clocks.
#[derive(Default)]
struct ClockShared {
    value_bits: AtomicU64,
    next_listener: AtomicU64,
    listeners: Mutex<HashMap<u64, ClockListener>>,
}

impl ClockShared {
    fn value(&self) -> f64 {
        f64::from_bits(self.value_bits.load(Ordering::Acquire))
    }

    fn publish(&self, value: f64) {
        let value = value.clamp(0.0, 1.0);
        self.value_bits.store(value.to_bits(), Ordering::Release);

        // Snapshot under the lock, invoke outside it: listeners may call back
        // into the clock.
        let snapshot: Vec<ClockListener> = lock(&self.listeners).values().cloned().collect();
        for listener in snapshot {
            listener(value);
        }
    }

    fn subscribe(&self, listener: ClockListener) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::AcqRel);
        lock(&self.listeners).insert(id, listener);
        ListenerId(id)
    }

    fn unsubscribe(&self, id: ListenerId) {
        lock(&self.listeners).remove(&id.0);
    }
}

/// Clock advanced only by explicit [`set_value`] calls.
///
/// For manual scrubbing and tests. `forward` snaps to 1.0 and `repeat`
/// rewinds to 0.0; actually animating the position over time is the
/// caller's job. `stop` is a no-op.
///
/// [`set_value`]: PlaybackClock::set_value
#[derive(Default)]
pub struct ManualClock {
    shared: ClockShared,
}

impl ManualClock {
    /// Clock positioned at 0.0 with no listeners.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackClock for ManualClock {
    fn value(&self) -> f64 {
        self.shared.value()
    }

    fn set_value(&self, value: f64) {
        self.shared.publish(value);
    }

    fn subscribe(&self, listener: ClockListener) -> ListenerId {
        self.shared.subscribe(listener)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.shared.unsubscribe(id);
    }

    fn reset(&self) {
        self.shared.publish(0.0);
    }

    fn forward(&self) {
        self.shared.publish(1.0);
    }

    fn repeat(&self) {
        self.shared.publish(0.0);
    }

    fn stop(&self) {}
}

/// Self-driving clock ticking on the tokio timer.
///
/// One full sweep of `[0.0, 1.0]` takes the configured period (see
/// [`set_period`]); hosts typically copy the player's effective duration
/// here after a load completes. `forward` runs once to 1.0, `repeat` loops,
/// `stop` halts in place, `set_value` scrubs (and halts any running sweep).
/// Must be used from within a tokio runtime.
///
/// [`set_period`]: TimerClock::set_period
pub struct TimerClock {
    shared: Arc<ClockShared>,
    period: Mutex<Duration>,
    tick: Duration,
    // Monotonic run generation; a sweep task exits as soon as its generation
    // is no longer current.
    run: Arc<AtomicU64>,
}

impl Default for TimerClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerClock {
    const DEFAULT_PERIOD: Duration = Duration::from_secs(1);
    const TICK: Duration = Duration::from_millis(16);

    /// Clock with a 1s sweep period, stopped at 0.0.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ClockShared::default()),
            period: Mutex::new(Self::DEFAULT_PERIOD),
            tick: Self::TICK,
            run: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Set the full-sweep duration used by subsequent `forward`/`repeat`
    /// calls. Does not affect a sweep already in flight.
    pub fn set_period(&self, period: Duration) {
        *lock(&self.period) = period;
    }

    /// Configured full-sweep duration.
    pub fn period(&self) -> Duration {
        *lock(&self.period)
    }

    fn halt(&self) {
        self.run.fetch_add(1, Ordering::AcqRel);
    }

    fn spawn_sweep(&self, looping: bool) {
        let generation = self.run.fetch_add(1, Ordering::AcqRel) + 1;
        let shared = self.shared.clone();
        let run = self.run.clone();
        let period = self.period();
        let tick = self.tick;

        let step = (tick.as_secs_f64() / period.as_secs_f64().max(f64::EPSILON)).min(1.0);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; consume it so the sweep
            // starts one tick from now.
            interval.tick().await;

            let mut position = shared.value();
            loop {
                interval.tick().await;
                if run.load(Ordering::Acquire) != generation {
                    return;
                }
                position += step;
                if position >= 1.0 {
                    if looping {
                        position -= 1.0;
                    } else {
                        shared.publish(1.0);
                        return;
                    }
                }
                shared.publish(position);
            }
        });
    }
}

impl Drop for TimerClock {
    fn drop(&mut self) {
        self.halt();
    }
}

impl PlaybackClock for TimerClock {
    fn value(&self) -> f64 {
        self.shared.value()
    }

    fn set_value(&self, value: f64) {
        self.halt();
        self.shared.publish(value);
    }

    fn subscribe(&self, listener: ClockListener) -> ListenerId {
        self.shared.subscribe(listener)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.shared.unsubscribe(id);
    }

    fn reset(&self) {
        self.halt();
        self.shared.publish(0.0);
    }

    fn forward(&self) {
        self.spawn_sweep(false);
    }

    fn repeat(&self) {
        self.spawn_sweep(true);
    }

    fn stop(&self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_listener() -> (ClockListener, Arc<Mutex<Vec<f64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: ClockListener = Arc::new(move |v| lock(&sink).push(v));
        (listener, seen)
    }

    #[test]
    fn manual_clock_notifies_subscribers() {
        let clock = ManualClock::new();
        let (listener, seen) = recording_listener();
        let id = clock.subscribe(listener);

        clock.set_value(0.25);
        clock.set_value(2.0); // clamped
        clock.forward();
        assert_eq!(*lock(&seen), vec![0.25, 1.0, 1.0]);
        assert_eq!(clock.value(), 1.0);

        clock.unsubscribe(id);
        clock.set_value(0.5);
        assert_eq!(lock(&seen).len(), 3);
    }

    #[test]
    fn manual_clock_reset_and_repeat_rewind() {
        let clock = ManualClock::new();
        clock.set_value(0.8);
        clock.reset();
        assert_eq!(clock.value(), 0.0);
        clock.set_value(0.8);
        clock.repeat();
        assert_eq!(clock.value(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_clock_forward_reaches_one_and_stops() {
        let clock = TimerClock::new();
        clock.set_period(Duration::from_millis(100));
        clock.forward();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(clock.value(), 1.0);

        // No further movement after completion.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(clock.value(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_clock_repeat_wraps_below_one() {
        let clock = TimerClock::new();
        clock.set_period(Duration::from_millis(100));
        clock.repeat();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let value = clock.value();
        assert!((0.0..1.0).contains(&value), "looping value was {value}");

        clock.stop();
        let stopped_at = clock.value();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(clock.value(), stopped_at);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_clock_set_value_halts_sweep() {
        let clock = TimerClock::new();
        clock.set_period(Duration::from_millis(100));
        clock.forward();
        clock.set_value(0.5);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(clock.value(), 0.5);
    }
}
