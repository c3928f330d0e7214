//! Per-entity sample history and interpolation.
//!
//! Each entity keeps a bounded `HeapRb` of authoritative samples in strictly
//! increasing capture order. Queries bracket the requested instant between
//! two samples; the adaptive [`PlaybackWindow`] reports how far behind the
//! newest data playback should run.

use std::collections::HashMap;
use std::fmt;

use contracts::{InterpolatedState, InterpolationConfig};
use ringbuf::{traits::*, HeapRb};
use tracing::trace;

use crate::geometry::{lerp_orientation, lerp_position};
use crate::window::PlaybackWindow;

/// Interpolating store of authoritative entity samples
pub struct SnapshotInterpolator {
    config: InterpolationConfig,
    histories: HashMap<String, HeapRb<InterpolatedState>>,
    window: PlaybackWindow,
    stale_count: u64,
}

impl fmt::Debug for SnapshotInterpolator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotInterpolator")
            .field("entities", &self.histories.len())
            .field("buffer_ms", &self.window.buffer_ms())
            .field("stale", &self.stale_count)
            .finish()
    }
}

impl SnapshotInterpolator {
    pub fn new(config: InterpolationConfig) -> Self {
        let window = PlaybackWindow::new(&config);
        Self {
            config,
            histories: HashMap::new(),
            window,
            stale_count: 0,
        }
    }

    /// Append a sample to the entity's history
    ///
    /// Returns `false` when the sample is not newer than the entity's newest
    /// stored sample; playback has already moved past it.
    pub fn enqueue(&mut self, entity_id: &str, sample: InterpolatedState, received_at_ms: f64) -> bool {
        self.window.observe(sample.captured_at_ms, received_at_ms);

        if !self.histories.contains_key(entity_id) {
            let capacity = self.config.history_capacity.max(2);
            self.histories
                .insert(entity_id.to_owned(), HeapRb::new(capacity));
        }
        let Some(history) = self.histories.get_mut(entity_id) else {
            return false;
        };

        let newest = history.iter().last().map(|s| s.captured_at_ms);
        if matches!(newest, Some(newest) if sample.captured_at_ms <= newest) {
            self.stale_count += 1;
            trace!(
                entity_id,
                captured_at_ms = sample.captured_at_ms,
                "dropping stale sample"
            );
            return false;
        }

        history.push_overwrite(sample);

        // keep two samples at minimum so the oldest can still bracket
        let horizon =
            sample.captured_at_ms as f64 - (self.window.buffer_ms() + self.config.reorder_slack_ms);
        while history.occupied_len() > 2 {
            let prunable = history
                .iter()
                .nth(1)
                .is_some_and(|second| second.captured_at_ms as f64 <= horizon);
            if !prunable {
                break;
            }
            history.try_pop();
        }

        true
    }

    /// Interpolated state of an entity at authoritative time `at_ms`
    ///
    /// Outside the stored range the nearest sample is returned. `None` only
    /// for entities without any sample.
    pub fn sample(&self, entity_id: &str, at_ms: f64) -> Option<InterpolatedState> {
        let history = self.histories.get(entity_id)?;

        let mut previous: Option<&InterpolatedState> = None;
        for current in history.iter() {
            if current.captured_at_ms as f64 >= at_ms {
                return Some(match previous {
                    Some(previous) => interpolate(previous, current, at_ms),
                    None => *current,
                });
            }
            previous = Some(current);
        }

        previous.copied()
    }

    /// Newest stored sample of an entity
    pub fn latest(&self, entity_id: &str) -> Option<InterpolatedState> {
        self.histories
            .get(entity_id)
            .and_then(|history| history.iter().last().copied())
    }

    /// Recommended playback delay (ms)
    #[inline]
    pub fn buffer_ms(&self) -> f64 {
        self.window.buffer_ms()
    }

    /// Smoothed transit jitter (ms)
    #[inline]
    pub fn jitter_ms(&self) -> f64 {
        self.window.jitter_ms()
    }

    /// Entities with stored history, in no particular order
    pub fn entity_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.histories.keys().map(String::as_str)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.histories.contains_key(entity_id)
    }

    /// Number of entities with history
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Samples stored for an entity
    pub fn history_len(&self, entity_id: &str) -> usize {
        self.histories
            .get(entity_id)
            .map_or(0, |history| history.occupied_len())
    }

    /// Samples dropped for arriving behind the entity's newest sample
    #[inline]
    pub fn stale_count(&self) -> u64 {
        self.stale_count
    }

    /// Drop every history and the stream statistics
    pub fn clear(&mut self) {
        self.histories.clear();
        self.window.reset_stream();
    }
}

impl Default for SnapshotInterpolator {
    fn default() -> Self {
        Self::new(InterpolationConfig::default())
    }
}

fn interpolate(from: &InterpolatedState, to: &InterpolatedState, at_ms: f64) -> InterpolatedState {
    let span = (to.captured_at_ms - from.captured_at_ms) as f64;
    let t = if span > 0.0 {
        ((at_ms - from.captured_at_ms as f64) / span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let anchor = if t >= 1.0 { to } else { from };

    InterpolatedState {
        tick_id: anchor.tick_id,
        keyframe: anchor.keyframe,
        captured_at_ms: anchor.captured_at_ms,
        position: lerp_position(from.position, to.position, t),
        orientation: lerp_orientation(from.orientation, to.orientation, t),
    }
}
