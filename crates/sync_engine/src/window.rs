//! Adaptive playback window.
//!
//! Tracks the capture interval and RFC 3550 style transit jitter of the
//! snapshot stream and derives a recommended playback delay from them.

use contracts::InterpolationConfig;

/// Adaptive recommended playback delay
#[derive(Debug, Clone)]
pub struct PlaybackWindow {
    min_ms: f64,
    max_ms: f64,
    max_step_ms: f64,
    jitter_multiplier: f64,
    smoothing: f64,
    buffer_ms: f64,
    interval_ms: Option<f64>,
    jitter_ms: f64,
    last_captured_at_ms: Option<i64>,
    last_transit_ms: Option<f64>,
}

impl PlaybackWindow {
    pub fn new(config: &InterpolationConfig) -> Self {
        let min_ms = config.min_buffer_ms.min(config.max_buffer_ms);
        let max_ms = config.max_buffer_ms.max(min_ms);
        Self {
            min_ms,
            max_ms,
            max_step_ms: config.max_step_ms.abs(),
            jitter_multiplier: config.jitter_multiplier,
            smoothing: config.smoothing.clamp(0.0, 1.0),
            buffer_ms: config.initial_buffer_ms.clamp(min_ms, max_ms),
            interval_ms: None,
            jitter_ms: 0.0,
            last_captured_at_ms: None,
            last_transit_ms: None,
        }
    }

    /// Record the arrival of a snapshot captured at `captured_at_ms`
    ///
    /// Only captures newer than the last observed one count, so a snapshot
    /// carrying many entities is observed once.
    pub fn observe(&mut self, captured_at_ms: i64, received_at_ms: f64) {
        if !received_at_ms.is_finite() {
            return;
        }
        if matches!(self.last_captured_at_ms, Some(last) if captured_at_ms <= last) {
            return;
        }

        let transit_ms = received_at_ms - captured_at_ms as f64;

        if let Some(last) = self.last_captured_at_ms {
            let interval = (captured_at_ms - last) as f64;
            self.interval_ms = Some(match self.interval_ms {
                Some(current) => current + self.smoothing * (interval - current),
                None => interval,
            });
        }
        if let Some(last_transit) = self.last_transit_ms {
            let deviation = (transit_ms - last_transit).abs();
            self.jitter_ms += self.smoothing * (deviation - self.jitter_ms);
        }

        self.last_captured_at_ms = Some(captured_at_ms);
        self.last_transit_ms = Some(transit_ms);

        if let Some(interval) = self.interval_ms {
            let target = (interval + self.jitter_multiplier * self.jitter_ms)
                .clamp(self.min_ms, self.max_ms);
            let step = (target - self.buffer_ms).clamp(-self.max_step_ms, self.max_step_ms);
            self.buffer_ms = (self.buffer_ms + step).clamp(self.min_ms, self.max_ms);
        }
    }

    /// Recommended playback delay (ms)
    #[inline]
    pub fn buffer_ms(&self) -> f64 {
        self.buffer_ms
    }

    /// Smoothed transit jitter (ms)
    #[inline]
    pub fn jitter_ms(&self) -> f64 {
        self.jitter_ms
    }

    /// Smoothed capture interval (ms), once two captures were seen
    #[inline]
    pub fn interval_ms(&self) -> Option<f64> {
        self.interval_ms
    }

    /// Forget stream statistics; the current delay is kept
    pub fn reset_stream(&mut self) {
        self.interval_ms = None;
        self.jitter_ms = 0.0;
        self.last_captured_at_ms = None;
        self.last_transit_ms = None;
    }
}
