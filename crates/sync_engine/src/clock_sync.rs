//! Local-to-authoritative clock offset estimation.
//!
//! EWMA over round-trip compensated offset samples. The first accepted
//! sample seeds the estimate; later samples move it by `smoothing × delta`,
//! with each step clamped to `max_step_ms`.

use std::collections::VecDeque;

use contracts::{ClockSyncConfig, TimeSyncMessage};
use tracing::{debug, instrument};

use crate::ClockSyncError;

const RESIDUAL_WINDOW: usize = 16;

/// Outcome of one accepted time-sync message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSample {
    /// Offset measured from this message alone (ms)
    pub measured_offset_ms: f64,
    /// Smoothed offset after applying the message (ms)
    pub offset_ms: f64,
    /// Round-trip time, when the message echoed a send timestamp (ms)
    pub round_trip_ms: Option<f64>,
}

/// Offset estimator between the local monotonic clock and server time
#[derive(Debug, Clone)]
pub struct ClockSynchronizer {
    config: ClockSyncConfig,
    offset_ms: f64,
    sample_count: u64,
    last_round_trip_ms: Option<f64>,
    last_update_local_ms: Option<f64>,
    last_recommended_offset_ms: Option<f64>,
    /// Measured minus smoothed offset, for diagnostics
    residual_window: VecDeque<f64>,
}

impl ClockSynchronizer {
    pub fn new(config: ClockSyncConfig) -> Self {
        Self {
            config,
            offset_ms: 0.0,
            sample_count: 0,
            last_round_trip_ms: None,
            last_update_local_ms: None,
            last_recommended_offset_ms: None,
            residual_window: VecDeque::with_capacity(RESIDUAL_WINDOW),
        }
    }

    /// Ingest a time-sync message received at `local_now_ms`
    #[instrument(
        level = "debug",
        name = "clock_sync_handle_message",
        skip(self, message),
        fields(server_ms = message.server_timestamp_ms)
    )]
    pub fn handle_message(
        &mut self,
        message: &TimeSyncMessage,
        local_now_ms: f64,
    ) -> Result<ClockSample, ClockSyncError> {
        check_finite("server_timestamp_ms", message.server_timestamp_ms)?;
        check_finite("local_now_ms", local_now_ms)?;

        let (measured_offset_ms, round_trip_ms) = match message.client_send_timestamp_ms {
            Some(sent) => {
                check_finite("client_send_timestamp_ms", sent)?;
                let round_trip = local_now_ms - sent;
                if round_trip < 0.0 {
                    return Err(ClockSyncError::NegativeRoundTrip {
                        round_trip_ms: round_trip,
                    });
                }
                (
                    message.server_timestamp_ms - (sent + local_now_ms) / 2.0,
                    Some(round_trip),
                )
            }
            None => (message.server_timestamp_ms - local_now_ms, None),
        };

        let residual = measured_offset_ms - self.offset_ms;
        if self.sample_count == 0 {
            self.offset_ms = measured_offset_ms;
        } else {
            let limit = self.config.max_step_ms.abs();
            let step = (self.config.smoothing * residual).clamp(-limit, limit);
            self.offset_ms += step;
        }

        self.sample_count += 1;
        self.last_round_trip_ms = round_trip_ms.or(self.last_round_trip_ms);
        self.last_update_local_ms = Some(local_now_ms);
        if let Some(recommended) = message.recommended_offset_ms.filter(|v| v.is_finite()) {
            self.last_recommended_offset_ms = Some(recommended);
        }
        self.record_residual(residual);

        debug!(
            measured_offset_ms,
            offset_ms = self.offset_ms,
            round_trip_ms,
            recommended_offset_ms = message.recommended_offset_ms,
            samples = self.sample_count,
            "clock offset updated"
        );

        Ok(ClockSample {
            measured_offset_ms,
            offset_ms: self.offset_ms,
            round_trip_ms,
        })
    }

    /// Estimated authoritative time for a local instant
    #[inline]
    pub fn now(&self, local_now_ms: f64) -> f64 {
        local_now_ms + self.offset_ms
    }

    /// Current offset estimate (ms), zero before the first message
    #[inline]
    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    #[inline]
    pub fn is_synchronized(&self) -> bool {
        self.sample_count > 0
    }

    #[inline]
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    #[inline]
    pub fn last_round_trip_ms(&self) -> Option<f64> {
        self.last_round_trip_ms
    }

    #[inline]
    pub fn last_update_local_ms(&self) -> Option<f64> {
        self.last_update_local_ms
    }

    /// Last drift hint sent by the broker; informational only
    #[inline]
    pub fn last_recommended_offset_ms(&self) -> Option<f64> {
        self.last_recommended_offset_ms
    }

    /// Latest residuals, oldest first
    pub fn recent_residuals(&self) -> impl Iterator<Item = &f64> {
        self.residual_window.iter()
    }

    /// Forget all samples and return to the zero-offset state
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_residual(&mut self, residual: f64) {
        if self.residual_window.len() == RESIDUAL_WINDOW {
            self.residual_window.pop_front();
        }
        self.residual_window.push_back(residual);
    }
}

impl Default for ClockSynchronizer {
    fn default() -> Self {
        Self::new(ClockSyncConfig::default())
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ClockSyncError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ClockSyncError::NonFinite { field, value })
    }
}
