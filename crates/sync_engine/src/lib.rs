//! # Sync Engine
//!
//! 客户端快照同步的核心算法（无 I/O、无定时器）。
//!
//! 负责：
//! - 本地时钟到权威时间的偏移估计（`ClockSynchronizer`）
//! - 按采集时间排序的待播放快照缓冲（`SnapshotBuffer`）
//! - 每实体历史与插值、自适应播放延迟（`SnapshotInterpolator`）
//!
//! ## 使用示例
//!
//! ```
//! use contracts::{InterpolatedState, Orientation, TimeSyncMessage, Vector3};
//! use sync_engine::{ClockSynchronizer, SnapshotInterpolator};
//!
//! let mut clock = ClockSynchronizer::default();
//! clock.handle_message(&TimeSyncMessage::new(10_000.0), 0.0).unwrap();
//! assert_eq!(clock.now(5.0), 10_005.0);
//!
//! let mut interpolator = SnapshotInterpolator::default();
//! let sample = |at: i64, x: f64| InterpolatedState {
//!     tick_id: at as u64,
//!     keyframe: false,
//!     captured_at_ms: at,
//!     position: Vector3::new(x, 0.0, 0.0),
//!     orientation: Orientation::default(),
//! };
//! interpolator.enqueue("alpha", sample(0, 0.0), 0.0);
//! interpolator.enqueue("alpha", sample(100, 4.0), 100.0);
//! assert_eq!(interpolator.sample("alpha", 50.0).unwrap().position.x, 2.0);
//! ```

mod buffer;
mod clock_sync;
mod error;
pub mod geometry;
mod interpolator;
mod window;

pub use buffer::SnapshotBuffer;
pub use clock_sync::{ClockSample, ClockSynchronizer};
pub use error::ClockSyncError;
pub use interpolator::SnapshotInterpolator;
pub use window::PlaybackWindow;

// Re-export contracts types
pub use contracts::{
    BufferStats, ClockSyncConfig, InterpolatedState, InterpolationConfig, PendingSnapshot,
};
