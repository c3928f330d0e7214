//! 快照同步指标收集模块
//!
//! 记录 SyncClient 的运行指标（Prometheus），并在内存中聚合事件用于摘要输出。

use std::collections::HashMap;

use contracts::{ClientStats, ConnectionState, CorrectionEvent, SyncEvent};
use metrics::{counter, gauge, histogram};

/// 记录快照接收
///
/// `source` 为 `binary` / `json` / `blob`。
pub fn record_snapshot_received(source: &'static str) {
    counter!("snapshot_sync_snapshots_received_total", "source" => source).increment(1);
}

/// 记录快照释放到插值器
pub fn record_snapshot_ingested(entity_count: usize) {
    counter!("snapshot_sync_snapshots_ingested_total").increment(1);
    histogram!("snapshot_sync_entities_per_snapshot").record(entity_count as f64);
}

/// 记录缓冲区溢出丢弃
pub fn record_snapshot_evicted() {
    counter!("snapshot_sync_snapshots_evicted_total").increment(1);
}

/// 记录解码失败
pub fn record_decode_failure(source: &'static str) {
    counter!("snapshot_sync_decode_failures_total", "source" => source).increment(1);
}

/// 记录无法识别的文本消息
pub fn record_unrecognized_message() {
    counter!("snapshot_sync_unrecognized_messages_total").increment(1);
}

/// 记录待播放缓冲区深度
pub fn record_buffer_depth(depth: usize) {
    gauge!("snapshot_sync_buffer_depth").set(depth as f64);
}

/// 记录时钟同步结果
pub fn record_clock_sample(offset_ms: f64, round_trip_ms: Option<f64>) {
    counter!("snapshot_sync_time_sync_messages_total").increment(1);
    gauge!("snapshot_sync_clock_offset_ms").set(offset_ms);
    if let Some(rtt) = round_trip_ms {
        histogram!("snapshot_sync_round_trip_ms").record(rtt);
    }
}

/// 记录强制校正
pub fn record_correction(event: &CorrectionEvent) {
    counter!("snapshot_sync_corrections_total").increment(1);
    histogram!("snapshot_sync_correction_position_error").record(event.position_error);
    histogram!("snapshot_sync_correction_orientation_error_deg").record(event.orientation_error);
}

/// 记录在线实体数量
pub fn record_roster_size(size: usize) {
    gauge!("snapshot_sync_roster_size").set(size as f64);
}

/// 记录推荐播放延迟
pub fn record_playback_buffer_ms(buffer_ms: f64) {
    gauge!("snapshot_sync_playback_buffer_ms").set(buffer_ms);
}

/// 记录连接状态变化
pub fn record_connection_state(state: ConnectionState) {
    counter!(
        "snapshot_sync_connection_transitions_total",
        "state" => state.as_str()
    )
    .increment(1);
    gauge!("snapshot_sync_connected").set(if state == ConnectionState::Connected {
        1.0
    } else {
        0.0
    });
}

/// 同步事件聚合器
///
/// 在内存中聚合事件与客户端计数，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsAggregator {
    /// 连接状态变化次数
    pub connection_changes: u64,

    /// 强制校正次数
    pub corrections: u64,

    /// 实体加入次数
    pub joins: u64,

    /// 实体离开次数
    pub despawns: u64,

    /// 校正位置误差统计
    pub position_error_stats: RunningStats,

    /// 校正朝向误差统计
    pub orientation_error_stats: RunningStats,

    /// 播放延迟统计
    pub playback_buffer_stats: RunningStats,

    /// 各实体校正次数
    pub corrections_by_entity: HashMap<String, u64>,

    /// 最近一次客户端计数
    pub client: ClientStats,
}

impl SyncMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 聚合一个同步事件
    pub fn update(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::ConnectionStatus { .. } => self.connection_changes += 1,
            SyncEvent::CorrectionApplied(correction) => {
                self.corrections += 1;
                self.position_error_stats.push(correction.position_error);
                self.orientation_error_stats
                    .push(correction.orientation_error);
                *self
                    .corrections_by_entity
                    .entry(correction.entity_id.clone())
                    .or_insert(0) += 1;
            }
            SyncEvent::RosterChanged(change) => {
                self.joins += change.joined.len() as u64;
                self.despawns += change.left.len() as u64;
            }
        }
    }

    /// 记录一次播放延迟采样
    pub fn record_playback_buffer(&mut self, buffer_ms: f64) {
        self.playback_buffer_stats.push(buffer_ms);
    }

    /// 更新客户端计数
    pub fn set_client_stats(&mut self, stats: &ClientStats) {
        self.client = stats.clone();
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let received = self.client.snapshots_received;
        MetricsSummary {
            snapshots_received: received,
            snapshots_ingested: self.client.snapshots_ingested,
            decode_failures: self.client.decode_failures,
            unrecognized_messages: self.client.unrecognized_messages,
            time_sync_messages: self.client.time_sync_messages,
            corrections: self.corrections,
            correction_rate: if received > 0 {
                self.corrections as f64 / received as f64 * 100.0
            } else {
                0.0
            },
            joins: self.joins,
            despawns: self.despawns,
            position_error: StatsSummary::from(&self.position_error_stats),
            orientation_error_deg: StatsSummary::from(&self.orientation_error_stats),
            playback_buffer_ms: StatsSummary::from(&self.playback_buffer_stats),
            corrections_by_entity: self.corrections_by_entity.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub snapshots_received: u64,
    pub snapshots_ingested: u64,
    pub decode_failures: u64,
    pub unrecognized_messages: u64,
    pub time_sync_messages: u64,
    pub corrections: u64,
    pub correction_rate: f64,
    pub joins: u64,
    pub despawns: u64,
    pub position_error: StatsSummary,
    pub orientation_error_deg: StatsSummary,
    pub playback_buffer_ms: StatsSummary,
    pub corrections_by_entity: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Snapshot Sync Summary ===")?;
        writeln!(
            f,
            "Snapshots: {} received, {} ingested",
            self.snapshots_received, self.snapshots_ingested
        )?;
        writeln!(
            f,
            "Decode failures: {}, unrecognized messages: {}",
            self.decode_failures, self.unrecognized_messages
        )?;
        writeln!(f, "Time sync messages: {}", self.time_sync_messages)?;
        writeln!(
            f,
            "Corrections: {} ({:.2}% of snapshots)",
            self.corrections, self.correction_rate
        )?;
        writeln!(f, "Roster: {} joined, {} left", self.joins, self.despawns)?;
        writeln!(f, "Position error: {}", self.position_error)?;
        writeln!(f, "Orientation error (deg): {}", self.orientation_error_deg)?;
        writeln!(f, "Playback buffer (ms): {}", self.playback_buffer_ms)?;

        if !self.corrections_by_entity.is_empty() {
            let mut entities: Vec<_> = self.corrections_by_entity.iter().collect();
            entities.sort();
            writeln!(f, "Corrections by entity:")?;
            for (entity_id, count) in entities {
                writeln!(f, "  {}: {}", entity_id, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::RosterChange;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(value);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = SyncMetricsAggregator::new();

        aggregator.update(&SyncEvent::ConnectionStatus {
            previous: ConnectionState::Disconnected,
            current: ConnectionState::Connecting,
        });
        aggregator.update(&SyncEvent::CorrectionApplied(CorrectionEvent {
            entity_id: "alpha".to_string(),
            position_error: 3.5,
            orientation_error: 2.0,
            tick_id: 10,
        }));
        aggregator.update(&SyncEvent::RosterChanged(RosterChange {
            joined: vec!["alpha".to_string(), "bravo".to_string()],
            left: vec!["charlie".to_string()],
            entity_ids: vec!["alpha".to_string(), "bravo".to_string()],
        }));

        assert_eq!(aggregator.connection_changes, 1);
        assert_eq!(aggregator.corrections, 1);
        assert_eq!(aggregator.joins, 2);
        assert_eq!(aggregator.despawns, 1);
        assert_eq!(aggregator.corrections_by_entity.get("alpha"), Some(&1));
        assert_eq!(aggregator.position_error_stats.max(), 3.5);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = SyncMetricsAggregator::new();
        aggregator.set_client_stats(&ClientStats {
            snapshots_received: 200,
            snapshots_ingested: 196,
            ..Default::default()
        });
        aggregator.update(&SyncEvent::CorrectionApplied(CorrectionEvent {
            entity_id: "alpha".to_string(),
            position_error: 2.5,
            orientation_error: 0.0,
            tick_id: 1,
        }));
        aggregator.record_playback_buffer(80.0);

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("200 received, 196 ingested"));
        assert!(output.contains("0.50%"));
        assert!(output.contains("alpha: 1"));
    }
}
