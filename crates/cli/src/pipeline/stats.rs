//! Session statistics.

use std::collections::BTreeSet;
use std::time::Duration;

use contracts::BufferStats;
use observability::SyncMetricsAggregator;

/// Statistics from a replay session
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Render ticks executed
    pub render_ticks: u64,

    /// Entity queries that returned a state
    pub samples: u64,

    /// Entity queries for entities without history
    pub misses: u64,

    /// Entities that produced at least one state
    pub entities_seen: BTreeSet<String>,

    /// Roster at the end of the session
    pub roster: Vec<String>,

    /// Pending buffer status at the end of the session
    pub buffer: BufferStats,

    /// Final clock offset estimate (ms)
    pub clock_offset_ms: f64,

    /// Time-sync samples applied
    pub clock_samples: u64,

    /// Total duration of the session
    pub duration: Duration,

    /// Event and counter aggregation
    pub sync_metrics: SyncMetricsAggregator,
}

impl SessionStats {
    /// Entity samples per second
    pub fn sample_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.samples as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Session Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Render ticks: {}", self.render_ticks);
        println!("   ├─ Samples: {} ({:.1}/s)", self.samples, self.sample_rate());
        println!("   ├─ Misses: {}", self.misses);
        println!("   └─ Entities seen: {}", self.entities_seen.len());

        println!("\n⏱  Clock");
        println!("   ├─ Offset: {:.2} ms", self.clock_offset_ms);
        println!("   └─ Samples: {}", self.clock_samples);

        println!("\n📦 Pending Buffer");
        println!("   ├─ Depth: {}", self.buffer.depth);
        println!("   ├─ Dropped: {}", self.buffer.dropped_count);
        println!("   └─ Out-of-order: {}", self.buffer.out_of_order_count);

        if !self.roster.is_empty() {
            println!("\n👥 Roster ({})", self.roster.len());
            for (i, entity_id) in self.roster.iter().enumerate() {
                let prefix = if i == self.roster.len() - 1 { "└─" } else { "├─" };
                println!("   {} {}", prefix, entity_id);
            }
        }

        println!("\n{}", self.sync_metrics.summary());
    }
}
