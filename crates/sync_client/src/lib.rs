//! # Sync Client
//!
//! 同步编排器：连接生命周期、快照缓冲、强制校正与实体名册。
//!
//! ## 数据流
//!
//! ```text
//! SocketOpener ──TransportEvent──► SyncClient
//!                                    │ wire_codec 解码
//!                                    ▼
//!                          SnapshotBuffer (按捕获时间排序)
//!                                    │ now - reconciliation_delay 释放
//!                                    ▼
//!                 ForcedCorrection / SnapshotInterpolator / Roster
//!                                    │
//!                                    ▼
//!                        get_entity_state / SyncEvent
//! ```
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_client::SyncClient;
//!
//! let mut client = SyncClient::new(config, opener);
//! client.connect().await?;
//!
//! // 每帧查询
//! if let Some(state) = client.get_entity_state("vehicle-7", None) {
//!     render(state.position, state.orientation);
//! }
//! ```
//!
//! 没有定时器：传输事件与到期快照在每次查询或入队时惰性处理。

mod client;
mod correction;
mod error;
mod events;
mod roster;

pub use client::SyncClient;
pub use correction::{Divergence, ForcedCorrection};
pub use error::SyncError;
pub use events::{EventBus, SubscriptionId};
pub use roster::Roster;

// Re-export contracts types callers need
pub use contracts::{
    ClientStats, ConnectionState, CorrectionEvent, InterpolatedState, RosterChange, SyncClientConfig,
    SyncEvent,
};
