//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: the
//! snapshot data model, configuration, transport and clock seams, events and
//! errors. Business crates depend on this crate only, never the reverse.
//!
//! ## Time Model
//! - Authoritative capture times are server milliseconds (`i64`)
//! - Local and query times are milliseconds as `f64` so interpolation can
//!   address sub-millisecond instants

mod clock;
mod config;
mod connection;
mod error;
mod events;
mod model;
mod stats;
mod transport;

pub use clock::{ManualClock, MonotonicClock, SystemClock};
pub use config::*;
pub use connection::{ConnectionEvent, ConnectionState};
pub use error::*;
pub use events::*;
pub use model::*;
pub use stats::*;
pub use transport::*;
