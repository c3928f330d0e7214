//! Synchronization orchestrator.
//!
//! Owns the connection lifecycle, the pending snapshot buffer, forced
//! corrections and the roster. There are no timers: transport events are
//! drained and buffered snapshots released lazily, whenever the client is
//! queried or a snapshot is queued.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use contracts::{
    BufferStats, ClientStats, ConnectionEvent, ConnectionState, CorrectionEvent, InterpolatedState,
    MonotonicClock, Payload, PendingSnapshot, Socket, SocketOpener, SyncClientConfig, SyncEvent,
    SystemClock, TransportEvent, TransportReceiver, WorldSnapshot,
};
use sync_engine::{ClockSynchronizer, SnapshotBuffer, SnapshotInterpolator};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};
use wire_codec::{decode_world_snapshot, parse_text_message, TextMessage};

use crate::correction::{Divergence, ForcedCorrection};
use crate::events::{EventBus, SubscriptionId};
use crate::roster::{Roster, RosterDelta};
use crate::SyncError;

type BlobRead = oneshot::Receiver<std::io::Result<Bytes>>;

const SOURCE_BINARY: &str = "binary";
const SOURCE_BLOB: &str = "blob";
const SOURCE_JSON: &str = "json";
const SOURCE_DIRECT: &str = "direct";

/// Client-side entity state synchronizer
///
/// Single owner: every method takes `&mut self` and runs to completion.
/// The only suspension point is [`connect`](Self::connect).
pub struct SyncClient<O: SocketOpener> {
    config: SyncClientConfig,
    opener: O,
    clock: Arc<dyn MonotonicClock>,
    state: ConnectionState,
    socket: Option<Box<dyn Socket>>,
    transport_rx: Option<TransportReceiver>,
    pending_blobs: VecDeque<BlobRead>,
    clock_sync: ClockSynchronizer,
    buffer: SnapshotBuffer,
    interpolator: SnapshotInterpolator,
    corrections: HashMap<String, ForcedCorrection>,
    /// Last state handed out per entity
    predicted: HashMap<String, InterpolatedState>,
    roster: Roster,
    events: EventBus,
    stats: ClientStats,
}

impl<O: SocketOpener> std::fmt::Debug for SyncClient<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("state", &self.state)
            .field("buffer", &self.buffer)
            .field("interpolator", &self.interpolator)
            .field("roster", &self.roster.len())
            .field("corrections", &self.corrections.len())
            .finish()
    }
}

impl<O: SocketOpener> SyncClient<O> {
    /// Create a client reading time from the system monotonic clock
    pub fn new(config: SyncClientConfig, opener: O) -> Self {
        Self::with_clock(config, opener, Arc::new(SystemClock::new()))
    }

    /// Create a client with an injected local clock
    pub fn with_clock(config: SyncClientConfig, opener: O, clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            clock_sync: ClockSynchronizer::new(config.clock_sync.clone()),
            buffer: SnapshotBuffer::new(config.max_buffered_snapshots),
            interpolator: SnapshotInterpolator::new(config.interpolation.clone()),
            config,
            opener,
            clock,
            state: ConnectionState::Disconnected,
            socket: None,
            transport_rx: None,
            pending_blobs: VecDeque::new(),
            corrections: HashMap::new(),
            predicted: HashMap::new(),
            roster: Roster::new(),
            events: EventBus::new(),
            stats: ClientStats::default(),
        }
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Open the transport
    ///
    /// No-op unless Disconnected. If this future is dropped before it
    /// resolves the state stays Connecting until [`disconnect`](Self::disconnect).
    #[instrument(name = "sync_client_connect", skip(self), fields(url = %self.config.dial.url))]
    pub async fn connect(&mut self) -> Result<(), SyncError> {
        if self.state != ConnectionState::Disconnected {
            debug!(state = %self.state, "connect ignored");
            return Ok(());
        }

        self.apply(ConnectionEvent::ConnectRequested);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.transport_rx = Some(events_rx);

        match self.opener.open(&self.config.dial, events_tx).await {
            Ok(mut socket) => {
                socket.set_binary_type(self.config.dial.binary_type);
                self.socket = Some(socket);
                self.apply(ConnectionEvent::Opened);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to open transport");
                self.transport_rx = None;
                self.apply(ConnectionEvent::Failed);
                Err(err.into())
            }
        }
    }

    /// Close the transport and drop all transient state
    ///
    /// Clears pending snapshots, forced corrections, predicted states and
    /// interpolation histories. The roster and clock offset survive. Safe to
    /// call in any state.
    #[instrument(name = "sync_client_disconnect", skip(self))]
    pub fn disconnect(&mut self, code: Option<u16>, reason: Option<&str>) {
        if let Some(mut socket) = self.socket.take() {
            socket.close(code, reason);
        }
        self.transport_rx = None;
        self.pending_blobs.clear();
        self.buffer.clear();
        self.corrections.clear();
        self.predicted.clear();
        self.interpolator.clear();
        observability::record_buffer_depth(0);

        self.set_state(ConnectionState::Disconnected);
    }

    /// Current connection state, after draining transport events
    pub fn connection_status(&mut self) -> ConnectionState {
        self.poll_transport();
        self.state
    }

    // ========================================================================
    // Ingress
    // ========================================================================

    /// Process every transport event received so far
    ///
    /// Also completes finished blob reads. Returns the number of transport
    /// events handled.
    pub fn poll_transport(&mut self) -> usize {
        let mut handled = 0;

        while let Some(rx) = self.transport_rx.as_mut() {
            match rx.try_recv() {
                Ok(event) => {
                    handled += 1;
                    self.handle_transport_event(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.transport_rx = None;
                    if self.state != ConnectionState::Disconnected {
                        warn!("transport event channel closed");
                        self.socket = None;
                        self.apply(ConnectionEvent::Closed);
                    }
                }
            }
        }

        self.poll_blobs();
        handled
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                self.apply(ConnectionEvent::Opened);
            }
            TransportEvent::Close { code, reason } => {
                info!(?code, %reason, "transport closed");
                self.socket = None;
                self.transport_rx = None;
                self.apply(ConnectionEvent::Closed);
            }
            TransportEvent::Error { message } => {
                warn!(%message, "transport error");
                if let Some(mut socket) = self.socket.take() {
                    socket.close(None, Some("transport error"));
                }
                self.transport_rx = None;
                self.apply(ConnectionEvent::Failed);
            }
            TransportEvent::Message(payload) => self.handle_payload(payload),
        }
    }

    fn handle_payload(&mut self, payload: Payload) {
        match payload {
            Payload::Text(text) => self.handle_text(&text),
            Payload::Binary(bytes) => self.handle_binary(&bytes, SOURCE_BINARY),
            Payload::Blob(read) => self.pending_blobs.push_back(read),
        }
    }

    fn handle_text(&mut self, text: &str) {
        match parse_text_message(text) {
            Ok(TextMessage::TimeSync(message)) => {
                self.stats.time_sync_messages += 1;
                match self.clock_sync.handle_message(&message, self.clock.now_ms()) {
                    Ok(sample) => {
                        observability::record_clock_sample(sample.offset_ms, sample.round_trip_ms)
                    }
                    Err(err) => warn!(error = %err, "rejected time sync message"),
                }
            }
            Ok(TextMessage::WorldSnapshot(snapshot)) => self.enqueue(snapshot, SOURCE_JSON),
            Err(reason) => {
                self.stats.unrecognized_messages += 1;
                observability::record_unrecognized_message();
                debug!(%reason, len = text.len(), "ignoring text message");
            }
        }
    }

    fn handle_binary(&mut self, bytes: &[u8], source: &'static str) {
        match decode_world_snapshot(bytes) {
            Ok(snapshot) => self.enqueue(snapshot, source),
            Err(err) => {
                self.stats.decode_failures += 1;
                observability::record_decode_failure(source);
                warn!(error = %err, len = bytes.len(), source, "dropping undecodable snapshot");
            }
        }
    }

    fn poll_blobs(&mut self) {
        if self.pending_blobs.is_empty() {
            return;
        }

        for mut read in std::mem::take(&mut self.pending_blobs) {
            match read.try_recv() {
                Ok(Ok(bytes)) => self.handle_binary(&bytes, SOURCE_BLOB),
                Ok(Err(err)) => {
                    self.stats.decode_failures += 1;
                    observability::record_decode_failure(SOURCE_BLOB);
                    warn!(error = %err, "blob read failed");
                }
                Err(oneshot::error::TryRecvError::Empty) => self.pending_blobs.push_back(read),
                Err(oneshot::error::TryRecvError::Closed) => {
                    debug!("blob read abandoned by transport");
                }
            }
        }
    }

    // ========================================================================
    // Buffered playback
    // ========================================================================

    /// Buffer a decoded snapshot, then release whatever is due
    pub fn queue_snapshot(&mut self, snapshot: WorldSnapshot) {
        self.enqueue(snapshot, SOURCE_DIRECT);
    }

    fn enqueue(&mut self, snapshot: WorldSnapshot, source: &'static str) {
        self.stats.snapshots_received += 1;
        observability::record_snapshot_received(source);
        trace!(
            tick_id = snapshot.tick_id,
            captured_at_ms = snapshot.captured_at_ms,
            entities = snapshot.entities.len(),
            source,
            "snapshot queued"
        );

        let pending = PendingSnapshot {
            snapshot,
            received_at_ms: self.clock.now_ms(),
        };
        if let Some(evicted) = self.buffer.push(pending) {
            observability::record_snapshot_evicted();
            debug!(
                tick_id = evicted.snapshot.tick_id,
                captured_at_ms = evicted.snapshot.captured_at_ms,
                "pending buffer full, dropped oldest snapshot"
            );
        }

        let now_ms = self.authoritative_now();
        self.drain(now_ms);
        observability::record_buffer_depth(self.buffer.len());
    }

    /// Release every pending snapshot captured at or before
    /// `now_ms - reconciliation_delay_ms`
    fn drain(&mut self, now_ms: f64) {
        let cutoff_ms = now_ms - self.config.reconciliation_delay_ms;
        let released = self.buffer.drain_until(cutoff_ms);
        if released.is_empty() {
            return;
        }

        for pending in released {
            self.ingest(pending);
        }
        observability::record_playback_buffer_ms(self.interpolator.buffer_ms());
    }

    #[instrument(
        level = "trace",
        name = "sync_client_ingest",
        skip(self, pending),
        fields(
            tick_id = pending.snapshot.tick_id,
            captured_at_ms = pending.snapshot.captured_at_ms
        )
    )]
    fn ingest(&mut self, pending: PendingSnapshot) {
        let PendingSnapshot {
            snapshot,
            received_at_ms,
        } = pending;
        let mut delta = RosterDelta::default();

        for entity in &snapshot.entities {
            if entity.entity_id.is_empty() {
                continue;
            }

            let sample = entity.resolve(&snapshot);
            if sample.keyframe {
                self.check_divergence(&entity.entity_id, &sample);
            }
            self.interpolator
                .enqueue(&entity.entity_id, sample, received_at_ms);

            if let Some(active) = entity.active {
                delta.apply(&mut self.roster, &entity.entity_id, active);
            }
        }

        self.stats.snapshots_ingested += 1;
        observability::record_snapshot_ingested(snapshot.entities.len());

        if let Some(change) = delta.finish(&self.roster) {
            info!(
                joined = ?change.joined,
                left = ?change.left,
                size = change.entity_ids.len(),
                "roster changed"
            );
            observability::record_roster_size(self.roster.len());
            self.events.emit(SyncEvent::RosterChanged(change));
        }
    }

    fn check_divergence(&mut self, entity_id: &str, authoritative: &InterpolatedState) {
        let Some(predicted) = self.predicted.get(entity_id) else {
            return;
        };

        let divergence = Divergence::between(predicted, authoritative);
        if !divergence.exceeds(&self.config.correction) {
            trace!(
                entity_id,
                position_error = divergence.position_error,
                orientation_error = divergence.orientation_error,
                "keyframe within thresholds"
            );
            return;
        }

        let correction = ForcedCorrection::new(*authoritative, self.config.reconciliation_delay_ms);
        self.corrections.insert(entity_id.to_owned(), correction);
        self.predicted.insert(entity_id.to_owned(), *authoritative);
        self.stats.corrections_applied += 1;

        let event = CorrectionEvent {
            entity_id: entity_id.to_owned(),
            position_error: divergence.position_error,
            orientation_error: divergence.orientation_error,
            tick_id: authoritative.tick_id,
        };
        info!(
            entity_id,
            position_error = event.position_error,
            orientation_error = event.orientation_error,
            tick_id = event.tick_id,
            expires_at_ms = correction.expires_at_ms,
            "forced correction applied"
        );
        observability::record_correction(&event);
        self.events.emit(SyncEvent::CorrectionApplied(event));
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Authoritative time derived from the local clock
    pub fn authoritative_now(&self) -> f64 {
        self.clock_sync.now(self.clock.now_ms())
    }

    /// Drain transport events and release due snapshots
    pub fn refresh(&mut self) {
        self.poll_transport();
        let now_ms = self.authoritative_now();
        self.drain(now_ms);
    }

    /// State of an entity at authoritative time `now_ms` (default: now)
    ///
    /// An unexpired forced correction is returned verbatim; otherwise the
    /// interpolator is sampled on the playback clock. `None` for entities
    /// never observed.
    #[instrument(level = "trace", name = "sync_client_get_entity_state", skip(self))]
    pub fn get_entity_state(
        &mut self,
        entity_id: &str,
        now_ms: Option<f64>,
    ) -> Option<InterpolatedState> {
        self.poll_transport();
        let now_ms = now_ms.unwrap_or_else(|| self.authoritative_now());
        self.drain(now_ms);

        if let Some(correction) = self.corrections.get(entity_id).copied() {
            if !correction.is_expired(now_ms) {
                self.predicted
                    .insert(entity_id.to_owned(), correction.state);
                return Some(correction.state);
            }
            self.corrections.remove(entity_id);
            debug!(entity_id, "forced correction expired");
        }

        let playback_ms = now_ms - self.config.reconciliation_delay_ms;
        let render_ms = playback_ms - self.interpolator.buffer_ms();
        let state = self.interpolator.sample(entity_id, render_ms)?;
        self.predicted.insert(entity_id.to_owned(), state);
        Some(state)
    }

    /// Recommended playback delay reported by the interpolator (ms)
    pub fn playback_buffer_ms(&mut self) -> f64 {
        self.refresh();
        self.interpolator.buffer_ms()
    }

    pub fn has_known_entity(&mut self, entity_id: &str) -> bool {
        self.refresh();
        self.roster.contains(entity_id)
    }

    /// Roster members in ascending order
    pub fn known_entity_ids(&mut self) -> Vec<String> {
        self.refresh();
        self.roster.ids()
    }

    /// Entities with interpolation history, sorted
    ///
    /// Unlike the roster this includes entities that never carried an
    /// `active` flag.
    pub fn observed_entity_ids(&mut self) -> Vec<String> {
        self.refresh();
        let mut ids: Vec<String> = self.interpolator.entity_ids().map(str::to_owned).collect();
        ids.sort_unstable();
        ids
    }

    // ========================================================================
    // Events & diagnostics
    // ========================================================================

    /// Register an event callback
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SyncEvent) + Send + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Channel receiving every subsequent event
    pub fn events(&mut self) -> mpsc::UnboundedReceiver<SyncEvent> {
        self.events.channel()
    }

    pub fn config(&self) -> &SyncClientConfig {
        &self.config
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    pub fn clock_sync(&self) -> &ClockSynchronizer {
        &self.clock_sync
    }

    // ========================================================================
    // State machine
    // ========================================================================

    fn apply(&mut self, event: ConnectionEvent) -> bool {
        match self.state.transition(event) {
            Some(next) => {
                self.set_state(next);
                true
            }
            None => {
                trace!(state = %self.state, ?event, "connection event ignored");
                false
            }
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if next == self.state {
            return;
        }
        let previous = std::mem::replace(&mut self.state, next);
        info!(%previous, current = %next, "connection state changed");
        observability::record_connection_state(next);
        self.events.emit(SyncEvent::ConnectionStatus {
            previous,
            current: next,
        });
    }
}
