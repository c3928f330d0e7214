//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 二进制线格式兼容性
//! - 时钟同步收敛
//! - 模拟 e2e 测试（Mock / Replay 传输，无需服务端）
//! - 抖动与丢包场景下的速度跟踪

#[cfg(test)]
mod wire_tests {
    use contracts::{EntitySnapshot, Orientation, Vector3, WorldSnapshot};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use wire_codec::{
        decode_world_snapshot, encode_world_snapshot, parse_text_message, TextMessage,
    };

    /// WorldSnapshot { capturedAtMs: 100, tickId: 7, keyframe: true,
    ///   entities: [{ entityId: "alpha", position: { x: 1.5 }, active: true }] }
    const FIXTURE: &[u8] = &[
        0x10, 0x64, // captured_at_ms = 100
        0x30, 0x07, // tick_id = 7
        0x38, 0x01, // keyframe = true
        0x1a, 0x14, // entities, 20 bytes
        0x12, 0x05, b'a', b'l', b'p', b'h', b'a', // entity_id
        0x22, 0x09, 0x09, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xf8, 0x3f, // position.x = 1.5
        0x40, 0x01, // active = true
    ];

    #[test]
    fn test_decode_fixture() {
        let snapshot = decode_world_snapshot(FIXTURE).unwrap();

        assert_eq!(snapshot.captured_at_ms, 100);
        assert_eq!(snapshot.tick_id, 7);
        assert!(snapshot.keyframe);
        assert_eq!(snapshot.entities.len(), 1);

        let alpha = &snapshot.entities[0];
        assert_eq!(alpha.entity_id, "alpha");
        assert_eq!(alpha.position, Vector3::new(1.5, 0.0, 0.0));
        assert_eq!(alpha.orientation, Orientation::default());
        assert_eq!(alpha.active, Some(true));
    }

    #[test]
    fn test_fixture_survives_encoder() {
        let snapshot = decode_world_snapshot(FIXTURE).unwrap();
        let encoded = encode_world_snapshot(&snapshot);
        assert_eq!(decode_world_snapshot(&encoded).unwrap(), snapshot);
    }

    fn random_double(rng: &mut StdRng) -> f64 {
        match rng.random_range(0..5) {
            0 => 0.0,
            1 => -0.0,
            2 => f64::MAX,
            3 => -f64::MIN_POSITIVE,
            _ => rng.random_range(-1.0e6..1.0e6),
        }
    }

    fn random_snapshot(rng: &mut StdRng) -> WorldSnapshot {
        let entities = (0..rng.random_range(0..6))
            .map(|i| {
                let mut entity = EntitySnapshot::new(
                    format!("entity-{i}"),
                    Vector3::new(random_double(rng), random_double(rng), random_double(rng)),
                    Orientation::new(random_double(rng), random_double(rng), random_double(rng)),
                );
                if rng.random_bool(0.5) {
                    entity.tick_id = Some(rng.random());
                }
                if rng.random_bool(0.5) {
                    entity.captured_at_ms = Some(rng.random_range(-1_000_000..1_000_000));
                }
                if rng.random_bool(0.5) {
                    entity.keyframe = Some(rng.random_bool(0.5));
                }
                if rng.random_bool(0.5) {
                    entity.active = Some(rng.random_bool(0.5));
                }
                entity
            })
            .collect();

        WorldSnapshot {
            tick_id: match rng.random_range(0..3) {
                0 => 0,
                1 => u64::MAX,
                _ => rng.random(),
            },
            captured_at_ms: match rng.random_range(0..4) {
                0 => 0,
                1 => i64::MIN,
                2 => -rng.random_range(1..1_000_000_000_000),
                _ => rng.random_range(0..i64::MAX),
            },
            keyframe: rng.random_bool(0.5),
            entities,
        }
    }

    fn double_bits(snapshot: &WorldSnapshot) -> Vec<u64> {
        snapshot
            .entities
            .iter()
            .flat_map(|e| {
                let (p, o) = (e.position, e.orientation);
                [p.x, p.y, p.z, o.yaw_deg, o.pitch_deg, o.roll_deg]
            })
            .map(f64::to_bits)
            .collect()
    }

    #[test]
    fn test_random_snapshots_round_trip() {
        let mut rng = StdRng::seed_from_u64(2024);

        for _ in 0..500 {
            let snapshot = random_snapshot(&mut rng);
            let bytes = encode_world_snapshot(&snapshot);
            let decoded = decode_world_snapshot(&bytes).unwrap();

            assert_eq!(decoded, snapshot);
            assert_eq!(double_bits(&decoded), double_bits(&snapshot));
            // decoded bytes re-encode to the same wire form
            assert_eq!(encode_world_snapshot(&decoded), bytes);
        }
    }

    #[test]
    fn test_json_and_binary_agree() {
        let json = r#"{"type":"world_snapshot","tickId":7,"capturedAtMs":100,"keyframe":true,
            "entities":[{"entityId":"alpha","position":{"x":1.5},"active":true}]}"#;

        let Ok(TextMessage::WorldSnapshot(from_json)) = parse_text_message(json) else {
            panic!("expected world snapshot");
        };
        assert_eq!(from_json, decode_world_snapshot(FIXTURE).unwrap());
    }
}

#[cfg(test)]
mod clock_tests {
    use contracts::{ClockSyncConfig, TimeSyncMessage};
    use sync_engine::ClockSynchronizer;

    fn reply(server_ms: f64, sent_ms: Option<f64>) -> TimeSyncMessage {
        TimeSyncMessage {
            client_send_timestamp_ms: sent_ms,
            ..TimeSyncMessage::new(server_ms)
        }
    }

    /// Symmetric 40ms round trips with ±8ms server-side jitter around a
    /// true offset of 500ms
    #[test]
    fn test_offset_converges_under_jitter() {
        let mut clock = ClockSynchronizer::new(ClockSyncConfig::default());

        for i in 0..100 {
            let sent = i as f64 * 1_000.0;
            let received = sent + 40.0;
            let jitter = if i % 2 == 0 { 8.0 } else { -8.0 };
            let server = sent + 20.0 + 500.0 + jitter;
            clock.handle_message(&reply(server, Some(sent)), received).unwrap();
        }

        assert!((clock.offset_ms() - 500.0).abs() < 8.0, "offset {}", clock.offset_ms());
        assert_eq!(clock.last_round_trip_ms(), Some(40.0));
        assert!((clock.now(10_000.0) - (10_000.0 + clock.offset_ms())).abs() < 1e-9);
    }

    #[test]
    fn test_offset_step_is_bounded() {
        let config = ClockSyncConfig::default();
        let mut clock = ClockSynchronizer::new(config.clone());

        clock.handle_message(&reply(1_000.0, None), 1_000.0).unwrap();
        assert_eq!(clock.offset_ms(), 0.0);

        // the server jumps ten seconds ahead
        clock.handle_message(&reply(12_000.0, None), 2_000.0).unwrap();
        assert!(clock.offset_ms() <= config.max_step_ms);
        assert!(clock.offset_ms() > 0.0);
    }
}

#[cfg(test)]
mod buffer_tests {
    use contracts::{PendingSnapshot, WorldSnapshot};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use sync_engine::SnapshotBuffer;

    fn pending(captured_at_ms: i64) -> PendingSnapshot {
        PendingSnapshot {
            snapshot: WorldSnapshot {
                tick_id: captured_at_ms as u64,
                captured_at_ms,
                ..Default::default()
            },
            received_at_ms: 0.0,
        }
    }

    #[test]
    fn test_shuffled_delivery_drains_in_capture_order() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..20 {
            let mut captures: Vec<i64> = (0..40).map(|i| i * 50).collect();
            captures.shuffle(&mut rng);

            let mut buffer = SnapshotBuffer::new(64);
            for captured_at_ms in &captures {
                assert!(buffer.push(pending(*captured_at_ms)).is_none());
            }

            let mut drained = buffer.drain_until(1_000.0);
            drained.extend(buffer.drain_until(f64::MAX));
            assert_eq!(drained.len(), 40);
            assert!(drained
                .windows(2)
                .all(|w| w[0].snapshot.captured_at_ms <= w[1].snapshot.captured_at_ms));
        }
    }

    #[test]
    fn test_overflow_evicts_smallest_capture() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut captures: Vec<i64> = (0..20).map(|i| i * 10).collect();
        captures.shuffle(&mut rng);

        let mut buffer = SnapshotBuffer::new(8);
        let mut evicted = Vec::new();
        for captured_at_ms in captures {
            if let Some(old) = buffer.push(pending(captured_at_ms)) {
                evicted.push(old.snapshot.captured_at_ms);
            }
            assert!(buffer.len() <= 8);
        }

        let kept: Vec<i64> = buffer.iter().map(|p| p.snapshot.captured_at_ms).collect();
        let min_kept = kept.iter().copied().min().unwrap();
        assert_eq!(evicted.len(), 12);
        assert!(evicted.iter().all(|e| *e <= min_kept));
        assert_eq!(buffer.stats().dropped_count, 12);
    }
}

#[cfg(test)]
mod client_tests {
    use std::sync::{Arc, Mutex};

    use contracts::{
        EntitySnapshot, ManualClock, Orientation, SyncClientConfig, Vector3, WorldSnapshot,
    };
    use sync_client::{ConnectionState, SyncClient, SyncEvent};
    use transport::MockSocketOpener;
    use wire_codec::encode_world_snapshot;

    fn client(
        delay_ms: f64,
        opener: MockSocketOpener,
    ) -> (SyncClient<MockSocketOpener>, ManualClock) {
        let config = SyncClientConfig {
            reconciliation_delay_ms: delay_ms,
            ..Default::default()
        };
        let clock = ManualClock::new(0.0);
        let client = SyncClient::with_clock(config, opener, Arc::new(clock.clone()));
        (client, clock)
    }

    fn snapshot(tick_id: u64, captured_at_ms: i64, x: f64) -> WorldSnapshot {
        WorldSnapshot {
            tick_id,
            captured_at_ms,
            keyframe: false,
            entities: vec![EntitySnapshot::new(
                "alpha",
                Vector3::new(x, 0.0, 0.0),
                Orientation::default(),
            )],
        }
    }

    #[tokio::test]
    async fn test_delivery_is_held_for_reconciliation_delay() {
        let opener = MockSocketOpener::new();
        let handle = opener.handle();
        let (mut client, clock) = client(300.0, opener);
        client.connect().await.unwrap();

        clock.set(250.0);
        assert!(client.get_entity_state("alpha", None).is_none());

        handle.send_binary(encode_world_snapshot(&snapshot(1, 100, 0.0)));
        handle.send_binary(encode_world_snapshot(&snapshot(2, 150, 1.0)));
        clock.set(251.0);
        assert!(client.get_entity_state("alpha", None).is_none());

        clock.set(600.0);
        let state = client.get_entity_state("alpha", None).unwrap();
        assert!((state.position.x - 1.0).abs() < 1e-9);
        assert_eq!(client.stats().snapshots_ingested, 2);
    }

    #[tokio::test]
    async fn test_roster_over_json() {
        let opener = MockSocketOpener::new();
        let handle = opener.handle();
        let (mut client, clock) = client(100.0, opener);
        client.connect().await.unwrap();

        handle.send_text(
            r#"{"type":"world_snapshot","tickId":1,"capturedAtMs":0,
                "entities":[{"entityId":"alpha","position":{"x":0},"active":true}]}"#,
        );
        clock.set(100.0);
        assert!(client.has_known_entity("alpha"));
        assert_eq!(client.known_entity_ids(), vec!["alpha".to_string()]);

        handle.send_text(
            r#"{"type":"world_snapshot","tickId":2,"capturedAtMs":50,
                "entities":[{"entityId":"alpha","position":{"x":1},"active":false}]}"#,
        );
        clock.set(150.0);
        assert!(!client.has_known_entity("alpha"));
        assert!(client.known_entity_ids().is_empty());
        // leaving the roster does not discard the last sampled state
        let last = client.get_entity_state("alpha", Some(2_000.0)).unwrap();
        assert_eq!(last.position.x, 1.0);
    }

    #[tokio::test]
    async fn test_keyframe_correction_event() {
        let opener = MockSocketOpener::new();
        let handle = opener.handle();
        let (mut client, clock) = client(100.0, opener);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        client.connect().await.unwrap();

        handle.send_binary(encode_world_snapshot(&snapshot(1, 0, 0.0)));
        clock.set(400.0);
        assert_eq!(client.get_entity_state("alpha", None).unwrap().position.x, 0.0);

        let mut keyframe = snapshot(2, 500, 3.0);
        keyframe.keyframe = true;
        handle.send_binary(encode_world_snapshot(&keyframe));
        // pinned through capture + delay, interpolated afterwards
        clock.set(600.0);
        assert_eq!(client.get_entity_state("alpha", None).unwrap().position.x, 3.0);
        clock.set(600.5);
        let interpolated = client.get_entity_state("alpha", None).unwrap();
        assert!(interpolated.position.x > 0.0 && interpolated.position.x < 3.0);

        let corrections = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|event| matches!(event, SyncEvent::CorrectionApplied(_)))
            .count();
        assert_eq!(corrections, 1);
    }

    #[tokio::test]
    async fn test_connection_lifecycle() {
        let opener = MockSocketOpener::new();
        let handle = opener.handle();
        let (mut client, clock) = client(100.0, opener);
        let mut events = client.events();

        assert_eq!(client.connection_status(), ConnectionState::Disconnected);
        client.connect().await.unwrap();
        assert_eq!(client.connection_status(), ConnectionState::Connected);

        let mut join = snapshot(1, 0, 0.0);
        join.entities[0].active = Some(true);
        handle.send_binary(encode_world_snapshot(&join));
        handle.close(Some(1001), "going away");

        assert_eq!(client.connection_status(), ConnectionState::Disconnected);
        clock.set(500.0);
        // buffered data survives a remote close
        assert!(client.get_entity_state("alpha", None).is_some());

        client.connect().await.unwrap();
        assert_eq!(client.connection_status(), ConnectionState::Connected);
        assert_eq!(handle.open_count(), 2);

        client.disconnect(Some(1000), Some("bye"));
        assert_eq!(client.connection_status(), ConnectionState::Disconnected);
        assert!(client.get_entity_state("alpha", None).is_none());
        assert!(client.has_known_entity("alpha"));

        let mut transitions = Vec::new();
        let mut joins = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                SyncEvent::ConnectionStatus { current, .. } => transitions.push(current),
                SyncEvent::RosterChanged(change) => joins += change.joined.len(),
                _ => {}
            }
        }
        assert_eq!(
            transitions,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
            ]
        );
        assert_eq!(joins, 1);
    }
}

#[cfg(test)]
mod jitter_tests {
    use std::sync::Arc;

    use contracts::{
        EntitySnapshot, ManualClock, Orientation, SyncClientConfig, Vector3, WorldSnapshot,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use sync_client::SyncClient;
    use transport::MockSocketOpener;

    const VELOCITY: f64 = 0.04;
    const STEP_MS: f64 = 16.0;

    /// 200 snapshots at 50ms spacing, 2% loss, 60-100ms latency, rendered
    /// every 16ms; returns the velocity errors between successive samples
    fn velocity_errors(seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut arrivals = Vec::new();

        for i in 0..200u64 {
            let captured_at_ms = i as i64 * 50;
            if rng.random::<f64>() < 0.02 {
                continue;
            }
            let latency = rng.random_range(60.0..=100.0);
            let snapshot = WorldSnapshot {
                tick_id: i,
                captured_at_ms,
                keyframe: false,
                entities: vec![EntitySnapshot::new(
                    "probe",
                    Vector3::new(VELOCITY * captured_at_ms as f64, 0.0, 0.0),
                    Orientation::default(),
                )],
            };
            arrivals.push((captured_at_ms as f64 + latency, snapshot));
        }
        arrivals.sort_by(|a, b| a.0.total_cmp(&b.0));
        let end_ms = arrivals.last().map_or(0.0, |(at, _)| *at);

        let config = SyncClientConfig {
            reconciliation_delay_ms: 150.0,
            ..Default::default()
        };
        let clock = ManualClock::new(0.0);
        let mut client =
            SyncClient::with_clock(config, MockSocketOpener::new(), Arc::new(clock.clone()));

        let mut pending = arrivals.into_iter().peekable();
        let mut previous: Option<(f64, f64)> = None;
        let mut errors = Vec::new();
        let mut now_ms = 0.0;

        while now_ms <= end_ms {
            while pending.peek().is_some_and(|(at, _)| *at <= now_ms) {
                if let Some((at, snapshot)) = pending.next() {
                    clock.set(at);
                    client.queue_snapshot(snapshot);
                }
            }
            clock.set(now_ms);

            if let Some(state) = client.get_entity_state("probe", None) {
                if let Some((t, x)) = previous {
                    let velocity = (state.position.x - x) / (now_ms - t);
                    errors.push((velocity - VELOCITY).abs());
                }
                previous = Some((now_ms, state.position.x));
            }
            now_ms += STEP_MS;
        }

        errors
    }

    fn p95(mut values: Vec<f64>) -> f64 {
        values.sort_by(f64::total_cmp);
        let rank = (0.95 * values.len() as f64).ceil() as usize;
        values[rank.clamp(1, values.len()) - 1]
    }

    #[test]
    fn test_velocity_tracks_truth_under_jitter_and_loss() {
        for seed in [1, 7, 42] {
            let errors = velocity_errors(seed);
            assert!(errors.len() > 400, "seed {}: {} samples", seed, errors.len());

            let p95 = p95(errors);
            assert!(p95 <= 0.07, "seed {}: p95 velocity error {}", seed, p95);
        }
    }
}

#[cfg(test)]
mod replay_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{EntitySnapshot, ManualClock, Orientation, Vector3, WorldSnapshot};
    use sync_client::{ConnectionState, SyncClient};
    use transport::{write_recording, RecordedFrame, ReplayConfig, ReplaySocketOpener};

    fn frame(tick_id: u64, captured_at_ms: i64, x: f64) -> RecordedFrame {
        let snapshot = WorldSnapshot {
            tick_id,
            captured_at_ms,
            keyframe: false,
            entities: vec![EntitySnapshot::new(
                "alpha",
                Vector3::new(x, 0.0, 0.0),
                Orientation::default(),
            )],
        };
        RecordedFrame::binary(
            captured_at_ms as f64,
            wire_codec::encode_world_snapshot(&snapshot).to_vec(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_replays_through_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");

        let mut frames: Vec<_> = (0..5).map(|i| frame(i, i as i64 * 50, i as f64)).collect();
        frames.insert(
            2,
            RecordedFrame::text(60.0, r#"{"type":"time_sync","server_timestamp_ms":0}"#),
        );
        write_recording(&path, &frames).unwrap();

        let mut config = ConfigLoader::load_from_str(
            r#"
            reconciliation_delay_ms = 100.0

            [dial]
            url = "ws://placeholder"
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();
        config.dial.url = format!("file://{}", path.display());

        let clock = ManualClock::new(0.0);
        let mut client = SyncClient::with_clock(
            config,
            ReplaySocketOpener::new(ReplayConfig::default()),
            Arc::new(clock.clone()),
        );
        client.connect().await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(client.connection_status(), ConnectionState::Disconnected);
        assert_eq!(client.stats().time_sync_messages, 1);

        // the time sync seeded the offset at local 0
        clock.set(10_000.0);
        let state = client.get_entity_state("alpha", None).unwrap();
        assert_eq!(state.position.x, 4.0);
        assert_eq!(client.stats().snapshots_ingested, 5);
    }
}
