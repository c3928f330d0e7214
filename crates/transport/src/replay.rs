//! Replay transport - 从录制文件回放消息流
//!
//! 读取 JSONL 录制文件（每行一个 `{"at_ms", "text" | "binary"}` 帧），
//! 按原始时间间隔把消息推送给客户端。

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    BinaryType, DialOptions, Payload, Socket, SocketOpener, TransportError, TransportEvent,
    TransportSender,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Close code sent once a non-looping replay finishes
const NORMAL_CLOSURE: u16 = 1000;

const BINARY_TYPE_BYTES: u8 = 0;
const BINARY_TYPE_BLOB: u8 = 1;

/// Replay 配置
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// 回放速度倍率 (1.0 = 原速)
    pub speed_multiplier: f64,

    /// 是否循环回放
    pub loop_playback: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            loop_playback: false,
        }
    }
}

/// 录制文件中的一帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// 相对录制开始的到达时间 (ms)
    pub at_ms: f64,

    /// 文本帧
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// 二进制帧（字节数组）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<Vec<u8>>,
}

impl RecordedFrame {
    pub fn text(at_ms: f64, text: impl Into<String>) -> Self {
        Self {
            at_ms,
            text: Some(text.into()),
            binary: None,
        }
    }

    pub fn binary(at_ms: f64, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            at_ms,
            text: None,
            binary: Some(bytes.into()),
        }
    }
}

/// 解析 JSONL 录制内容，按到达时间排序
///
/// 空行被跳过；既没有 `text` 也没有 `binary` 的帧被丢弃。
pub fn parse_recording(reader: impl BufRead) -> std::io::Result<Vec<RecordedFrame>> {
    let mut frames = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let frame: RecordedFrame = serde_json::from_str(line).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("line {}: {}", index + 1, e),
            )
        })?;

        if frame.text.is_none() && frame.binary.is_none() {
            warn!(line = index + 1, "recorded frame without payload");
            continue;
        }
        if !frame.at_ms.is_finite() {
            warn!(line = index + 1, "recorded frame without finite time");
            continue;
        }
        frames.push(frame);
    }

    // 按到达时间排序（稳定排序保留同时刻帧的录制顺序）
    frames.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
    Ok(frames)
}

/// 从文件加载录制
pub fn load_recording(path: &Path) -> std::io::Result<Vec<RecordedFrame>> {
    let file = File::open(path)?;
    let frames = parse_recording(BufReader::new(file))?;
    info!(path = %path.display(), frames = frames.len(), "Loaded recording");
    Ok(frames)
}

/// 写出 JSONL 录制文件
pub fn write_recording(path: &Path, frames: &[RecordedFrame]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for frame in frames {
        serde_json::to_writer(&mut writer, frame)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    info!(path = %path.display(), frames = frames.len(), "Wrote recording");
    Ok(())
}

/// Replay socket opener
///
/// 使用预加载的帧，或在 open 时从 `DialOptions::url` 指向的文件加载。
#[derive(Debug, Clone)]
pub struct ReplaySocketOpener {
    frames: Option<Arc<Vec<RecordedFrame>>>,
    config: ReplayConfig,
}

impl ReplaySocketOpener {
    /// 在 open 时从拨号 URL 加载录制
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            frames: None,
            config,
        }
    }

    /// 使用内存中的帧
    pub fn from_frames(frames: Vec<RecordedFrame>, config: ReplayConfig) -> Self {
        Self {
            frames: Some(Arc::new(frames)),
            config,
        }
    }
}

impl SocketOpener for ReplaySocketOpener {
    fn open(
        &self,
        dial: &DialOptions,
        events: TransportSender,
    ) -> impl std::future::Future<Output = Result<Box<dyn Socket>, TransportError>> + Send {
        let preloaded = self.frames.clone();
        let config = self.config.clone();
        let url = dial.url.clone();

        async move {
            let frames = match preloaded {
                Some(frames) => frames,
                None => {
                    let path = url.strip_prefix("file://").unwrap_or(&url).to_owned();
                    let loaded = tokio::task::spawn_blocking(move || load_recording(Path::new(&path)))
                        .await
                        .map_err(|e| TransportError::open_failed(&url, e.to_string()))?
                        .map_err(|e| TransportError::open_failed(&url, e.to_string()))?;
                    Arc::new(loaded)
                }
            };

            let stopped = Arc::new(AtomicBool::new(false));
            let binary_type = Arc::new(AtomicU8::new(BINARY_TYPE_BYTES));

            tokio::spawn(replay_frames(
                frames,
                config,
                events,
                Arc::clone(&stopped),
                Arc::clone(&binary_type),
            ));

            Ok(Box::new(ReplaySocket {
                stopped,
                binary_type,
            }) as Box<dyn Socket>)
        }
    }
}

/// 回放任务
async fn replay_frames(
    frames: Arc<Vec<RecordedFrame>>,
    config: ReplayConfig,
    events: TransportSender,
    stopped: Arc<AtomicBool>,
    binary_type: Arc<AtomicU8>,
) {
    let speed = config.speed_multiplier.max(0.1);

    loop {
        let Some(first) = frames.first() else {
            warn!("No frames to replay");
            break;
        };
        let first_at_ms = first.at_ms;
        let start = Instant::now();

        for frame in frames.iter() {
            // 计算等待时间
            let offset_ms = (frame.at_ms - first_at_ms) / speed;
            tokio::time::sleep_until(start + Duration::from_secs_f64(offset_ms / 1000.0)).await;

            if stopped.load(Ordering::Relaxed) {
                debug!("Replay stopped");
                return;
            }

            let mode = binary_type.load(Ordering::Relaxed);
            for payload in frame_payloads(frame, mode) {
                if events.send(TransportEvent::Message(payload)).is_err() {
                    debug!("Replay receiver dropped");
                    return;
                }
            }
        }

        if !config.loop_playback {
            info!(frames = frames.len(), "Replay completed");
            break;
        }
        debug!("Looping replay");
    }

    if !stopped.load(Ordering::Relaxed) {
        let _ = events.send(TransportEvent::Close {
            code: Some(NORMAL_CLOSURE),
            reason: "replay completed".to_string(),
        });
    }
}

fn frame_payloads(frame: &RecordedFrame, binary_type: u8) -> Vec<Payload> {
    let mut payloads = Vec::with_capacity(2);
    if let Some(text) = &frame.text {
        payloads.push(Payload::Text(text.clone()));
    }
    if let Some(binary) = &frame.binary {
        let bytes = Bytes::copy_from_slice(binary);
        if binary_type == BINARY_TYPE_BLOB {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(Ok(bytes));
            payloads.push(Payload::Blob(rx));
        } else {
            payloads.push(Payload::Binary(bytes));
        }
    }
    payloads
}

/// Replay socket
struct ReplaySocket {
    stopped: Arc<AtomicBool>,
    binary_type: Arc<AtomicU8>,
}

impl Socket for ReplaySocket {
    fn set_binary_type(&mut self, binary_type: BinaryType) {
        let mode = match binary_type {
            BinaryType::Bytes => BINARY_TYPE_BYTES,
            BinaryType::Blob => BINARY_TYPE_BLOB,
        };
        self.binary_type.store(mode, Ordering::Relaxed);
    }

    fn close(&mut self, code: Option<u16>, reason: Option<&str>) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!(?code, ?reason, "Replay socket closed");
        }
    }
}
