//! Parquet-backed market recorder

use super::parquet::ParquetWriter;
use super::{MarketRecorder, QuoteObservation};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Configuration for observation recording
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Output directory for Parquet files
    pub output_dir: PathBuf,
    /// Rotation interval in seconds
    pub rotation_interval_secs: u64,
    /// Buffer size before flushing
    pub buffer_size: usize,
    /// Maximum time between flushes
    pub flush_interval_secs: u64,
    /// Channel capacity; observations beyond it are dropped, never awaited
    pub channel_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./data"),
            rotation_interval_secs: 3600, // 1 hour
            buffer_size: 1000,
            flush_interval_secs: 60,
            channel_capacity: 10_000,
        }
    }
}

/// Recording statistics
#[derive(Debug, Default, Clone)]
pub struct RecorderStats {
    pub observations_received: u64,
    pub observations_written: u64,
    pub files_written: u64,
    pub last_flush: Option<chrono::DateTime<Utc>>,
}

/// Records quote observations to rotated Parquet files
///
/// `record` only enqueues; a background task buffers and writes, so the
/// refresh loop never waits on disk I/O.
pub struct ParquetRecorder {
    config: RecorderConfig,
    tx: mpsc::Sender<QuoteObservation>,
    stats: Arc<RwLock<RecorderStats>>,
}

impl ParquetRecorder {
    /// Create a recorder and spawn its writer task
    pub fn new(config: RecorderConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let stats = Arc::new(RwLock::new(RecorderStats::default()));

        let writer = ParquetWriter::new(config.output_dir.clone(), config.rotation_interval_secs);
        let writer_stats = stats.clone();
        let writer_config = config.clone();
        tokio::spawn(async move {
            Self::run_writer(rx, writer, writer_config, writer_stats).await;
        });

        Self { config, tx, stats }
    }

    /// Create a recorder with default config
    pub fn with_output_dir(output_dir: PathBuf) -> Self {
        Self::new(RecorderConfig {
            output_dir,
            ..Default::default()
        })
    }

    /// Run the writer task
    async fn run_writer(
        mut rx: mpsc::Receiver<QuoteObservation>,
        mut writer: ParquetWriter,
        config: RecorderConfig,
        stats: Arc<RwLock<RecorderStats>>,
    ) {
        let mut buffer: Vec<QuoteObservation> = Vec::with_capacity(config.buffer_size);
        let mut last_flush = Utc::now();
        let flush_interval = Duration::seconds(config.flush_interval_secs as i64);

        loop {
            let timeout = tokio::time::Duration::from_secs(config.flush_interval_secs);

            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Some(observation) => {
                            stats.write().await.observations_received += 1;
                            buffer.push(observation);

                            if buffer.len() >= config.buffer_size {
                                Self::flush(&mut buffer, &mut writer, &stats).await;
                                last_flush = Utc::now();
                            }
                        }
                        None => {
                            // Channel closed, flush remaining and exit
                            Self::flush(&mut buffer, &mut writer, &stats).await;
                            tracing::info!("Observation writer shutting down");
                            break;
                        }
                    }
                }

                _ = tokio::time::sleep(timeout) => {
                    let now = Utc::now();
                    if now - last_flush >= flush_interval && !buffer.is_empty() {
                        Self::flush(&mut buffer, &mut writer, &stats).await;
                        last_flush = now;
                    }
                }
            }
        }
    }

    /// Flush buffered observations to disk
    async fn flush(
        buffer: &mut Vec<QuoteObservation>,
        writer: &mut ParquetWriter,
        stats: &Arc<RwLock<RecorderStats>>,
    ) {
        if buffer.is_empty() {
            return;
        }

        let now = Utc::now();
        if writer.needs_rotation(now) {
            writer.mark_rotation(now);
        }

        let path = writer.file_path("quotes", now);
        let count = buffer.len();

        match writer.write_observations(&path, buffer) {
            Ok(()) => {
                let mut s = stats.write().await;
                s.observations_written += count as u64;
                s.files_written += 1;
                s.last_flush = Some(now);
                tracing::debug!(count, path = ?path, "Flushed quote observations");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to write quote observations");
            }
        }

        buffer.clear();
    }

    /// Get output directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.config.output_dir
    }

    /// Get current statistics
    pub async fn stats(&self) -> RecorderStats {
        self.stats.read().await.clone()
    }
}

#[async_trait]
impl MarketRecorder for ParquetRecorder {
    async fn record(&self, observation: QuoteObservation) -> anyhow::Result<()> {
        self.tx
            .try_send(observation)
            .map_err(|e| anyhow::anyhow!("Failed to enqueue observation: {}", e))
    }
}
