//! Parquet file writer with rotation

use super::QuoteObservation;
use crate::provider::Quote;
use arrow::array::{Array, ArrayRef, StringArray, TimestampMicrosecondArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Duration, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

fn utc_micros() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// Quote observation schema
///
/// Prices are stored as strings to keep Decimal precision.
pub fn observation_schema() -> Schema {
    Schema::new(vec![
        Field::new("ts_recv", utc_micros(), false),
        Field::new("ts_feed", utc_micros(), false),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("last", DataType::Utf8, false),
        Field::new("bid", DataType::Utf8, false),
        Field::new("ask", DataType::Utf8, false),
        Field::new("volume", DataType::UInt64, false),
        Field::new("source", DataType::Utf8, false),
    ])
}

/// Parquet file writer with time-based rotation
pub struct ParquetWriter {
    output_dir: PathBuf,
    rotation_interval: Duration,
    current_file_start: Option<DateTime<Utc>>,
}

impl ParquetWriter {
    /// Create a new Parquet writer
    pub fn new(output_dir: PathBuf, rotation_interval_secs: u64) -> Self {
        Self {
            output_dir,
            rotation_interval: Duration::seconds(rotation_interval_secs as i64),
            current_file_start: None,
        }
    }

    /// Ensure output directory exists
    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Check if rotation is needed based on current time
    pub fn needs_rotation(&self, now: DateTime<Utc>) -> bool {
        match self.current_file_start {
            None => true,
            Some(start) => now - start >= self.rotation_interval,
        }
    }

    /// Update rotation timestamp
    pub fn mark_rotation(&mut self, timestamp: DateTime<Utc>) {
        self.current_file_start = Some(timestamp);
    }

    /// File path for a flush at `timestamp`
    ///
    /// Every flush gets its own file; the rotation window is encoded in the
    /// directory-level prefix so files from one window sort together.
    pub fn file_path(&self, prefix: &str, timestamp: DateTime<Utc>) -> PathBuf {
        let window = self.current_file_start.unwrap_or(timestamp);
        let filename = format!(
            "{}_{}_{}.parquet",
            prefix,
            window.format("%Y%m%d_%H%M%S"),
            timestamp.format("%H%M%S%6f")
        );
        self.output_dir.join(filename)
    }

    /// Write quote observations to a Parquet file
    pub fn write_observations(
        &self,
        path: &Path,
        observations: &[QuoteObservation],
    ) -> anyhow::Result<()> {
        if observations.is_empty() {
            return Ok(());
        }

        self.ensure_dir()?;

        let schema = Arc::new(observation_schema());
        let file = File::create(path)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        let ts_recv: Vec<i64> = observations
            .iter()
            .map(|o| o.ts_recv.timestamp_micros())
            .collect();
        let ts_feed: Vec<i64> = observations
            .iter()
            .map(|o| o.ts_feed.timestamp_micros())
            .collect();
        let symbols: Vec<&str> = observations.iter().map(|o| o.symbol.as_str()).collect();
        let last: Vec<String> = observations.iter().map(|o| o.quote.last.to_string()).collect();
        let bid: Vec<String> = observations.iter().map(|o| o.quote.bid.to_string()).collect();
        let ask: Vec<String> = observations.iter().map(|o| o.quote.ask.to_string()).collect();
        let volume: Vec<u64> = observations.iter().map(|o| o.quote.volume).collect();
        let sources: Vec<&str> = observations.iter().map(|o| o.source.as_str()).collect();

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(TimestampMicrosecondArray::from(ts_recv).with_timezone("UTC")) as ArrayRef,
                Arc::new(TimestampMicrosecondArray::from(ts_feed).with_timezone("UTC")) as ArrayRef,
                Arc::new(StringArray::from(symbols)) as ArrayRef,
                Arc::new(StringArray::from_iter_values(last.iter())) as ArrayRef,
                Arc::new(StringArray::from_iter_values(bid.iter())) as ArrayRef,
                Arc::new(StringArray::from_iter_values(ask.iter())) as ArrayRef,
                Arc::new(UInt64Array::from(volume)) as ArrayRef,
                Arc::new(StringArray::from(sources)) as ArrayRef,
            ],
        )?;

        writer.write(&batch)?;
        writer.close()?;

        tracing::debug!(path = ?path, count = observations.len(), "Wrote quote observations to Parquet");

        Ok(())
    }
}

/// Reader for observation Parquet files
pub struct ParquetReader {
    path: PathBuf,
}

impl ParquetReader {
    /// Create a new reader for a Parquet file
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read quote observations from a Parquet file
    pub fn read_observations(&self) -> anyhow::Result<Vec<QuoteObservation>> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut observations = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;

            let ts_recv = column::<TimestampMicrosecondArray>(&batch, 0, "ts_recv")?;
            let ts_feed = column::<TimestampMicrosecondArray>(&batch, 1, "ts_feed")?;
            let symbols = column::<StringArray>(&batch, 2, "symbol")?;
            let last = column::<StringArray>(&batch, 3, "last")?;
            let bid = column::<StringArray>(&batch, 4, "bid")?;
            let ask = column::<StringArray>(&batch, 5, "ask")?;
            let volume = column::<UInt64Array>(&batch, 6, "volume")?;
            let sources = column::<StringArray>(&batch, 7, "source")?;

            for i in 0..batch.num_rows() {
                let recv = DateTime::from_timestamp_micros(ts_recv.value(i))
                    .ok_or_else(|| anyhow::anyhow!("Invalid ts_recv"))?;
                let feed = DateTime::from_timestamp_micros(ts_feed.value(i))
                    .ok_or_else(|| anyhow::anyhow!("Invalid ts_feed"))?;
                let symbol = symbols.value(i).to_string();

                observations.push(QuoteObservation {
                    symbol: symbol.clone(),
                    quote: Quote {
                        symbol,
                        last: Decimal::from_str(last.value(i))?,
                        bid: Decimal::from_str(bid.value(i))?,
                        ask: Decimal::from_str(ask.value(i))?,
                        volume: volume.value(i),
                        feed_ts: feed,
                        received_at: recv,
                    },
                    ts_feed: feed,
                    ts_recv: recv,
                    source: sources.value(i).to_string(),
                });
            }
        }

        Ok(observations)
    }

    /// Get the file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    index: usize,
    name: &str,
) -> anyhow::Result<&'a T> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow::anyhow!("Invalid {} column", name))
}
