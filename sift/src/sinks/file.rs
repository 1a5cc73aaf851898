use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::EventError;
use crate::time::parse_timestamp;
use crate::types::{DeadLetterEvent, TransformedEvent};

use super::RecordSink;

/// Writes batches as newline-delimited JSON under a
/// `year=YYYY/month=MM/day=DD` layout, one file per flush per day, so
/// downstream batch jobs can prune partitions by path alone.
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn partition_date(event: &TransformedEvent) -> DateTime<Utc> {
    parse_timestamp(&event.timestamp).unwrap_or(event.processed_at)
}

async fn write_lines(dir: &Path, name: &str, lines: &[String]) -> Result<(), EventError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| EventError::SinkWrite(e.to_string()))?;
    let path = dir.join(name);
    tokio::fs::write(&path, lines.join("\n") + "\n")
        .await
        .map_err(|e| EventError::SinkWrite(e.to_string()))?;
    debug!(path = %path.display(), records = lines.len(), "wrote sink file");
    Ok(())
}

#[async_trait]
impl RecordSink<TransformedEvent> for FileSink {
    async fn send_batch(&self, records: &[TransformedEvent]) -> Result<(), EventError> {
        let mut partitions: BTreeMap<(i32, u32, u32), Vec<String>> = BTreeMap::new();
        for record in records {
            let date = partition_date(record);
            let line = serde_json::to_string(record)
                .map_err(|e| EventError::SinkWrite(e.to_string()))?;
            partitions
                .entry((date.year(), date.month(), date.day()))
                .or_default()
                .push(line);
        }

        for ((year, month, day), lines) in partitions {
            let dir = self
                .root
                .join(format!("year={:04}", year))
                .join(format!("month={:02}", month))
                .join(format!("day={:02}", day));
            let name = format!(
                "events_{}_{}.jsonl",
                Utc::now().format("%Y%m%d%H%M%S"),
                Uuid::now_v7().simple()
            );
            write_lines(&dir, &name, &lines).await?;
        }
        Ok(())
    }
}

/// Persists dead-letter envelopes, one JSON file each, so a single
/// corrupt envelope never blocks inspection of its neighbours.
pub struct DeadLetterFileSink {
    root: PathBuf,
}

impl DeadLetterFileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl RecordSink<DeadLetterEvent> for DeadLetterFileSink {
    async fn send_batch(&self, records: &[DeadLetterEvent]) -> Result<(), EventError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| EventError::SinkWrite(e.to_string()))?;
        for record in records {
            let rendered = serde_json::to_string_pretty(record)
                .map_err(|e| EventError::SinkWrite(e.to_string()))?;
            let name = format!(
                "dead_letter_{}_{}.json",
                Utc::now().format("%Y%m%d%H%M%S"),
                Uuid::now_v7().simple()
            );
            tokio::fs::write(self.root.join(name), rendered)
                .await
                .map_err(|e| EventError::SinkWrite(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{dead_letter_event, transformed_event};

    async fn collect_files(root: &Path, extension: &str) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
            while let Some(entry) = entries.next_entry().await.unwrap() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().is_some_and(|e| e == extension) {
                    found.push(path);
                }
            }
        }
        found
    }

    #[tokio::test]
    async fn events_land_in_date_partitioned_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let mut event = transformed_event("purchase");
        event.timestamp = "2026-03-05T10:00:00+00:00".to_string();
        sink.send_batch(&[event.clone(), event.clone()]).await.unwrap();

        let files = collect_files(dir.path(), "jsonl").await;
        assert_eq!(files.len(), 1);
        let path = files[0].to_string_lossy().into_owned();
        assert!(path.contains("year=2026"), "{}", path);
        assert!(path.contains("month=03"), "{}", path);
        assert!(path.contains("day=05"), "{}", path);

        let content = tokio::fs::read_to_string(&files[0]).await.unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: TransformedEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, event);
    }

    #[tokio::test]
    async fn batch_spanning_days_writes_one_file_per_partition() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let mut first = transformed_event("click");
        first.timestamp = "2026-03-05T23:59:00+00:00".to_string();
        let mut second = transformed_event("click");
        second.timestamp = "2026-03-06T00:01:00+00:00".to_string();
        sink.send_batch(&[first, second]).await.unwrap();

        let files = collect_files(dir.path(), "jsonl").await;
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn unparseable_timestamp_falls_back_to_processing_time() {
        let event = transformed_event("click");
        assert_eq!(partition_date(&event), event.processed_at);
    }

    #[tokio::test]
    async fn dead_letters_get_one_file_each() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DeadLetterFileSink::new(dir.path());

        let envelope = dead_letter_event();
        sink.send_batch(&[envelope.clone(), envelope.clone()])
            .await
            .unwrap();

        let files = collect_files(dir.path(), "json").await;
        assert_eq!(files.len(), 2);
        let parsed: DeadLetterEvent =
            serde_json::from_str(&tokio::fs::read_to_string(&files[0]).await.unwrap()).unwrap();
        assert_eq!(parsed, envelope);
    }
}
