use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::io::AsyncWriteExt;

use crate::event::Event;

/// Append-only JSONL log of the user's life-event history.  One [`Event`]
/// per line; the batch builder replays it in chronological order.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, event: &Event) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let line = serde_json::to_string(event)?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        // Flush userspace buffers and fsync so the entry survives a process
        // crash immediately after append.
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Atomically replace the log with a new set of events: write to a `.tmp`
    /// sibling, fsync, then rename over the original.  A crash before the
    /// rename leaves the original untouched.
    pub async fn overwrite(&self, events: &[Event]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = {
            let filename = self
                .path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "events.jsonl".to_string());
            self.path.with_file_name(format!("{filename}.tmp"))
        };

        let write_result: Result<()> = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .await?;
            for event in events {
                let line = serde_json::to_string(event)?;
                file.write_all(line.as_bytes()).await?;
                file.write_all(b"\n").await?;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        Ok(())
    }

    /// Copy the live log to a `.bak` sibling.  No-op when the log does not
    /// exist yet.
    pub fn backup(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let bak_path = {
            let filename = self
                .path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "events.jsonl".to_string());
            self.path.with_file_name(format!("{filename}.bak"))
        };

        fs::copy(&self.path, &bak_path)?;
        Ok(())
    }

    /// Load every event in file order.  Corrupt lines are skipped with a
    /// warning and preserved in a `.corrupt` sidecar for forensics.
    pub fn load(&self) -> Result<Vec<Event>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::OpenOptions::new().read(true).open(&self.path)?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut corrupt_count = 0usize;

        for (line_idx, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<Event>(&line) {
                Ok(event) => events.push(event),
                Err(err) => {
                    corrupt_count += 1;
                    tracing::warn!(
                        line = line_idx + 1,
                        error = %err,
                        path = %self.path.display(),
                        "corrupt JSONL record — skipping line (original preserved in .corrupt file)"
                    );
                    let corrupt_path = self.path.with_extension("jsonl.corrupt");
                    if let Ok(mut bad) = fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&corrupt_path)
                    {
                        use std::io::Write as _;
                        let _ = writeln!(bad, "{line}");
                    }
                }
            }
        }

        if corrupt_count > 0 {
            tracing::warn!(
                corrupt_lines = corrupt_count,
                path = %self.path.display(),
                "event log loaded with skipped corrupt lines — inspect .corrupt sidecar"
            );
        }

        Ok(events)
    }

    /// Load and sort by occurrence time, oldest first.  The builders assume
    /// chronological input.
    pub fn load_sorted(&self) -> Result<Vec<Event>> {
        let mut events = self.load()?;
        events.sort_by_key(|e| e.occurred_at);
        Ok(events)
    }
}
