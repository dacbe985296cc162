//! JSONL journal of saver-cycle events.
//!
//! One file per day under the logs directory; each line is one event. The
//! journal is a record of what the daemon did (idle periods, saver runs),
//! separate from the tracing diagnostics.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info};

/// Cycle event types for JSONL logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum CycleEvent {
    #[serde(rename = "session_start")]
    SessionStart {
        timestamp: DateTime<Utc>,
        version: String,
    },
    #[serde(rename = "session_end")]
    SessionEnd {
        timestamp: DateTime<Utc>,
        cycles_completed: u64,
    },
    #[serde(rename = "idle_start")]
    IdleStart {
        timestamp: DateTime<Utc>,
        idle_after_seconds: u32,
    },
    #[serde(rename = "idle_end")]
    IdleEnd {
        timestamp: DateTime<Utc>,
        idle_duration_seconds: u64,
    },
    #[serde(rename = "saver_spawned")]
    SaverSpawned {
        timestamp: DateTime<Utc>,
        pid: i32,
    },
    #[serde(rename = "saver_terminated")]
    SaverTerminated {
        timestamp: DateTime<Utc>,
        pid: i32,
    },
}

/// JSONL logger for cycle events.
pub struct JsonlLogger {
    logs_dir: PathBuf,
    current_file: Option<BufWriter<File>>,
    current_date: Option<String>,
    idle_start_time: Option<DateTime<Utc>>,
}

impl JsonlLogger {
    /// Create a new JSONL logger.
    pub fn new(logs_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        Ok(Self {
            logs_dir,
            current_file: None,
            current_date: None,
            idle_start_time: None,
        })
    }

    /// Get or create the log file for today.
    fn get_writer(&mut self) -> Result<&mut BufWriter<File>> {
        let today = Local::now().format("%Y-%m-%d").to_string();

        // Check if we need to rotate to a new file
        if self.current_date.as_ref() != Some(&today) {
            let log_path = self.logs_dir.join(format!("{}.jsonl", today));

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("Failed to open log file: {:?}", log_path))?;

            self.current_file = Some(BufWriter::new(file));
            self.current_date = Some(today.clone());

            debug!("Opened journal file: {:?}", log_path);
        }

        self.current_file
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("No journal file available"))
    }

    /// Write a line to the JSONL log.
    fn write_line(&mut self, event: &CycleEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        let writer = self.get_writer()?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    /// Log session start event.
    pub fn log_session_start(&mut self, version: &str) -> Result<()> {
        info!("Session started");
        self.write_line(&CycleEvent::SessionStart {
            timestamp: Utc::now(),
            version: version.to_string(),
        })
    }

    /// Log session end event.
    pub fn log_session_end(&mut self, cycles_completed: u64) -> Result<()> {
        info!("Session ended, {} saver cycles completed", cycles_completed);
        self.write_line(&CycleEvent::SessionEnd {
            timestamp: Utc::now(),
            cycles_completed,
        })
    }

    /// Log the start of an idle period.
    pub fn log_idle_start(&mut self, idle_after_seconds: u32) -> Result<()> {
        self.idle_start_time = Some(Utc::now());
        self.write_line(&CycleEvent::IdleStart {
            timestamp: Utc::now(),
            idle_after_seconds,
        })
    }

    /// Log the end of an idle period.
    pub fn log_idle_end(&mut self) -> Result<()> {
        let idle_duration = self
            .idle_start_time
            .map(|start| (Utc::now() - start).num_seconds().max(0) as u64)
            .unwrap_or(0);

        self.idle_start_time = None;

        self.write_line(&CycleEvent::IdleEnd {
            timestamp: Utc::now(),
            idle_duration_seconds: idle_duration,
        })
    }

    /// Log a saver process spawn.
    pub fn log_saver_spawned(&mut self, pid: i32) -> Result<()> {
        self.write_line(&CycleEvent::SaverSpawned {
            timestamp: Utc::now(),
            pid,
        })
    }

    /// Log a saver process termination request.
    pub fn log_saver_terminated(&mut self, pid: i32) -> Result<()> {
        self.write_line(&CycleEvent::SaverTerminated {
            timestamp: Utc::now(),
            pid,
        })
    }
}

impl Drop for JsonlLogger {
    fn drop(&mut self) {
        // Flush any remaining data
        if let Some(ref mut writer) = self.current_file {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_written_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = JsonlLogger::new(dir.path().to_path_buf()).unwrap();

        logger.log_session_start("0.1.0").unwrap();
        logger.log_idle_start(120).unwrap();
        logger.log_saver_spawned(4321).unwrap();
        logger.log_saver_terminated(4321).unwrap();
        logger.log_idle_end().unwrap();
        logger.log_session_end(1).unwrap();
        drop(logger);

        let today = Local::now().format("%Y-%m-%d").to_string();
        let content =
            std::fs::read_to_string(dir.path().join(format!("{}.jsonl", today))).unwrap();
        let events: Vec<CycleEvent> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], CycleEvent::SessionStart { .. }));
        assert!(matches!(
            events[1],
            CycleEvent::IdleStart {
                idle_after_seconds: 120,
                ..
            }
        ));
        assert!(matches!(events[2], CycleEvent::SaverSpawned { pid: 4321, .. }));
        assert!(matches!(
            events[5],
            CycleEvent::SessionEnd {
                cycles_completed: 1,
                ..
            }
        ));
    }
}
