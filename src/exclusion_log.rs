//! Persistence of exclusion provenance.
//!
//! The pipeline never touches the filesystem itself; it hands events and the
//! run summary to an [`ExclusionSink`].

use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cleaning::types::{CleaningStatistics, ExclusionEvent, ExclusionReason};
use crate::error::Result;

/// Receives the provenance of a cleaning run.
pub trait ExclusionSink {
    fn append_exclusion_event(&mut self, event: &ExclusionEvent) -> Result<()>;

    fn write_run_summary(
        &mut self,
        statistics: &CleaningStatistics,
        events: &[ExclusionEvent],
    ) -> Result<()>;
}

/// One row of `rejection_log.csv`.
#[derive(Debug, Serialize)]
struct RejectionRow {
    timestamp: DateTime<Utc>,
    reason: ExclusionReason,
    rejected_count: usize,
}

/// Writes exclusion events and run reports under a log directory.
///
/// - `rejection_log.csv`: one `timestamp,reason,rejected_count` row per event,
///   appended across runs
/// - `excluded_records_<YYYYmmdd_HHMMSS>.log`: a readable report per run
pub struct CsvExclusionLog {
    dir: PathBuf,
}

impl CsvExclusionLog {
    pub const LOG_FILE: &'static str = "rejection_log.csv";

    /// Creates the log directory if it does not exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(Self::LOG_FILE)
    }

    pub fn report_path(&self, generated: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!(
            "excluded_records_{}.log",
            generated.format("%Y%m%d_%H%M%S")
        ))
    }
}

/// Appends a row to a CSV file, writing the header only when the file is new.
pub fn append_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

impl ExclusionSink for CsvExclusionLog {
    fn append_exclusion_event(&mut self, event: &ExclusionEvent) -> Result<()> {
        append_record(
            &self.log_path(),
            &RejectionRow {
                timestamp: event.timestamp,
                reason: event.reason_code,
                rejected_count: event.count,
            },
        )
    }

    fn write_run_summary(
        &mut self,
        statistics: &CleaningStatistics,
        events: &[ExclusionEvent],
    ) -> Result<()> {
        let generated = Utc::now();
        let path = self.report_path(generated);
        let mut out = BufWriter::new(File::create(&path)?);
        write_report(&mut out, generated, statistics, events)?;
        out.flush()?;

        info!(path = %path.display(), "Exclusion report written");
        Ok(())
    }
}

/// Renders the human-readable run report.
pub fn write_report<W: Write>(
    out: &mut W,
    generated: DateTime<Utc>,
    statistics: &CleaningStatistics,
    events: &[ExclusionEvent],
) -> std::io::Result<()> {
    let rule = "=".repeat(80);
    writeln!(out, "TRIP DATA CLEANING - EXCLUSION LOG")?;
    writeln!(out, "{rule}")?;
    writeln!(out, "Generated: {}", generated.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "Original Records: {}", statistics.original_count)?;
    writeln!(out, "Final Records: {}", statistics.final_count)?;
    writeln!(out, "Total Excluded: {}", statistics.total_excluded())?;
    writeln!(out, "{rule}")?;
    writeln!(out)?;
    writeln!(out, "EXCLUSIONS BY REASON:")?;
    writeln!(out, "{}", "-".repeat(80))?;

    for event in events {
        writeln!(out)?;
        writeln!(out, "{}", event.reason_code.code().to_uppercase())?;
        writeln!(out, "  Count: {}", event.count)?;
        writeln!(out, "  Description: {}", event.human_description)?;
        writeln!(
            out,
            "  Timestamp: {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S")
        )?;
    }

    Ok(())
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<ExclusionEvent>,
    pub summary: Option<CleaningStatistics>,
}

impl ExclusionSink for MemorySink {
    fn append_exclusion_event(&mut self, event: &ExclusionEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }

    fn write_run_summary(
        &mut self,
        statistics: &CleaningStatistics,
        _events: &[ExclusionEvent],
    ) -> Result<()> {
        self.summary = Some(statistics.clone());
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ExclusionSink for NullSink {
    fn append_exclusion_event(&mut self, _event: &ExclusionEvent) -> Result<()> {
        Ok(())
    }

    fn write_run_summary(
        &mut self,
        _statistics: &CleaningStatistics,
        _events: &[ExclusionEvent],
    ) -> Result<()> {
        Ok(())
    }
}
