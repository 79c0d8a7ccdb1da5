use super::RunSummary;
use anyhow::Result;
use csv::Writer;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Step-indexed CSV of named scalars.
///
/// Columns are fixed by the names recorded during the first step. A step ends when a
/// name is recorded a second time; the finished row is written and flushed right away.
pub struct MetricsLogger {
    writer: Writer<File>,
    columns: Option<Vec<String>>,
    row: Vec<(String, f64)>,
    step: u64,
}

impl MetricsLogger {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let writer = Writer::from_path(path)?;
        Ok(Self {
            writer,
            columns: None,
            row: Vec::new(),
            step: 0,
        })
    }

    pub fn record(&mut self, name: &str, value: f64) -> Result<()> {
        if self.row.iter().any(|(n, _)| n == name) {
            self.write_row()?;
        }
        self.row.push((name.to_string(), value));
        Ok(())
    }

    /// Writes the pending partial row and flushes the file.
    pub fn finish(&mut self) -> Result<()> {
        if !self.row.is_empty() {
            self.write_row()?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn steps_written(&self) -> u64 {
        self.step
    }

    fn write_row(&mut self) -> Result<()> {
        let columns = match &self.columns {
            Some(columns) => columns.clone(),
            None => {
                let columns: Vec<String> = self.row.iter().map(|(n, _)| n.clone()).collect();
                let mut header = vec!["step".to_string()];
                header.extend(columns.iter().cloned());
                self.writer.write_record(&header)?;
                self.columns = Some(columns.clone());
                columns
            }
        };

        for (name, _) in &self.row {
            if !columns.contains(name) {
                debug!("Dropping metric {} not present in the log header", name);
            }
        }

        let mut record = vec![self.step.to_string()];
        record.extend(columns.iter().map(|column| {
            self.row
                .iter()
                .find(|(n, _)| n == column)
                .map(|(_, v)| v.to_string())
                .unwrap_or_default()
        }));
        self.writer.write_record(&record)?;
        self.writer.flush()?;

        self.row.clear();
        self.step += 1;
        Ok(())
    }
}

/// Writes a run summary as pretty JSON.
pub fn save_summary(summary: &RunSummary, path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(summary)?)?;
    Ok(())
}
