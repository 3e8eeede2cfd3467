//! Deterministic rendering of aggregated failures.

use std::io::{self, Write};

use crate::engine::FailureRecord;

/// Printed when no checker reported issues.
pub const SUCCESS_MESSAGE: &str = "Excellent!";

/// Finalized, sorted failure records for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    records: Vec<FailureRecord>,
}

impl Report {
    /// Finalize collected records.
    ///
    /// Sorted by command; the sort is stable so records of one command
    /// keep their arrival order.
    pub fn new(mut records: Vec<FailureRecord>) -> Self {
        records.sort_by(|a, b| a.command.cmp(&b.command));
        Self { records }
    }

    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Records grouped by command, in report order.
    pub fn groups(&self) -> Vec<(&str, Vec<&FailureRecord>)> {
        let mut groups: Vec<(&str, Vec<&FailureRecord>)> = Vec::new();
        for record in &self.records {
            match groups.last_mut() {
                Some((command, items)) if *command == record.command => items.push(record),
                _ => groups.push((record.command.as_str(), vec![record])),
            }
        }
        groups
    }

    /// Process exit status for this report.
    pub fn exit_code(&self) -> i32 {
        if self.is_empty() { 0 } else { 1 }
    }

    /// Write the grouped report, or the success message when empty.
    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.is_empty() {
            writeln!(out, "{}", SUCCESS_MESSAGE)?;
            return Ok(());
        }
        for (command, records) in self.groups() {
            write!(out, "{}", header(command))?;
            for record in records {
                writeln!(out, "{}", String::from_utf8_lossy(&record.output))?;
            }
        }
        Ok(())
    }

    /// Render to a string.
    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail
        let _ = self.render(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Section header printed before each command's output.
pub fn header(command: &str) -> String {
    format!("\n\n\n---------- {} ---------:\n", command)
}
