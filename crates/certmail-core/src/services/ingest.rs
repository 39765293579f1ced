//! Recipient rows from CSV text

use crate::error::{CertmailError, Result};
use crate::types::Recipient;
use certmail_types::BatchReport;
use std::path::Path;

/// A data row that was dropped during ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line number in the source text
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestResult {
    pub recipients: Vec<Recipient>,
    pub skipped: Vec<SkippedRow>,
}

/// Parse CSV text with a header row containing `name` and `email` columns
/// (any case). Other columns become auxiliary fields. Rows without a name
/// or with an invalid email are skipped and reported.
pub fn parse_recipients(text: &str) -> Result<IngestResult> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = split_records(text)
        .into_iter()
        .filter(|(_, values)| !(values.len() == 1 && values[0].trim().is_empty()));

    let (_, header) = records
        .next()
        .ok_or_else(|| CertmailError::Validation("CSV is empty".to_string()))?;

    let header: Vec<String> = header.into_iter().map(|h| h.trim().to_lowercase()).collect();

    let column = |wanted: &str| header.iter().position(|h| h == wanted);
    let (name_col, email_col) = match (column("name"), column("email")) {
        (Some(n), Some(e)) => (n, e),
        _ => {
            return Err(CertmailError::Validation(
                "CSV must contain 'Name' and 'Email' columns".to_string(),
            ))
        }
    };

    let mut result = IngestResult::default();

    for (line_no, values) in records {
        let value = |idx: usize| values.get(idx).map(|v| v.trim()).unwrap_or("");

        let name = value(name_col);
        let email = value(email_col);

        if name.is_empty() {
            result.skipped.push(SkippedRow {
                line: line_no,
                reason: "missing name".to_string(),
            });
            continue;
        }

        let fields = header
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != name_col && *idx != email_col)
            .map(|(idx, key)| (key.clone(), value(idx).to_string()))
            .collect();

        match Recipient::with_fields(name, email, fields) {
            Ok(recipient) => result.recipients.push(recipient),
            Err(e) => result.skipped.push(SkippedRow {
                line: line_no,
                reason: e.to_string(),
            }),
        }
    }

    log::info!(
        "Parsed {} valid rows from CSV ({} skipped)",
        result.recipients.len(),
        result.skipped.len()
    );
    for row in &result.skipped {
        log::warn!("Skipping CSV line {}: {}", row.line, row.reason);
    }

    Ok(result)
}

/// Read a batch report written by an earlier run
pub fn load_report<P: AsRef<Path>>(path: P) -> Result<BatchReport> {
    let text = std::fs::read_to_string(path)?;
    Ok(BatchReport::from_json_str(&text)?)
}

/// Split CSV text into records, each tagged with the line it starts on.
///
/// Double-quoted values may contain commas and line breaks; `""` inside
/// quotes is a literal quote. A `\r` outside quotes is dropped.
fn split_records(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => values.push(std::mem::take(&mut current)),
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                values.push(std::mem::take(&mut current));
                records.push((record_line, std::mem::take(&mut values)));
                line += 1;
                record_line = line;
            }
            '\n' => {
                current.push(ch);
                line += 1;
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() || !values.is_empty() {
        values.push(current);
        records.push((record_line, values));
    }
    records
}
