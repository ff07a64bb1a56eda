//! Batch validation of tickets from CSV rows.
//!
//! A thin sequential layer over the engine: the type/rule snapshot is read
//! once at the start of a run and shared read-only across rows, each row
//! goes through the same detect-then-evaluate path as live tickets, and the
//! aggregated report can be written back out as an annotated CSV.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{
    detect_ticket_type, EngineError, TicketType, TicketTypeId, ValidationEngine, ValidationRule,
};
use crate::store::RuleStore;

const TEXT_PREVIEW_CHARS: usize = 500;

/// Which column of the input file carries the ticket text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelector {
    /// Zero-based column index.
    Index(usize),
    /// Header name, compared case-insensitively.
    Header(String),
}

impl ColumnSelector {
    fn resolve(&self, headers: &[String]) -> Result<usize, BatchError> {
        match self {
            ColumnSelector::Index(index) => {
                if *index < headers.len() {
                    Ok(*index)
                } else {
                    Err(BatchError::ColumnOutOfRange {
                        index: *index,
                        columns: headers.len(),
                    })
                }
            }
            ColumnSelector::Header(name) => {
                let wanted = name.to_lowercase();
                headers
                    .iter()
                    .position(|header| header.to_lowercase() == wanted)
                    .ok_or_else(|| BatchError::ColumnNotFound { name: name.clone() })
            }
        }
    }
}

/// Outcome of validating a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowResult {
    /// 1-based data row number (header excluded).
    pub row_number: usize,
    /// Ticket text, capped for reporting.
    pub ticket_text: String,
    pub is_valid: bool,
    pub skipped: bool,
    pub ticket_type: Option<String>,
    /// Verbatim error messages of the failed rules.
    pub errors: Vec<String>,
}

/// Aggregated result of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub skipped: usize,
    pub rows: Vec<RowResult>,
}

/// Error raised by batch processing around the engine.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
    #[error("unable to read input file: {0}")]
    Csv(#[from] csv::Error),
    #[error("input file has no data rows")]
    EmptyInput,
    #[error("ticket column '{name}' not found in header row")]
    ColumnNotFound { name: String },
    #[error("ticket column index {index} out of range ({columns} columns)")]
    ColumnOutOfRange { index: usize, columns: usize },
    #[error("forced ticket type {0:?} does not exist or is inactive")]
    UnknownForcedType(TicketTypeId),
}

impl<S> ValidationEngine<S>
where
    S: RuleStore,
{
    /// Validate every row of a CSV source sequentially.
    ///
    /// `forced_type` pins every row to one ticket type and skips detection.
    /// `progress` is invoked after each row with (processed, total).
    pub fn validate_batch<R: Read>(
        &self,
        reader: R,
        column: &ColumnSelector,
        forced_type: Option<TicketTypeId>,
        mut progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Result<BatchReport, BatchError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|header| header.to_string())
            .collect();
        let column_index = column.resolve(&headers)?;

        let records: Vec<csv::StringRecord> =
            csv_reader.records().collect::<Result<_, csv::Error>>()?;
        if records.is_empty() {
            return Err(BatchError::EmptyInput);
        }

        // One snapshot for the whole run: types up front, rules cached per
        // detected type as rows demand them.
        let ticket_types = self.store().active_ticket_types()?;
        if ticket_types.is_empty() {
            return Err(BatchError::Engine(EngineError::NoActiveTicketTypes));
        }

        let forced = match forced_type {
            Some(type_id) => Some(
                ticket_types
                    .iter()
                    .find(|tt| tt.id == type_id)
                    .cloned()
                    .ok_or(BatchError::UnknownForcedType(type_id))?,
            ),
            None => None,
        };

        let mut rule_cache: BTreeMap<Option<TicketTypeId>, Vec<ValidationRule>> = BTreeMap::new();

        let total = records.len();
        let mut rows = Vec::with_capacity(total);
        let mut valid = 0;
        let mut invalid = 0;
        let mut skipped = 0;

        for (offset, record) in records.iter().enumerate() {
            let row_number = offset + 1;
            let text = record.get(column_index).unwrap_or("").trim();

            if text.is_empty() {
                skipped += 1;
                rows.push(RowResult {
                    row_number,
                    ticket_text: String::new(),
                    is_valid: false,
                    skipped: true,
                    ticket_type: None,
                    errors: vec!["ticket text is empty".to_string()],
                });
                report_progress(&mut progress, row_number, total);
                continue;
            }

            let detected: Option<TicketType> = match &forced {
                Some(forced) => Some(forced.clone()),
                None => detect_ticket_type(text, &ticket_types, None).cloned(),
            };
            let type_key = detected.as_ref().map(|tt| tt.id);

            let rules = match rule_cache.entry(type_key) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(self.store().active_rules(type_key)?),
            };

            let result = self.validate_against(text, rules, detected);

            if result.is_valid {
                valid += 1;
            } else {
                invalid += 1;
            }

            rows.push(RowResult {
                row_number,
                ticket_text: truncate_preview(text),
                is_valid: result.is_valid,
                skipped: false,
                ticket_type: result.detected_type_name().map(|name| name.to_string()),
                errors: result
                    .error_messages()
                    .into_iter()
                    .map(|message| message.to_string())
                    .collect(),
            });
            report_progress(&mut progress, row_number, total);
        }

        info!(total, valid, invalid, skipped, "batch validation finished");

        Ok(BatchReport {
            total,
            valid,
            invalid,
            skipped,
            rows,
        })
    }
}

fn report_progress(
    progress: &mut Option<&mut dyn FnMut(usize, usize)>,
    processed: usize,
    total: usize,
) {
    if let Some(callback) = progress {
        callback(processed, total);
    }
}

fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= TEXT_PREVIEW_CHARS {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

/// Write a batch report as CSV with one row per input ticket.
pub fn write_report<W: Write>(report: &BatchReport, writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["row", "valid", "ticket_type", "errors", "ticket_text"])?;

    for row in &report.rows {
        let validity = if row.skipped {
            "skipped"
        } else if row.is_valid {
            "valid"
        } else {
            "invalid"
        };
        csv_writer.write_record([
            row.row_number.to_string().as_str(),
            validity,
            row.ticket_type.as_deref().unwrap_or(""),
            row.errors.join("; ").as_str(),
            row.ticket_text.as_str(),
        ])?;
    }

    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
