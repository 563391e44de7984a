//! Tabular input/output for ledgers, rulebooks and category lists
//!
//! Everything is held as string cells: the engine only reads the description
//! column, and every other column passes through to the output untouched.
//! Inputs may be CSV or a spreadsheet sheet (xlsx/xls/ods).

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use calamine::{Data, Reader};
use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, info};

use crate::engine::ClassificationResult;
use crate::error::{Error, Result};
use crate::tax::TaxRules;

/// Description column expected in ledgers and rulebooks
pub const COL_DESCRIPTION: &str = "Description";
/// Category column in rulebooks, category lists and the output
pub const COL_CATEGORY: &str = "Category";
pub const COL_MATCH_SCORE: &str = "Match_Score";
pub const COL_MATCHED_RULE: &str = "Matched_Rule";
pub const COL_AUTO_APPROVED: &str = "Auto_Approved";
/// Signed amount column produced by `Ledger::derive_values`
pub const COL_VALUES: &str = "Values";

const CREDIT_HEADERS: &[&str] = &["money in", "credit", "credits"];
const DEBIT_HEADERS: &[&str] = &["money out", "debit", "debits"];
const AMOUNT_HEADERS: &[&str] = &["amount", "amt", "value"];
const DIRECTION_HEADERS: &[&str] = &["debit/credit", "type"];

/// Header name for the n-th (1-based) suggestion column
pub fn suggestion_column(n: usize) -> String {
    format!("Suggestion_{}", n)
}

/// In-memory table of string cells with a header row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, padding or truncating every row to the header width
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Parse CSV data with a header row
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(Self::new(headers, rows))
    }

    /// Read one sheet of a workbook; the first sheet when `sheet` is None
    pub fn from_workbook(path: &Path, sheet: Option<&str>) -> Result<Self> {
        let mut workbook = calamine::open_workbook_auto(path)?;
        let sheet_name = match sheet {
            Some(name) => name.to_string(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| Error::InvalidData(format!("{} has no sheets", path.display())))?,
        };
        debug!("Reading sheet '{}' from {}", sheet_name, path.display());

        let range = workbook.worksheet_range(&sheet_name)?;
        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row.iter().map(|c| cell_to_string(c).trim().to_string()).collect(),
            None => return Ok(Self::default()),
        };

        let body = rows
            .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .collect();

        Ok(Self::new(headers, body))
    }

    /// Load a table from disk, choosing the parser by file extension
    pub fn load(path: &Path, sheet: Option<&str>) -> Result<Self> {
        let table = if is_workbook(path) {
            Self::from_workbook(path, sheet)?
        } else {
            let file = File::open(path)?;
            Self::from_csv_reader(BufReader::new(file))?
        };
        info!("Loaded {} rows from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive, whitespace-tolerant header lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.headers
            .iter()
            .position(|h| h.trim().to_lowercase() == wanted)
    }

    /// Header lookup that fails with a diagnostic naming the column and input
    pub fn require_column(&self, name: &str, input: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::missing_column(name, input))
    }

    /// Cells of one column, in row order
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }

    /// Replace a column's values, or append it when the header is new
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(Error::InvalidData(format!(
                "Column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        match self.column_index(name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Write the table as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the table as CSV to `path`, replacing it atomically
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        self.write_csv(&mut temp)?;
        temp.as_file_mut().flush()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;
        info!("Wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "xlsx" | "xlsm" | "xls" | "xlsb" | "ods"))
        .unwrap_or(false)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        _ => String::new(),
    }
}

/// A transaction ledger: any table with a description column
#[derive(Debug, Clone)]
pub struct Ledger {
    table: Table,
    description_col: usize,
    values: Option<Vec<f64>>,
}

impl Ledger {
    /// Wrap a table, failing when it has no `Description` column
    pub fn from_table(table: Table) -> Result<Self> {
        let description_col = table.require_column(COL_DESCRIPTION, "transaction ledger")?;
        Ok(Self {
            table,
            description_col,
            values: None,
        })
    }

    /// Load a ledger from CSV or a workbook sheet
    pub fn load(path: &Path, sheet: Option<&str>) -> Result<Self> {
        Self::from_table(Table::load(path, sheet)?)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Raw descriptions in row order
    pub fn descriptions(&self) -> Vec<String> {
        self.table
            .column(self.description_col)
            .map(str::to_string)
            .collect()
    }

    /// Signed values, once `derive_values` has run
    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    /// Add a signed `Values` column (credits positive, debits negative)
    ///
    /// Uses separate credit/debit columns when present, otherwise an amount
    /// column signed by a direction column, otherwise an amount (or earlier
    /// `Values`) column taken as already signed. Unparseable cells count as
    /// zero.
    pub fn derive_values(&mut self) -> Result<()> {
        let find = |candidates: &[&str]| {
            candidates
                .iter()
                .find_map(|name| self.table.column_index(name))
        };
        let credit = find(CREDIT_HEADERS);
        let debit = find(DEBIT_HEADERS);

        let values: Vec<f64> = if credit.is_some() || debit.is_some() {
            self.table
                .rows()
                .iter()
                .map(|row| {
                    let money_in = credit.map(|i| parse_amount(&row[i])).unwrap_or(0.0);
                    let money_out = debit.map(|i| parse_amount(&row[i])).unwrap_or(0.0);
                    money_in - money_out
                })
                .collect()
        } else {
            let amount = find(AMOUNT_HEADERS).or_else(|| self.table.column_index(COL_VALUES));
            match (amount, find(DIRECTION_HEADERS)) {
                (Some(amount), Some(direction)) => self
                    .table
                    .rows()
                    .iter()
                    .map(|row| {
                        let value = parse_amount(&row[amount]).abs();
                        match row[direction].trim().to_lowercase().as_str() {
                            "credit" => value,
                            "debit" => -value,
                            _ => 0.0,
                        }
                    })
                    .collect(),
                (Some(amount), None) => self
                    .table
                    .rows()
                    .iter()
                    .map(|row| parse_amount(&row[amount]))
                    .collect(),
                (None, _) => {
                    debug!("No credit/debit or amount columns; Values set to zero");
                    vec![0.0; self.table.len()]
                }
            }
        };

        let cells = values.iter().map(|v| format!("{:.2}", v)).collect();
        self.table.set_column(COL_VALUES, cells)?;
        self.values = Some(values);
        Ok(())
    }

    /// Append the classification columns and return the output table
    ///
    /// Existing columns with the same names are overwritten, so a previous
    /// run's output can be fed back in. With tax rules, directional matches
    /// get their category prefixed by the sign of the row's value (values
    /// are derived first if needed).
    pub fn into_output(
        mut self,
        results: &[ClassificationResult],
        num_suggestions: usize,
        tax: Option<&TaxRules>,
    ) -> Result<Table> {
        let categories: Vec<String> = match tax {
            Some(tax) => {
                if self.values.is_none() {
                    self.derive_values()?;
                }
                let values = self.values.as_deref().unwrap_or_default();
                results
                    .iter()
                    .enumerate()
                    .map(|(i, r)| tax.category_for(r, values.get(i).copied().unwrap_or(0.0)))
                    .collect()
            }
            None => results.iter().map(|r| r.category.clone()).collect(),
        };
        let mut table = self.table;

        table.set_column(COL_CATEGORY, categories)?;
        table.set_column(
            COL_MATCH_SCORE,
            results.iter().map(|r| format_score(r.score)).collect(),
        )?;
        table.set_column(
            COL_MATCHED_RULE,
            results
                .iter()
                .map(|r| r.matched_rule.clone().unwrap_or_default())
                .collect(),
        )?;
        table.set_column(
            COL_AUTO_APPROVED,
            results.iter().map(|r| r.auto_approved.to_string()).collect(),
        )?;

        for n in 0..num_suggestions {
            table.set_column(
                &suggestion_column(n + 1),
                results
                    .iter()
                    .map(|r| {
                        r.suggestions
                            .get(n)
                            .map(|s| s.to_string())
                            .unwrap_or_default()
                    })
                    .collect(),
            )?;
        }

        Ok(table)
    }
}

/// Round to two decimals and drop trailing zeros ("85.5", "100")
pub fn format_score(score: f64) -> String {
    let rounded = (score * 100.0).round() / 100.0;
    format!("{}", rounded)
}

/// Parse a currency cell, tolerating symbols, thousands separators and
/// accounting-style parentheses
fn parse_amount(cell: &str) -> f64 {
    let trimmed = cell.trim();
    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let value = cleaned.parse::<f64>().unwrap_or(0.0);
    if negative {
        -value.abs()
    } else {
        value
    }
}

/// Category labels for semantic mode: the distinct, non-blank values of the
/// `Category` column in rulebook order
pub fn category_labels(table: &Table) -> Result<Vec<String>> {
    let index = table.require_column(COL_CATEGORY, "category list")?;
    let mut labels: Vec<String> = Vec::new();
    for cell in table.column(index) {
        let label = cell.trim();
        if !label.is_empty() && !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    Ok(labels)
}
