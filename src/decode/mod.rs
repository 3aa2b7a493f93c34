//! Record decoding: raw CSV text + a per-column coercion policy → typed records.

pub mod coerce;

pub use coerce::{coerce, Cell, Coercion, DefectKind, JsonFallback};

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use std::collections::BTreeMap;

/// One entry of a table's coercion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRule {
    pub name: &'static str,
    pub coercion: Coercion,
}

impl ColumnRule {
    pub const fn new(name: &'static str, coercion: Coercion) -> Self {
        Self { name, coercion }
    }
}

/// A cell that did not decode cleanly, kept for the loader to report.
#[derive(Debug, Clone, PartialEq)]
pub struct CellDefect {
    pub column: String,
    pub raw: String,
    pub kind: DefectKind,
}

/// A decoded row. Every declared column is present, possibly as `Cell::Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedRecord {
    /// 1-based data row number in the source (0 for embedded rows).
    pub line: usize,
    fields: BTreeMap<String, Cell>,
    defects: Vec<CellDefect>,
}

impl TypedRecord {
    pub fn from_cells<I, K>(cells: I) -> Self
    where
        I: IntoIterator<Item = (K, Cell)>,
        K: Into<String>,
    {
        Self {
            line: 0,
            fields: cells.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            defects: Vec::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.fields.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, cell: Cell) {
        self.fields.insert(column.into(), cell);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn defects(&self) -> &[CellDefect] {
        &self.defects
    }

    /// Columns still holding the invalid numeric sentinel.
    pub fn invalid_columns(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, c)| matches!(c, Cell::Invalid(_)))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Convert into the JSON object sent to the store. Fails with the offending
    /// column names if any cell is the invalid sentinel.
    pub fn into_row(self) -> Result<serde_json::Map<String, serde_json::Value>, Vec<String>> {
        let mut row = serde_json::Map::with_capacity(self.fields.len());
        let mut invalid = Vec::new();
        for (name, cell) in self.fields {
            match cell.to_json() {
                Some(v) => {
                    row.insert(name, v);
                }
                None => invalid.push(name),
            }
        }
        if invalid.is_empty() {
            Ok(row)
        } else {
            Err(invalid)
        }
    }
}

/// Decoder over a borrowed source. Cheap to build; `records()` can be called
/// any number of times and always starts from the first row.
pub struct Decoder<'a> {
    text: &'a str,
    policy: &'a [ColumnRule],
}

impl<'a> Decoder<'a> {
    pub fn new(text: &'a str, policy: &'a [ColumnRule]) -> Self {
        Self { text, policy }
    }

    /// Lazily decode every data row. An empty source yields no records.
    pub fn records(&self) -> Result<Records<'a>, csv::Error> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(self.text.as_bytes());
        let headers = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| clean_header(h, i == 0))
            .collect();
        Ok(Records {
            inner: reader.into_records(),
            headers,
            policy: self.policy,
            line: 0,
        })
    }
}

/// Iterator returned by [`Decoder::records`].
pub struct Records<'a> {
    inner: StringRecordsIntoIter<&'a [u8]>,
    headers: Vec<String>,
    policy: &'a [ColumnRule],
    line: usize,
}

impl Records<'_> {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn type_record(&self, raw: &StringRecord) -> TypedRecord {
        let mut record = TypedRecord {
            line: self.line,
            ..Default::default()
        };

        // 1) every header cell, coerced if declared, passed through otherwise
        for (i, header) in self.headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = raw.get(i).unwrap_or("");
            match self.policy.iter().find(|r| r.name == header) {
                Some(rule) => {
                    let (cell, defect) = coerce(value, rule.coercion);
                    if let Some(kind) = defect {
                        record.defects.push(CellDefect {
                            column: header.clone(),
                            raw: value.to_string(),
                            kind,
                        });
                    }
                    record.fields.insert(header.clone(), cell);
                }
                None => {
                    record
                        .fields
                        .insert(header.clone(), Cell::Text(value.to_string()));
                }
            }
        }

        // 2) declared columns the source does not carry
        for rule in self.policy {
            record
                .fields
                .entry(rule.name.to_string())
                .or_insert(Cell::Null);
        }

        record
    }
}

impl Iterator for Records<'_> {
    type Item = Result<TypedRecord, csv::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.inner.next()? {
            Ok(r) => r,
            Err(e) => return Some(Err(e)),
        };
        self.line += 1;
        Some(Ok(self.type_record(&raw)))
    }
}

/// Trim, strip outer quotes, and drop a leading BOM on the first header.
fn clean_header(raw: &str, first: bool) -> String {
    let raw = if first {
        raw.trim_start_matches('\u{feff}')
    } else {
        raw
    };
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}
