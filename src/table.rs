use crate::error::TableError;
use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use serde::Deserialize;
use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Crlf,
    Lf,
}

impl FromStr for LineEnding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "crlf" => Ok(LineEnding::Crlf),
            "lf" => Ok(LineEnding::Lf),
            other => Err(format!("unknown line ending '{}' (expected crlf or lf)", other)),
        }
    }
}

impl LineEnding {
    fn terminator(self) -> Terminator {
        match self {
            LineEnding::Crlf => Terminator::CRLF,
            LineEnding::Lf => Terminator::Any(b'\n'),
        }
    }

    /// Rewrites every line break inside `field` to this convention. Bare
    /// `\r` counts as a line break.
    pub fn normalize<'a>(self, field: &'a str) -> Cow<'a, str> {
        if !field.contains('\r') && (self == LineEnding::Lf || !field.contains('\n')) {
            return Cow::Borrowed(field);
        }
        let unified = field.replace("\r\n", "\n").replace('\r', "\n");
        match self {
            LineEnding::Lf => Cow::Owned(unified),
            LineEnding::Crlf => Cow::Owned(unified.replace('\n', "\r\n")),
        }
    }
}

/// A column resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHandle {
    pub name: String,
    pub index: usize,
}

/// A delimited table held in memory. The header is kept apart from the data
/// rows; rows may be ragged on input but are padded whenever a column is
/// added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    delimiter: u8,
}

impl Table {
    pub fn load(path: &Path, delimiter: u8) -> Result<Self, TableError> {
        let file = File::open(path).map_err(|source| TableError::Read { path: path.to_path_buf(), source })?;
        Self::from_reader(file, delimiter, path)
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: u8, origin: &Path) -> Result<Self, TableError> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = Vec::new();
        for result in csv_reader.records() {
            let record: StringRecord = result.map_err(|source| TableError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
            records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let mut records = records.into_iter();
        let header = records.next().ok_or_else(|| TableError::Empty { path: origin.to_path_buf() })?;
        Ok(Self { header, rows: records.collect(), delimiter })
    }

    pub fn save(&self, path: &Path, line_ending: LineEnding) -> Result<(), TableError> {
        let file = File::create(path).map_err(|source| TableError::Write {
            path: path.to_path_buf(),
            source: source.into(),
        })?;
        self.write_to(file, line_ending, path)
    }

    pub fn write_to<W: Write>(&self, writer: W, line_ending: LineEnding, target: &Path) -> Result<(), TableError> {
        let to_error = |source: csv::Error| TableError::Write { path: target.to_path_buf(), source };
        let mut csv_writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .terminator(line_ending.terminator())
            .from_writer(writer);
        let normalized = |fields: &[String]| -> Vec<String> {
            fields.iter().map(|f| line_ending.normalize(f).into_owned()).collect()
        };
        csv_writer.write_record(normalized(self.header.as_slice())).map_err(to_error)?;
        for row in &self.rows {
            csv_writer.write_record(normalized(row.as_slice())).map_err(to_error)?;
        }
        csv_writer.flush().map_err(|e| to_error(e.into()))?;
        Ok(())
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Returns the handle for `name`, appending the column if it is absent.
    /// Every row is padded to the header width before this returns, so
    /// writes through any handle stay in bounds. Returns whether the column
    /// was added.
    pub fn resolve_column(&mut self, name: &str) -> (ColumnHandle, bool) {
        let (index, added) = match self.column_index(name) {
            Some(index) => (index, false),
            None => {
                self.header.push(name.to_string());
                (self.header.len() - 1, true)
            }
        };
        self.pad_rows();
        (ColumnHandle { name: name.to_string(), index }, added)
    }

    fn pad_rows(&mut self) {
        let width = self.header.len();
        for row in &mut self.rows {
            if row.len() < width {
                row.resize(width, String::new());
            }
        }
    }

    pub fn cell(&self, row: usize, column: &ColumnHandle) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(column.index)).map(String::as_str)
    }

    /// Overwrites one cell. Rows are padded by `resolve_column`, but a row is
    /// still extended here if a caller built the table by hand.
    pub fn set_cell(&mut self, row: usize, column: &ColumnHandle, value: String) {
        if let Some(fields) = self.rows.get_mut(row) {
            if fields.len() <= column.index {
                fields.resize(column.index + 1, String::new());
            }
            fields[column.index] = value;
        }
    }
}
