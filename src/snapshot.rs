//! CSV snapshot output.
//!
//! The column set is only known once every record has been seen: base
//! columns first, then each custom column in the order it first appeared.

use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, WriterBuilder};
use indexmap::IndexSet;

use crate::error::{ExportError, Result};
use crate::flatten::{BASE_COLUMNS, FlatRecord};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Accumulating column schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    custom: IndexSet<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the schema for a whole record sequence.
    pub fn collect<'a>(records: impl IntoIterator<Item = &'a FlatRecord>) -> Self {
        let mut schema = Self::new();
        for record in records {
            schema.observe(record);
        }
        schema
    }

    /// Add any custom column of `record` not seen before, at the end.
    pub fn observe(&mut self, record: &FlatRecord) {
        for key in record.custom.keys() {
            if !self.custom.contains(key) {
                self.custom.insert(key.clone());
            }
        }
    }

    pub fn custom_columns(&self) -> impl Iterator<Item = &str> {
        self.custom.iter().map(String::as_str)
    }

    pub fn has_column(&self, column: &str) -> bool {
        BASE_COLUMNS.contains(&column) || self.custom.contains(column)
    }

    /// Full header row: base columns, then custom columns.
    pub fn headers(&self) -> Vec<&str> {
        BASE_COLUMNS
            .iter()
            .copied()
            .chain(self.custom_columns())
            .collect()
    }

    /// One row of cells aligned with [`Schema::headers`]. Missing values are
    /// empty cells.
    pub fn row<'r>(&self, record: &'r FlatRecord) -> Vec<&'r str> {
        let custom = self
            .custom
            .iter()
            .map(|key| record.custom.get(key).map_or("", String::as_str));
        record
            .base_values()
            .into_iter()
            .map(|v| v.unwrap_or(""))
            .chain(custom)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Default output file name for a project.
pub fn default_file_name(project_number: u32) -> String {
    format!("project_{project_number}_export.csv")
}

/// Serialize records to `out` with every field quoted. Returns the number of
/// data rows written. A header row is written even when `records` is empty.
pub fn write_records<W: Write>(records: &[FlatRecord], out: W) -> csv::Result<usize> {
    let schema = Schema::collect(records);
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(out);

    writer.write_record(schema.headers())?;
    for record in records {
        writer.write_record(schema.row(record))?;
    }
    writer.flush()?;
    Ok(records.len())
}

/// Write records to a CSV file at `path`.
///
/// The data goes to a temporary sibling first and is renamed into place, so
/// a failure never leaves a truncated file at `path`.
pub fn write_csv(records: &[FlatRecord], path: &Path) -> Result<usize> {
    let tmp = temp_path(path);
    let file = std::fs::File::create(&tmp).map_err(|e| ExportError::io(path, e))?;

    let written = match write_records(records, std::io::BufWriter::new(file)) {
        Ok(n) => n,
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            return Err(ExportError::io(path, csv_to_io(e)));
        }
    };

    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        ExportError::io(path, e)
    })?;

    tracing::debug!("snapshot: wrote {written} rows to {}", path.display());
    Ok(written)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

fn csv_to_io(err: csv::Error) -> std::io::Error {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => e,
        other => std::io::Error::other(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, custom: &[(&str, &str)]) -> FlatRecord {
        FlatRecord {
            item_id: id.to_owned(),
            kind: Some("Issue".to_owned()),
            title: Some(format!("title {id}")),
            custom: custom
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            ..FlatRecord::default()
        }
    }

    #[test]
    fn schema_adds_columns_on_first_sight() {
        let records = vec![
            record("1", &[("field:Status", "Todo")]),
            record("2", &[("field:Points", "3"), ("field:Status", "Done")]),
            record("3", &[("field:Due", "2024-01-01")]),
        ];
        let schema = Schema::collect(&records);
        let custom: Vec<_> = schema.custom_columns().collect();
        assert_eq!(custom, vec!["field:Status", "field:Points", "field:Due"]);
    }

    #[test]
    fn headers_start_with_base_columns() {
        let schema = Schema::collect(&[record("1", &[("field:Status", "Todo")])]);
        let headers = schema.headers();
        assert_eq!(&headers[..BASE_COLUMNS.len()], &BASE_COLUMNS[..]);
        assert_eq!(headers.last(), Some(&"field:Status"));
        assert!(schema.has_column("labels"));
        assert!(!schema.has_column("field:Points"));
    }

    #[test]
    fn missing_custom_value_is_empty_cell() {
        let records = vec![
            record("1", &[("field:Status", "Todo")]),
            record("2", &[]),
        ];
        let schema = Schema::collect(&records);
        let row = schema.row(&records[1]);
        assert_eq!(row.len(), BASE_COLUMNS.len() + 1);
        assert_eq!(row.last(), Some(&""));
        assert_eq!(row[0], "2");
    }

    #[test]
    fn every_field_is_quoted() {
        let mut buf = Vec::new();
        let n = write_records(&[record("1", &[])], &mut buf).unwrap();
        assert_eq!(n, 1);
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("\"project_item_id\",\"type\","));
        assert!(lines.next().unwrap().starts_with("\"1\",\"Issue\",\"title 1\",\"\","));
    }

    #[test]
    fn empty_record_set_writes_header_only() {
        let mut buf = Vec::new();
        let n = write_records(&[], &mut buf).unwrap();
        assert_eq!(n, 0);
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn default_file_name_uses_project_number() {
        assert_eq!(default_file_name(3), "project_3_export.csv");
    }

    #[test]
    fn temp_path_is_sibling() {
        let tmp = temp_path(Path::new("/out/project_3_export.csv"));
        assert_eq!(tmp, Path::new("/out/project_3_export.csv.partial"));
    }
}
