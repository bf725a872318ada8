use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use polars::prelude::{Column as PlColumn, CsvWriter, DataFrame, SerWriter};
use tracing::{info, trace};

use crate::dataset::ResultSet;
use crate::domain::ViewerError;

pub const DEFAULT_EXPORT_FILE: &str = "table_data.csv";

/// Builds a string frame holding the given rows, Null values stay missing.
fn to_frame(result: &ResultSet, rows: &[usize]) -> Result<DataFrame, ViewerError> {
    let columns = result
        .columns()
        .iter()
        .enumerate()
        .map(|(cidx, name)| {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|&ridx| {
                    result.rows()[ridx]
                        .get(cidx)
                        .filter(|v| !v.is_null())
                        .map(|v| v.to_string())
                })
                .collect();
            PlColumn::new(name.as_str().into(), values)
        })
        .collect::<Vec<PlColumn>>();
    Ok(DataFrame::new(columns)?)
}

/// Writes a header line and every row listed in `rows` as csv.
pub fn export_csv<W: Write>(
    result: &ResultSet,
    rows: &[usize],
    writer: &mut W,
) -> Result<usize, ViewerError> {
    if result.columns().is_empty() {
        return Ok(0);
    }
    let mut df = to_frame(result, rows)?;
    CsvWriter::new(writer).include_header(true).finish(&mut df)?;
    trace!("Serialized {} rows as csv", rows.len());
    Ok(rows.len())
}

/// Quotes a single csv field when it holds a separator, a quote or a line break.
pub fn quote_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Expands `~` and environment variables in an export path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}

pub fn export_to_file(
    result: &ResultSet,
    rows: &[usize],
    path: &Path,
) -> Result<(PathBuf, usize), ViewerError> {
    let target = expand_path(path);
    let mut file = File::create(&target)?;
    let written = export_csv(result, rows, &mut file)?;
    file.flush()?;
    info!("Exported {} rows to {}", written, target.display());
    Ok((target, written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Datasets, Row, TableName, Value};
    use crate::view::filter_rows;
    use polars::prelude::*;

    fn read_back(path: &Path) -> DataFrame {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
            .unwrap()
            .collect()
            .unwrap()
    }

    #[test]
    fn export_contains_header_and_filtered_rows() {
        let categories = Datasets::load().unwrap().table(TableName::Categories).clone();
        let rows = filter_rows(&categories, "bread");
        let mut out = Vec::new();
        let written = export_csv(&categories, &rows, &mut out).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "categoryID,categoryName,description");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("\"Desserts, candies, and sweet breads\""));
    }

    #[test]
    fn export_quotes_special_values() {
        let result = ResultSet::new(
            vec!["a".into(), "b".into()],
            vec![Row {
                values: vec![Value::Text("say \"hi\"".into()), Value::Text("x\ny".into())],
            }],
        );
        let mut out = Vec::new();
        export_csv(&result, &[0], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"say \"\"hi\"\"\""));
        assert!(text.contains("\"x\ny\""));
    }

    #[test]
    fn nulls_are_empty_fields() {
        let result = ResultSet::new(
            vec!["a".into(), "b".into()],
            vec![Row {
                values: vec![Value::Int(1), Value::Null],
            }],
        );
        let mut out = Vec::new();
        export_csv(&result, &[0], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1), Some("1,"));
    }

    #[test]
    fn file_round_trip_keeps_rows_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_EXPORT_FILE);
        let products = Datasets::load().unwrap().table(TableName::Products).clone();
        let rows = filter_rows(&products, "bottles");

        let (target, written) = export_to_file(&products, &rows, &path).unwrap();
        assert_eq!(target, path);
        assert_eq!(written, rows.len());

        let df = read_back(&path);
        assert_eq!(df.height(), rows.len());
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, products.columns());
    }

    #[test]
    fn quote_cell_rules() {
        assert_eq!(quote_cell("Chai"), "Chai");
        assert_eq!(quote_cell("a, b"), "\"a, b\"");
        assert_eq!(quote_cell("5\" disk"), "\"5\"\" disk\"");
        assert_eq!(quote_cell("x\ny"), "\"x\ny\"");
    }

    #[test]
    fn empty_result_writes_nothing() {
        let mut out = Vec::new();
        assert_eq!(export_csv(&ResultSet::empty(), &[], &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }
}
