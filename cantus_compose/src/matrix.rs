// A 2-D float table addressed by string row/column labels.
//
// Rows and columns grow lazily as new labels are observed during training;
// adding a column appends a default value to every existing row, so every
// row vector always has exactly one entry per column. Label maps are
// BTreeMaps: iteration order over labels is lexicographic and therefore
// deterministic, which matters because weighted sampling walks rows in
// label order.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct NamedMatrix {
    matrix: Vec<Vec<f64>>,
    rows: BTreeMap<String, usize>,
    columns: BTreeMap<String, usize>,
}

impl NamedMatrix {
    pub fn new() -> Self {
        NamedMatrix::default()
    }

    /// A matrix pre-filled with the given labels and one value.
    pub fn with_labels(rows: &[&str], columns: &[&str], value: f64) -> Self {
        let mut m = NamedMatrix::new();
        for column in columns {
            m.add_column(column, value);
        }
        for row in rows {
            m.add_row(row, value);
        }
        m
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.iter().all(Vec::is_empty)
    }

    pub fn is_row(&self, row: &str) -> bool {
        self.rows.contains_key(row)
    }

    pub fn is_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Add a row filled with `value`. Existing labels are left untouched.
    pub fn add_row(&mut self, row: &str, value: f64) {
        if self.rows.contains_key(row) {
            return;
        }
        self.rows.insert(row.to_string(), self.matrix.len());
        self.matrix.push(vec![value; self.columns.len()]);
    }

    /// Add a column filled with `value`, extending every existing row.
    pub fn add_column(&mut self, column: &str, value: f64) {
        if self.columns.contains_key(column) {
            return;
        }
        self.columns.insert(column.to_string(), self.columns.len());
        for row in &mut self.matrix {
            row.push(value);
        }
    }

    /// Cell accessor. Panics on unknown labels; existence is the caller's
    /// concern, checked with `is_row`/`is_column`.
    pub fn at(&self, row: &str, column: &str) -> f64 {
        self.matrix[self.rows[row]][self.columns[column]]
    }

    pub fn at_mut(&mut self, row: &str, column: &str) -> &mut f64 {
        &mut self.matrix[self.rows[row]][self.columns[column]]
    }

    /// A row as (column label, value) pairs in lexicographic column order.
    pub fn get(&self, row: &str) -> Vec<(String, f64)> {
        let r = &self.matrix[self.rows[row]];
        self.columns
            .iter()
            .map(|(label, &idx)| (label.clone(), r[idx]))
            .collect()
    }

    pub fn row_sum(&self, row: &str) -> f64 {
        self.matrix[self.rows[row]].iter().sum()
    }

    /// Divide every row by its sum. Zero-sum rows are left untouched.
    pub fn normalize_rows(&mut self) {
        for row in &mut self.matrix {
            let sum: f64 = row.iter().sum();
            if sum != 0.0 {
                for cell in row.iter_mut() {
                    *cell /= sum;
                }
            }
        }
    }

    pub fn drop_row(&mut self, row: &str) -> bool {
        let Some(idx) = self.rows.remove(row) else {
            return false;
        };
        self.matrix.remove(idx);
        for i in self.rows.values_mut() {
            if *i > idx {
                *i -= 1;
            }
        }
        true
    }

    pub fn drop_column(&mut self, column: &str) -> bool {
        let Some(idx) = self.columns.remove(column) else {
            return false;
        };
        for row in &mut self.matrix {
            row.remove(idx);
        }
        for i in self.columns.values_mut() {
            if *i > idx {
                *i -= 1;
            }
        }
        true
    }

    /// All row labels, lexicographically ordered.
    pub fn row_labels(&self) -> Vec<String> {
        self.rows.keys().cloned().collect()
    }

    /// All column labels, lexicographically ordered.
    pub fn column_labels(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    /// Write the matrix as CSV: a header of quoted column labels behind an
    /// `x` corner cell, then one quoted-label-prefixed line per row.
    ///
    /// Refuses to overwrite an existing file.
    pub fn to_csv(&self, path: &Path, sep: char) -> Result<()> {
        if path.exists() {
            return Err(Error::FileExists(path.to_path_buf()));
        }
        let mut file =
            std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
        let mut out = String::from("x");
        for label in self.columns.keys() {
            out.push(sep);
            out.push_str(&format!(" \"{label}\""));
        }
        for label in self.rows.keys() {
            out.push_str(&format!("\n\"{label}\""));
            for column in self.columns.keys() {
                out.push(sep);
                out.push_str(&format!(" {}", self.at(label, column)));
            }
        }
        file.write_all(out.as_bytes())
            .map_err(|e| Error::io(path, e))?;
        Ok(())
    }

    /// Parse a matrix from the CSV format written by [`Self::to_csv`].
    ///
    /// Quoted tokens may contain the separator; blank lines are skipped.
    pub fn from_csv(path: &Path, sep: char) -> Result<NamedMatrix> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let csv_err = |reason: String| Error::Csv {
            path: path.to_path_buf(),
            reason,
        };

        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let mut matrix = NamedMatrix::new();

        let Some(header) = lines.next() else {
            return Ok(matrix);
        };
        let mut names = split_on(header, sep);
        if names.is_empty() {
            return Err(csv_err("missing header".into()));
        }
        names.remove(0); // corner cell
        for name in &names {
            matrix.add_column(unquote(name), 0.0);
        }

        for line in lines {
            let mut values = split_on(line, sep);
            if values.is_empty() {
                continue;
            }
            let name = unquote(&values.remove(0)).to_string();
            if values.len() != matrix.columns.len() {
                return Err(csv_err(format!(
                    "row '{name}' has {} values, expected {}",
                    values.len(),
                    matrix.columns.len()
                )));
            }
            matrix.add_row(&name, 0.0);
            let idx = matrix.rows[&name];
            for (col, value) in values.iter().enumerate() {
                matrix.matrix[idx][col] = value
                    .parse::<f64>()
                    .map_err(|_| csv_err(format!("bad number '{value}' in row '{name}'")))?;
            }
        }
        Ok(matrix)
    }
}

/// Split a line on a separator, ignoring separators inside quoted tokens and
/// dropping whitespace outside them.
pub fn split_on(s: &str, sep: char) -> Vec<String> {
    let mut result = Vec::new();
    let mut in_string = false;
    let mut current = String::new();
    for k in s.chars() {
        if k == sep {
            if !in_string {
                result.push(std::mem::take(&mut current));
                continue;
            }
        } else if k == '"' {
            in_string = current.is_empty();
        }
        if in_string || !k.is_whitespace() {
            current.push(k);
        }
    }
    result.push(current);
    result
}

/// Strip one layer of surrounding quotes, if present.
fn unquote(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NamedMatrix {
        let mut m = NamedMatrix::new();
        m.add_column("C4", 0.0);
        m.add_column("D4", 0.0);
        m.add_row("begin", 0.0);
        m.add_row("C4", 0.0);
        *m.at_mut("begin", "C4") = 2.0;
        *m.at_mut("C4", "D4") = 1.5;
        m
    }

    #[test]
    fn rows_track_column_growth() {
        let mut m = sample();
        m.add_column("E4", 0.5);
        assert_eq!(m.at("begin", "E4"), 0.5);
        assert_eq!(m.at("C4", "E4"), 0.5);
        assert_eq!(m.get("begin").len(), 3);
    }

    #[test]
    fn add_is_idempotent() {
        let mut m = sample();
        *m.at_mut("begin", "C4") = 7.0;
        m.add_row("begin", 0.0);
        m.add_column("C4", 0.0);
        assert_eq!(m.at("begin", "C4"), 7.0);
    }

    #[test]
    fn get_returns_sorted_pairs() {
        let m = sample();
        let row = m.get("begin");
        assert_eq!(row[0], ("C4".to_string(), 2.0));
        assert_eq!(row[1], ("D4".to_string(), 0.0));
    }

    #[test]
    fn row_sum_and_normalize() {
        let mut m = sample();
        *m.at_mut("begin", "D4") = 6.0;
        assert_eq!(m.row_sum("begin"), 8.0);
        m.normalize_rows();
        assert!((m.at("begin", "C4") - 0.25).abs() < 1e-12);
        assert!((m.at("begin", "D4") - 0.75).abs() < 1e-12);
        // The zero row stays untouched.
        assert_eq!(m.row_sum("C4"), 1.0);
    }

    #[test]
    fn drop_row_and_column() {
        let mut m = sample();
        assert!(m.drop_column("C4"));
        assert!(!m.is_column("C4"));
        assert_eq!(m.get("begin").len(), 1);
        assert_eq!(m.at("C4", "D4"), 1.5);

        assert!(m.drop_row("begin"));
        assert!(!m.is_row("begin"));
        assert_eq!(m.at("C4", "D4"), 1.5);

        assert!(!m.drop_row("nope"));
        assert!(!m.drop_column("nope"));
    }

    #[test]
    fn split_on_respects_quotes() {
        let parts = split_on("\"a,b\", 1, 2", ',');
        assert_eq!(parts, vec!["\"a,b\"", "1", "2"]);
    }

    #[test]
    fn csv_roundtrip_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.csv");
        let mut m = sample();
        m.add_column("rest", 0.0);
        *m.at_mut("C4", "rest") = 0.125;
        m.to_csv(&path, ',').unwrap();

        let back = NamedMatrix::from_csv(&path, ',').unwrap();
        assert_eq!(back.row_labels(), m.row_labels());
        assert_eq!(back.column_labels(), m.column_labels());
        for row in m.row_labels() {
            for col in m.column_labels() {
                assert!((back.at(&row, &col) - m.at(&row, &col)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn to_csv_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.csv");
        let m = sample();
        m.to_csv(&path, ',').unwrap();
        assert!(matches!(
            m.to_csv(&path, ','),
            Err(Error::FileExists(_))
        ));
    }

    #[test]
    fn from_csv_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.csv");
        std::fs::write(&path, "x, \"A\"\n\n\"r\", 1.5\n\n").unwrap();
        let m = NamedMatrix::from_csv(&path, ',').unwrap();
        assert_eq!(m.at("r", "A"), 1.5);
    }

    #[test]
    fn from_csv_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.csv");
        std::fs::write(&path, "x, \"A\", \"B\"\n\"r\", 1.0\n").unwrap();
        assert!(NamedMatrix::from_csv(&path, ',').is_err());
    }

    #[test]
    fn from_csv_missing_file_is_an_error() {
        assert!(NamedMatrix::from_csv(Path::new("/nonexistent/m.csv"), ',').is_err());
    }
}
