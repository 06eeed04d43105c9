//! A minimal string table for the CSV/TSV sheets handled by the metadata tools.
//!
//! Cells are strings; an empty cell is a missing value. Only the handful of
//! relational operations the metadata merge needs are provided.
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;

use crate::errors::Error;

/// Values treated as missing when reading sheets.
const NA_VALUES: &[&str] = &["NA", "NaN", "nan", "N/A", "destroyed", "missed"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

/// Delimiter implied by a file extension: tab for `.tsv`, `.txt` and `.pcl`,
/// comma otherwise.
pub fn delimiter_for<P: AsRef<Path>>(path: P) -> u8 {
    match path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("tsv") | Some("txt") | Some("pcl") | Some("tab") => b'\t',
        _ => b',',
    }
}

/// Repeated column names get a `.<k>` suffix (`a`, `a.1`, `a.2`), so no
/// column of an exported sheet is lost.
fn unique_names(columns: Vec<String>) -> Vec<String> {
    let given: HashSet<String> = columns.iter().cloned().collect();
    let mut seen = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();
    columns
        .into_iter()
        .map(|col| {
            let mut name = col.clone();
            while seen.contains(&name) || (name != col && given.contains(&name)) {
                let k = repeats.entry(col.clone()).or_insert(0);
                *k += 1;
                name = format!("{}.{}", col, k);
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        let mut table = Table::default();
        for col in unique_names(columns) {
            table.add_column(&col);
        }
        table
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut table = Table::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn from_reader<R: io::Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);
        let header = reader
            .headers()?
            .iter()
            .enumerate()
            // unnamed leading index columns written by other tools
            .map(|(i, h)| match h.trim() {
                "" => format!("Unnamed: {}", i),
                h => h.to_owned(),
            })
            .collect_vec();
        let mut table = Table::new(header);
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            table.push_row(
                record
                    .iter()
                    .map(|v| {
                        let v = v.trim();
                        if NA_VALUES.contains(&v) {
                            String::new()
                        } else {
                            v.to_owned()
                        }
                    })
                    .collect(),
            );
        }
        Ok(table)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let delimiter = delimiter_for(&path);
        Self::from_path_with_delimiter(path, delimiter)
    }

    pub fn from_path_with_delimiter<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let file = File::open(&path)
            .with_context(|| format!("could not open table {}", path.as_ref().display()))?;
        Self::from_reader(file, delimiter)
            .with_context(|| format!("could not parse table {}", path.as_ref().display()))
    }

    pub fn to_writer<W: io::Write>(&self, writer: W, delimiter: u8, na: &str) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| if v.is_empty() { na } else { v.as_str() }))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let delimiter = delimiter_for(&path);
        self.to_path_with_delimiter(path, delimiter, "")
    }

    pub fn to_path_with_delimiter<P: AsRef<Path>>(
        &self,
        path: P,
        delimiter: u8,
        na: &str,
    ) -> Result<()> {
        let file = File::create(&path)
            .with_context(|| format!("could not create {}", path.as_ref().display()))?;
        self.to_writer(file, delimiter, na)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
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

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    pub fn col_index(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn require_column(&self, column: &str, table: &str) -> Result<usize, Error> {
        self.col_index(column).ok_or_else(|| Error::MissingColumn {
            column: column.to_owned(),
            table: table.to_owned(),
        })
    }

    /// Cell value, empty when the column does not exist.
    pub fn get(&self, row: usize, column: &str) -> &str {
        self.col_index(column)
            .map(|i| self.rows[row][i].as_str())
            .unwrap_or("")
    }

    /// Sets a cell, adding the column when needed.
    pub fn set(&mut self, row: usize, column: &str, value: impl Into<String>) {
        let i = self.add_column(column);
        self.rows[row][i] = value.into();
    }

    pub fn row(&self, row: usize) -> Row<'_> {
        Row { table: self, idx: row }
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.len()).map(move |idx| Row { table: self, idx })
    }

    /// Adds an empty column if missing and returns its index.
    pub fn add_column(&mut self, column: &str) -> usize {
        if let Some(i) = self.index.get(column) {
            return *i;
        }
        self.columns.push(column.to_owned());
        self.index.insert(column.to_owned(), self.columns.len() - 1);
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.columns.len() - 1
    }

    /// Appends a row, padding or truncating it to the table width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    /// Appends a row given as column/value pairs; unknown columns are added.
    pub fn push_record<I, K, V>(&mut self, record: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.rows.push(vec![String::new(); self.columns.len()]);
        let last = self.rows.len() - 1;
        for (col, value) in record {
            self.set(last, col.as_ref(), value);
        }
    }

    pub fn column_values(&self, column: &str) -> Vec<&str> {
        match self.col_index(column) {
            Some(i) => self.rows.iter().map(|r| r[i].as_str()).collect(),
            None => vec![""; self.len()],
        }
    }

    /// Distinct non-empty values of a column in order of appearance.
    pub fn unique(&self, column: &str) -> Vec<String> {
        self.column_values(column)
            .into_iter()
            .filter(|v| !v.is_empty())
            .unique()
            .map(|v| v.to_owned())
            .collect()
    }

    /// Applies `f` to every cell of a column, adding the column if missing.
    pub fn map_column<F>(&mut self, column: &str, mut f: F)
    where
        F: FnMut(Row<'_>) -> String,
    {
        let i = self.add_column(column);
        let values = (0..self.len()).map(|idx| f(self.row(idx))).collect_vec();
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[i] = value;
        }
    }

    pub fn filter<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(Row<'_>) -> bool,
    {
        let selected = (0..self.len()).filter(|&idx| keep(self.row(idx))).collect_vec();
        self.select_rows(&selected)
    }

    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            index: self.index.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Keeps the given columns (in the given order) that exist.
    pub fn select_columns(&self, columns: &[&str]) -> Table {
        let keep = columns
            .iter()
            .filter_map(|c| self.col_index(c).map(|i| (c.to_string(), i)))
            .collect_vec();
        Table::from_rows(
            keep.iter().map(|(c, _)| c.clone()).collect(),
            self.rows
                .iter()
                .map(|row| keep.iter().map(|(_, i)| row[*i].clone()).collect())
                .collect(),
        )
    }

    /// Appends the rows of `other`; the column set becomes the union of both.
    pub fn concat(&mut self, other: &Table) {
        for col in &other.columns {
            self.add_column(col);
        }
        let mapping = other
            .columns
            .iter()
            .map(|c| self.index[c.as_str()])
            .collect_vec();
        for row in &other.rows {
            let mut new_row = vec![String::new(); self.columns.len()];
            for (value, &i) in row.iter().zip(&mapping) {
                new_row[i] = value.clone();
            }
            self.rows.push(new_row);
        }
    }

    /// Left join on `left_on == right_on`. Columns present on both sides keep
    /// the left value unless it is missing. Right rows matching several
    /// times multiply the left row.
    pub fn left_join(&self, other: &Table, left_on: &[&str], right_on: &[&str]) -> Table {
        let mut right_index: HashMap<Vec<&str>, Vec<usize>> = HashMap::new();
        for idx in 0..other.len() {
            let key = right_on.iter().map(|c| other.get(idx, c)).collect_vec();
            if key.iter().all(|k| !k.is_empty()) {
                right_index.entry(key).or_insert_with(Vec::new).push(idx);
            }
        }

        let mut joined = Table::new(self.columns.clone());
        for col in &other.columns {
            joined.add_column(col);
        }
        let right_cols = other.columns.iter().map(|c| joined.index[c.as_str()]).collect_vec();

        for (idx, row) in self.rows.iter().enumerate() {
            let key = left_on.iter().map(|c| self.get(idx, c)).collect_vec();
            let mut base = row.clone();
            base.resize(joined.columns.len(), String::new());
            match right_index.get(&key) {
                Some(matches) => {
                    for &m in matches {
                        let mut new_row = base.clone();
                        for (value, &i) in other.rows[m].iter().zip(&right_cols) {
                            if new_row[i].is_empty() {
                                new_row[i] = value.clone();
                            }
                        }
                        joined.rows.push(new_row);
                    }
                }
                None => joined.rows.push(base),
            }
        }
        joined
    }

    /// Overwrites cells with the non-missing values of `other` for rows with
    /// equal keys. Columns only present in `other` are added.
    pub fn update(&mut self, other: &Table, keys: &[&str]) {
        let mut other_index: HashMap<Vec<String>, usize> = HashMap::new();
        for idx in 0..other.len() {
            let key = keys
                .iter()
                .map(|c| normalize_key(other.get(idx, c)))
                .collect_vec();
            other_index.entry(key).or_insert(idx);
        }
        let value_cols = other
            .columns
            .iter()
            .filter(|c| !keys.contains(&c.as_str()))
            .cloned()
            .collect_vec();
        for col in &value_cols {
            self.add_column(col);
        }
        for idx in 0..self.len() {
            let key = keys
                .iter()
                .map(|c| normalize_key(self.get(idx, c)))
                .collect_vec();
            if let Some(&m) = other_index.get(&key) {
                for col in &value_cols {
                    let value = other.get(m, col);
                    if !value.is_empty() {
                        self.set(idx, col, value);
                    }
                }
            }
        }
    }

    pub fn drop_columns(&mut self, columns: &[&str]) {
        let drop: HashSet<&str> = columns.iter().copied().collect();
        let keep = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !drop.contains(c.as_str()))
            .map(|(i, _)| i)
            .collect_vec();
        if keep.len() == self.columns.len() {
            return;
        }
        let columns = keep.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
            .collect();
        *self = Table::from_rows(columns, rows);
    }

    pub fn rename_columns(&mut self, mapping: &HashMap<String, String>) {
        let columns = self
            .columns
            .iter()
            .map(|c| mapping.get(c).cloned().unwrap_or_else(|| c.clone()))
            .collect_vec();
        let rows = std::mem::take(&mut self.rows);
        *self = Table::from_rows(columns, rows);
    }

    /// Moves the listed (existing) columns to the front in the given order.
    pub fn reorder_columns(&mut self, front: &[String]) {
        let mut order = front
            .iter()
            .filter_map(|c| self.col_index(c))
            .unique()
            .collect_vec();
        let placed: HashSet<usize> = order.iter().copied().collect();
        order.extend((0..self.columns.len()).filter(|i| !placed.contains(i)));
        let columns = order.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| order.iter().map(|&i| row[i].clone()).collect())
            .collect();
        *self = Table::from_rows(columns, rows);
    }

    /// Stable sort by the given columns. Numeric cells compare numerically,
    /// missing values sort last.
    pub fn sort_by_columns(&mut self, columns: &[&str]) {
        let idx = columns.iter().filter_map(|c| self.col_index(c)).collect_vec();
        self.rows.sort_by(|a, b| {
            idx.iter()
                .map(|&i| compare_cells(&a[i], &b[i]))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    /// Removes rows with repeated keys keeping the first or the last.
    pub fn drop_duplicates(&mut self, keys: &[&str], keep_last: bool) {
        let key_of = |table: &Table, idx: usize| {
            keys.iter().map(|c| table.get(idx, c).to_owned()).collect_vec()
        };
        let mut seen = HashSet::new();
        let mut keep = vec![false; self.len()];
        let order: Box<dyn Iterator<Item = usize>> = if keep_last {
            Box::new((0..self.len()).rev())
        } else {
            Box::new(0..self.len())
        };
        for idx in order {
            if seen.insert(key_of(self, idx)) {
                keep[idx] = true;
            }
        }
        let rows = std::mem::take(&mut self.rows);
        self.rows = rows
            .into_iter()
            .zip(keep)
            .filter(|(_, k)| *k)
            .map(|(r, _)| r)
            .collect();
    }

    /// Promotes the first data row to the header, as needed for sheets whose
    /// exported header is a banner line.
    pub fn reset_column_headers(&self) -> Table {
        match self.rows.first() {
            Some(header) => Table::from_rows(header.clone(), self.rows[1..].to_vec()),
            None => self.clone(),
        }
    }
}

/// Numeric keys are compared by value so that `3` and `3.0` join.
fn normalize_key(value: &str) -> String {
    match value.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        _ => value.to_owned(),
    }
}

pub fn compare_cells(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    // numbers first, then text
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

/// Borrowed view of one table row.
#[derive(Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    idx: usize,
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> &'a str {
        self.table.get(self.idx, column)
    }

    pub fn opt(&self, column: &str) -> Option<&'a str> {
        Some(self.get(column)).filter(|v| !v.is_empty())
    }

    pub fn index(&self) -> usize {
        self.idx
    }

    pub fn values(&self) -> &'a [String] {
        &self.table.rows[self.idx]
    }

    pub fn describe(&self) -> String {
        self.table
            .columns
            .iter()
            .zip(self.values())
            .filter(|(_, v)| !v.is_empty())
            .map(|(c, v)| format!("{}={}", c, v))
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> Table {
        Table::from_reader(csv.as_bytes(), b',').unwrap()
    }

    #[test]
    fn test_na_values_are_missing() {
        let t = table("a,b\n1,NA\ndestroyed,2\n");
        assert_eq!(t.get(0, "b"), "");
        assert_eq!(t.get(1, "a"), "");
    }

    #[test]
    fn test_left_join_coalesces() {
        let left = table("id,x,shared\n1,a,\n2,b,keep\n3,c,\n");
        let right = table("key,y,shared\n1,r1,fill\n2,r2,lose\n2,r3,lose\n");
        let joined = left.left_join(&right, &["id"], &["key"]);
        assert_eq!(joined.len(), 4);
        assert_eq!(joined.get(0, "shared"), "fill");
        assert_eq!(joined.get(1, "shared"), "keep");
        assert_eq!(joined.get(2, "y"), "r3");
        assert_eq!(joined.get(3, "y"), "");
    }

    #[test]
    fn test_concat_union_of_columns() {
        let mut t = table("a,b\n1,2\n");
        t.concat(&table("b,c\n3,4\n"));
        assert_eq!(t.columns(), &["a", "b", "c"]);
        assert_eq!(t.rows()[1], vec!["", "3", "4"]);
    }

    #[test]
    fn test_update_and_add_columns() {
        let mut t = table("id,v\n1,a\n2,b\n");
        t.update(&table("id,v,w\n2.0,z,q\n1,,r\n"), &["id"]);
        assert_eq!(t.column_values("v"), vec!["a", "z"]);
        assert_eq!(t.column_values("w"), vec!["r", "q"]);
    }

    #[test]
    fn test_drop_duplicates_keep_last() {
        let mut t = table("k,v\n1,a\n2,b\n1,c\n");
        t.drop_duplicates(&["k"], true);
        assert_eq!(t.column_values("v"), vec!["b", "c"]);
        let mut t = table("k,v\n1,a\n2,b\n1,c\n");
        t.drop_duplicates(&["k"], false);
        assert_eq!(t.column_values("v"), vec!["a", "b"]);
    }

    #[test]
    fn test_sort_numeric_and_missing_last() {
        let mut t = table("k,v\n10,1\n,2\n9,3\nb,4\na,5\n");
        t.sort_by_columns(&["k"]);
        assert_eq!(t.column_values("k"), vec!["9", "10", "a", "b", ""]);
        assert_eq!(t.column_values("v"), vec!["3", "1", "5", "4", "2"]);
    }

    #[test]
    fn test_repeated_header_names() {
        let t = table("a,b,a,c,a.1\n1,2,3,4,5\n");
        assert_eq!(t.columns(), &["a", "b", "a.2", "c", "a.1"]);
        assert_eq!(t.get(0, "c"), "4");
        assert_eq!(t.get(0, "a.2"), "3");
        assert_eq!(t.get(0, "a.1"), "5");
    }

    #[test]
    fn test_compare_cells_is_total() {
        assert_eq!(compare_cells("9", "10"), Ordering::Less);
        assert_eq!(compare_cells("10", "1a"), Ordering::Less);
        assert_eq!(compare_cells("1a", "9"), Ordering::Greater);
        assert_eq!(compare_cells("NaN", "1"), Ordering::Greater);
        assert_eq!(compare_cells("NaN", "NaN"), Ordering::Equal);
        assert_eq!(compare_cells("3", "3.0"), Ordering::Equal);

        let mut t = Table::from_rows(
            vec!["k".to_owned()],
            ["1a", "10", "NaN", "9", "", "b"].iter().map(|v| vec![v.to_string()]).collect(),
        );
        t.sort_by_columns(&["k"]);
        assert_eq!(t.column_values("k"), vec!["9", "10", "NaN", "1a", "b", ""]);
    }

    #[test]
    fn test_reset_column_headers() {
        let t = table("Unnamed: 0,x\n# Feature,S1\nk__Bacteria,1\n").reset_column_headers();
        assert_eq!(t.columns(), &["# Feature", "S1"]);
        assert_eq!(t.rows(), &[vec!["k__Bacteria".to_owned(), "1".to_owned()]]);
        assert_eq!(Table::default().reset_column_headers(), Table::default());
    }

    #[test]
    fn test_reorder_and_drop() {
        let mut t = table("a,b,c\n1,2,3\n");
        t.reorder_columns(&["c".to_owned(), "missing".to_owned()]);
        assert_eq!(t.columns(), &["c", "a", "b"]);
        t.drop_columns(&["a"]);
        assert_eq!(t.rows()[0], vec!["3", "2"]);
    }
}
