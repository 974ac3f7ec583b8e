//! CSV dataset loading and preprocessing
//!
//! Training exports are read as text tables. Feature columns are the numeric
//! columns left after dropping the target, identifier and date columns; the
//! train and test tables are then aligned on the sorted intersection of their
//! feature columns.

use crate::errors::{Result, TrainerError};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Label column, 1 = churned
pub const TARGET_COLUMN: &str = "TARGET";

/// Columns never used as features
pub const EXCLUDED_COLUMNS: [&str; 4] = ["TARGET", "ID_CLIENTE", "FIRST_DATE", "LAST_DATE"];

/// Numeric reading of one cell; `None` for empty or non-numeric text
fn parse_numeric(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.replace(',', ".").parse::<f64>().ok()
}

/// Untyped table as read from disk
#[derive(Clone, Debug, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Load a delimited file. A missing file is `MissingInput`.
    pub fn from_csv<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TrainerError::MissingInput(path.to_path_buf()));
        }
        Self::from_reader(File::open(path)?, delimiter)
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(String::from).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Feature candidates: every non-excluded column whose non-empty cells
    /// all parse as numbers. An all-empty column counts as numeric.
    pub fn numeric_columns(&self) -> BTreeSet<String> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !EXCLUDED_COLUMNS.contains(&name.as_str()))
            .filter(|(idx, _)| {
                self.rows.iter().all(|row| {
                    let cell = row[*idx].trim();
                    cell.is_empty() || parse_numeric(cell).is_some()
                })
            })
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Labels from the `TARGET` column; each must read as 0 or 1
    pub fn targets(&self) -> Result<Vec<u8>> {
        let idx = self.column(TARGET_COLUMN).ok_or_else(|| {
            TrainerError::Validation(format!("missing {TARGET_COLUMN} column"))
        })?;

        self.rows
            .iter()
            .enumerate()
            .map(|(line, row)| match parse_numeric(&row[idx]) {
                Some(v) if v == 0.0 => Ok(0),
                Some(v) if v == 1.0 => Ok(1),
                _ => Err(TrainerError::Validation(format!(
                    "row {}: {TARGET_COLUMN} must be 0 or 1, got {:?}",
                    line + 1,
                    row[idx]
                ))),
            })
            .collect()
    }
}

/// Aligned feature matrix with binary labels
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<u8>,
    pub feature_names: Vec<String>,
}

impl Dataset {
    /// Project `table` onto `feature_names`; empty or non-finite cells become 0
    pub fn from_table(table: &RawTable, feature_names: &[String]) -> Result<Self> {
        let targets = table.targets()?;
        let columns: Vec<usize> = feature_names
            .iter()
            .map(|name| {
                table
                    .column(name)
                    .ok_or_else(|| TrainerError::Dataset(format!("missing feature column {name}")))
            })
            .collect::<Result<_>>()?;

        let features = table
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|&c| parse_numeric(&row[c]).filter(|v| v.is_finite()).unwrap_or(0.0))
                    .collect()
            })
            .collect();

        Ok(Self {
            features,
            targets,
            feature_names: feature_names.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    pub fn positive_count(&self) -> usize {
        self.targets.iter().filter(|&&t| t == 1).count()
    }

    /// Rows at `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
            feature_names: self.feature_names.clone(),
        }
    }
}

/// Align train and test tables on their shared numeric columns.
///
/// The canonical feature order is the sorted intersection of both tables'
/// numeric columns.
pub fn prepare_datasets(train: &RawTable, test: &RawTable) -> Result<(Dataset, Dataset)> {
    for (label, table) in [("train", train), ("test", test)] {
        if table.column(TARGET_COLUMN).is_none() {
            return Err(TrainerError::Validation(format!(
                "{label} data has no {TARGET_COLUMN} column"
            )));
        }
        if table.is_empty() {
            return Err(TrainerError::Dataset(format!("{label} data is empty")));
        }
    }

    let shared: Vec<String> = train
        .numeric_columns()
        .intersection(&test.numeric_columns())
        .cloned()
        .collect();
    if shared.is_empty() {
        return Err(TrainerError::Validation(
            "train and test data share no numeric feature columns".to_string(),
        ));
    }

    Ok((
        Dataset::from_table(train, &shared)?,
        Dataset::from_table(test, &shared)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> RawTable {
        RawTable::from_reader(text.as_bytes(), b',').unwrap()
    }

    #[test]
    fn test_numeric_column_detection() {
        let t = table(
            "ID_CLIENTE,TARGET,A,B,C,D,LAST_DATE\n\
             1,0,1,x,,\"2,5\",2025-01-01\n\
             2,1,2,3,,4,2025-01-02\n",
        );
        let cols: Vec<String> = t.numeric_columns().into_iter().collect();
        assert_eq!(cols, vec!["A", "C", "D"]);
    }

    #[test]
    fn test_targets_must_be_binary() {
        assert_eq!(table("TARGET\n0\n1\n1.0\n").targets().unwrap(), vec![0, 1, 1]);
        assert!(matches!(
            table("TARGET\n0\n2\n").targets(),
            Err(TrainerError::Validation(_))
        ));
        assert!(matches!(
            table("A\n0\n").targets(),
            Err(TrainerError::Validation(_))
        ));
    }

    #[test]
    fn test_prepare_aligns_on_sorted_intersection() {
        let train = table("TARGET,Z,A,ONLY_TRAIN\n0,1,,5\n1,2,3,6\n");
        let test = table("A,TARGET,Z,ONLY_TEST\n7,1,8,9\n");
        let (train_ds, test_ds) = prepare_datasets(&train, &test).unwrap();

        assert_eq!(train_ds.feature_names, vec!["A", "Z"]);
        assert_eq!(train_ds.features, vec![vec![0.0, 1.0], vec![3.0, 2.0]]);
        assert_eq!(test_ds.features, vec![vec![7.0, 8.0]]);
        assert_eq!(test_ds.targets, vec![1]);
    }

    #[test]
    fn test_prepare_requires_target() {
        let train = table("TARGET,A\n0,1\n");
        let test = table("A\n1\n");
        assert!(matches!(
            prepare_datasets(&train, &test),
            Err(TrainerError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = RawTable::from_csv("/nonexistent/train.csv", b',').unwrap_err();
        assert!(matches!(err, TrainerError::MissingInput(_)));
    }

    #[test]
    fn test_subset() {
        let ds = Dataset {
            features: vec![vec![1.0, 5.0], vec![3.0, -1.0], vec![2.0, 0.0]],
            targets: vec![0, 1, 1],
            feature_names: vec!["A".into(), "B".into()],
        };
        assert_eq!(ds.positive_count(), 2);
        let sub = ds.subset(&[2, 0]);
        assert_eq!(sub.targets, vec![1, 0]);
        assert_eq!(sub.features[0], vec![2.0, 0.0]);
    }
}
