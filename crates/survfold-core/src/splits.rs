//! Split identifier files (`splits_<fold>.csv`).
//!
//! Layout: an unnamed index column followed by one column per split.
//! Columns are aligned by position; a shorter column leaves its trailing
//! cells empty.
//!
//! ```text
//! ,train,val
//! 0,TCGA-05-4244,TCGA-05-4249
//! 1,TCGA-05-4250,
//! ```

use std::path::{Path, PathBuf};

use crate::domain::dataset::{Cohort, FoldDatasets};
use crate::domain::error::{Result, SurvfoldError};

/// Column keys used for a fold's splits.
pub const SPLIT_COLUMNS: [&str; 2] = ["train", "val"];

/// Identifier columns read back from a split file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitColumns {
    pub keys: Vec<String>,
    pub columns: Vec<Vec<String>>,
}

impl SplitColumns {
    /// Identifiers under `key`, if the file has that column.
    pub fn column(&self, key: &str) -> Option<&[String]> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|idx| self.columns[idx].as_slice())
    }
}

/// Write the sample identifiers of each split as one CSV column.
pub fn save_splits(datasets: &FoldDatasets, column_keys: &[&str], path: &Path) -> Result<()> {
    let splits = datasets.splits();
    if column_keys.len() != splits.len() {
        return Err(SurvfoldError::InvalidConfig(format!(
            "{} column keys for {} splits",
            column_keys.len(),
            splits.len()
        )));
    }

    let columns: Vec<Vec<&str>> = splits.iter().map(|s| s.case_ids().collect()).collect();
    let rows = columns.iter().map(Vec::len).max().unwrap_or(0);

    let mut w = csv::Writer::from_path(path).map_err(SurvfoldError::csv(path))?;
    let header = std::iter::once("").chain(column_keys.iter().copied());
    w.write_record(header).map_err(SurvfoldError::csv(path))?;
    for row in 0..rows {
        let mut record = vec![row.to_string()];
        record.extend(
            columns
                .iter()
                .map(|col| col.get(row).copied().unwrap_or_default().to_string()),
        );
        w.write_record(&record).map_err(SurvfoldError::csv(path))?;
    }
    w.flush().map_err(SurvfoldError::filesystem(path))?;
    Ok(())
}

/// Read a split file written by [`save_splits`].
///
/// Rows may omit trailing empty cells; a row wider than the header is an error.
pub fn load_splits(path: &Path) -> Result<SplitColumns> {
    let malformed = |reason: String| SurvfoldError::MalformedSplits {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(SurvfoldError::csv(path))?;

    let header = reader.headers().map_err(SurvfoldError::csv(path))?.clone();
    if header.is_empty() {
        return Err(malformed("missing header".to_string()));
    }
    if !header[0].is_empty() {
        return Err(malformed("first header cell must be the unnamed index".to_string()));
    }
    let keys: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

    let mut columns: Vec<Vec<String>> = vec![Vec::new(); keys.len()];
    for (lineno, record) in reader.records().enumerate() {
        let record = record.map_err(SurvfoldError::csv(path))?;
        if record.len() > keys.len() + 1 {
            return Err(malformed(format!(
                "row {} has {} cells, expected at most {}",
                lineno,
                record.len(),
                keys.len() + 1
            )));
        }
        for (column, cell) in columns.iter_mut().zip(record.iter().skip(1)) {
            if !cell.is_empty() {
                column.push(cell.to_string());
            }
        }
    }
    Ok(SplitColumns { keys, columns })
}

/// Resolves the datasets of a fold.
pub trait SplitProvider {
    fn load_fold(&self, fold: usize) -> anyhow::Result<FoldDatasets>;
}

/// Reads `<split_dir>/splits_<fold>.csv` and resolves ids against a cohort.
pub struct CsvSplitProvider {
    split_dir: PathBuf,
    cohort: Cohort,
}

impl CsvSplitProvider {
    pub fn new(split_dir: impl Into<PathBuf>, cohort: Cohort) -> Self {
        Self {
            split_dir: split_dir.into(),
            cohort,
        }
    }

    pub fn split_path(&self, fold: usize) -> PathBuf {
        self.split_dir.join(format!("splits_{}.csv", fold))
    }

    /// Like [`SplitProvider::load_fold`], with the domain error intact.
    pub fn resolve(&self, fold: usize) -> Result<FoldDatasets> {
        let path = self.split_path(fold);
        let columns = load_splits(&path)?;
        let [train_key, val_key] = SPLIT_COLUMNS;
        let column = |key: &str| {
            columns.column(key).ok_or_else(|| SurvfoldError::MalformedSplits {
                path: path.clone(),
                reason: format!("missing column {key}"),
            })
        };
        let train = self.cohort.select(train_key, column(train_key)?)?;
        let val = self.cohort.select(val_key, column(val_key)?)?;
        Ok(FoldDatasets::new(train, val))
    }
}

impl SplitProvider for CsvSplitProvider {
    fn load_fold(&self, fold: usize) -> anyhow::Result<FoldDatasets> {
        Ok(self.resolve(fold)?)
    }
}
