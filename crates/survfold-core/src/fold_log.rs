//! Append-only per-fold result log (`<fold_dir>/log.txt`).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::domain::error::{Result, SurvfoldError};
use crate::domain::result::BestResult;

/// File name of the fold log inside the fold directory.
pub const LOG_FILE: &str = "log.txt";

/// Render the line appended at the end of a fold.
pub fn format_result_line(best: &BestResult) -> String {
    format!("result: {:.4}, epoch: {}\n", best.c_index, best.epoch)
}

/// Append one result line to the fold log, creating it if needed.
pub fn append_fold_result(path: &Path, best: &BestResult) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(SurvfoldError::filesystem(path))?;
    file.write_all(format_result_line(best).as_bytes())
        .map_err(SurvfoldError::filesystem(path))
}

/// Parse `result: <c_index>, epoch: <epoch>`.
pub fn parse_result_line(line: &str) -> Option<BestResult> {
    let (score, epoch) = line.trim().strip_prefix("result: ")?.split_once(", epoch: ")?;
    Some(BestResult::new(score.parse().ok()?, epoch.parse().ok()?))
}

/// Last recorded result of a fold; `None` when the log does not exist yet.
pub fn read_last_result(path: &Path) -> Result<Option<BestResult>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SurvfoldError::filesystem(path)(e)),
    };
    match content.lines().rev().find(|l| !l.trim().is_empty()) {
        None => Ok(None),
        Some(line) => parse_result_line(line)
            .map(Some)
            .ok_or_else(|| SurvfoldError::MalformedLog {
                path: path.to_path_buf(),
                line: line.to_string(),
            }),
    }
}
