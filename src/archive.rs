//! Archiving of processed source files.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

use crate::error::{PipelineError, PipelineResult};

/// Move a processed file into the archive tree for `run_date`.
///
/// The destination is `archive_root/<YYYY>/<M>/<original filename>` (month
/// without zero padding), created as needed. Refuses to clobber an existing
/// same-named file and fails with [`PipelineError::MoveFailed`] in that case
/// or for any filesystem rejection. Returns the archived path.
pub fn archive_file(
    archive_root: &Path,
    path: &Path,
    run_date: NaiveDate,
) -> PipelineResult<PathBuf> {
    let filename = path
        .file_name()
        .ok_or_else(|| move_failed(path, archive_root, "source path has no filename"))?;

    let dir = archive_root
        .join(run_date.year().to_string())
        .join(run_date.month().to_string());
    fs::create_dir_all(&dir)
        .map_err(|e| move_failed(path, &dir, &format!("create archive dir: {e}")))?;

    let dest = dir.join(filename);
    if dest.exists() {
        return Err(move_failed(path, &dest, "destination already exists"));
    }

    move_file(path, &dest)?;
    Ok(dest)
}

/// Rename, with a copy+remove fallback when the archive tree lives on a
/// different filesystem than the drop folder.
fn move_file(from: &Path, to: &Path) -> PipelineResult<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) if rename_err.kind() == ErrorKind::CrossesDevices => {
            fs::copy(from, to).map_err(|e| move_failed(from, to, &format!("copy: {e}")))?;
            fs::remove_file(from)
                .map_err(|e| move_failed(from, to, &format!("remove source: {e}")))?;
            Ok(())
        }
        Err(rename_err) => Err(move_failed(from, to, &rename_err.to_string())),
    }
}

fn move_failed(from: &Path, to: &Path, message: &str) -> PipelineError {
    PipelineError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        message: message.to_string(),
    }
}
