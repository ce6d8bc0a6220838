//! Render-in-place over a checked-out tree.
//!
//! Only regular files directly inside first-level directories are considered:
//!
//! ```text
//! <dest>/
//!   README.md          not rendered (top level)
//!   .git/              skipped
//!   conf/app.env       rendered
//!   conf/nested/x.env  not rendered (second level)
//! ```
//!
//! Symlinks are never followed. Files that are not UTF-8 are left untouched
//! and reported as skipped.

use std::path::{Path, PathBuf};

use pokeme_renderer::{has_placeholders, SecretRenderer};

use crate::error::{io_err, CloneError};
use crate::writer::atomic_write;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    /// Files rewritten with substituted content.
    pub rendered: Vec<PathBuf>,
    /// Files left as-is because they are not UTF-8 text.
    pub skipped: Vec<PathBuf>,
}

/// Sorted entries of `dir` that satisfy `keep`, judged without following symlinks.
fn entries(
    dir: &Path,
    keep: impl Fn(&std::fs::FileType) -> bool,
) -> Result<Vec<PathBuf>, CloneError> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let file_type = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
        if keep(&file_type) {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

pub fn render_tree(root: &Path, renderer: &SecretRenderer) -> Result<RenderSummary, CloneError> {
    let mut summary = RenderSummary::default();

    let dirs = entries(root, |t| t.is_dir())?;
    for dir in dirs.iter().filter(|d| d.file_name().is_some_and(|n| n != ".git")) {
        tracing::debug!(dir = %dir.display(), "scanning");
        for file in entries(dir, |t| t.is_file())? {
            render_file(root, &file, renderer, &mut summary)?;
        }
    }
    Ok(summary)
}

fn render_file(
    root: &Path,
    file: &Path,
    renderer: &SecretRenderer,
    summary: &mut RenderSummary,
) -> Result<(), CloneError> {
    let bytes = std::fs::read(file).map_err(|e| io_err(file, e))?;
    let Ok(source) = String::from_utf8(bytes) else {
        tracing::debug!(file = %file.display(), "not UTF-8, left untouched");
        summary.skipped.push(file.to_path_buf());
        return Ok(());
    };
    if !has_placeholders(&source) {
        return Ok(());
    }

    let name = file.strip_prefix(root).unwrap_or(file).to_string_lossy();
    let rendered = renderer
        .render(&name, &source)
        .map_err(|source| CloneError::Render {
            path: file.to_path_buf(),
            source,
        })?;
    atomic_write(file, rendered.as_bytes())?;
    tracing::debug!(file = %file.display(), "rendered");
    summary.rendered.push(file.to_path_buf());
    Ok(())
}
