//! Filesystem helpers shared by the downloader and the converter

use crate::requests::chapter::Chapter;
use crate::requests::{Error, Result};

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::fs;

/// Hidden sibling `path` is written to before being renamed into place
pub(crate) fn part_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".part");

    path.with_file_name(name)
}

/// Creates or replaces `path` with `contents`. Nothing ever appears under `path` unless all
/// of `contents` was written
pub(crate) async fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let part = part_path(path);

    if let Err(source) = fs::write(&part, contents).await {
        let _ = fs::remove_file(&part).await;

        return Err(Error::WriteError {
            path: path.to_owned(),
            source,
        });
    }

    rename_into_place(&part, path).await
}

/// Moves the finished `part` file over `path`. The part file is removed if that fails
pub(crate) async fn rename_into_place(part: &Path, path: &Path) -> Result<()> {
    if let Err(source) = fs::rename(part, path).await {
        let _ = fs::remove_file(part).await;

        return Err(Error::WriteError {
            path: path.to_owned(),
            source,
        });
    }

    Ok(())
}

/// Creates `dir` and its parents, doing nothing if it is already there
pub(crate) async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|source| Error::WriteError {
            path: dir.to_owned(),
            source,
        })
}

/// Turns a chapter or manga name into something usable as a directory name
pub fn sanitize_dir_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    sanitized.trim_matches(|c| c == '.' || c == ' ').to_string()
}

/// Directory a chapter is downloaded into: its sanitized name, or its id when nothing of the
/// name survives sanitizing
pub fn chapter_dir_name(chapter: &Chapter) -> String {
    match sanitize_dir_name(&chapter.name) {
        name if name.is_empty() => sanitize_dir_name(&chapter.id),
        name => name,
    }
}
