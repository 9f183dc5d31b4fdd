//! Second pass over a chapter directory turning downloaded MRI containers into PNG files

use crate::batch::{BatchReport, FailurePolicy};
use crate::mri;
use crate::requests::{Error, Result};
use crate::storage;

use bon::Builder;
use image::ImageFormat;
use tokio::task;
use tokio_stream::wrappers::ReadDirStream;
use tokio_stream::StreamExt as _;
use tokio_util::sync::CancellationToken;

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const OUTPUT_EXTENSION: &str = "png";

/// Which files of the directory are treated as containers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerFilter {
    /// Files with this extension, compared case-insensitively
    Extension(String),
    /// Every regular file except the `.png` outputs of a previous pass
    All,
}

impl Default for ContainerFilter {
    fn default() -> Self {
        ContainerFilter::Extension(String::from("mri"))
    }
}

impl ContainerFilter {
    fn selects(&self, path: &Path) -> bool {
        match self {
            ContainerFilter::Extension(wanted) => path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted)),
            ContainerFilter::All => !path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION)),
        }
    }
}

#[derive(Debug, Clone, Builder)]
pub struct ConvertOptions {
    #[builder(default)]
    pub filter: ContainerFilter,
    #[builder(default)]
    pub policy: FailurePolicy,
    #[builder(default)]
    pub cancel: CancellationToken,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Decodes `path` as an MRI container and writes the raster next to it as `<stem>.png`.
/// Returns the path of the written file
#[tracing::instrument]
pub async fn convert_file(path: &Path) -> Result<PathBuf> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| Error::ReadError {
            path: path.to_owned(),
            source,
        })?;

    let png = task::spawn_blocking({
        let path = path.to_owned();
        move || mri_to_png(&path, &data)
    })
    .await??;

    let out = path.with_extension(OUTPUT_EXTENSION);
    storage::write_atomically(&out, &png).await?;

    tracing::debug!("wrote {}", out.display());

    Ok(out)
}

fn mri_to_png(path: &Path, data: &[u8]) -> Result<Vec<u8>> {
    let image = mri::decode(data).map_err(|cause| Error::DecodeError {
        path: path.to_owned(),
        cause,
    })?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|source| Error::EncodeError {
            path: path.to_owned(),
            source,
        })?;

    Ok(png)
}

/// Container files of `dir` selected by `filter`, sorted by name
async fn list_containers(dir: &Path, filter: &ContainerFilter) -> Result<Vec<PathBuf>> {
    let read_error = |source| Error::ReadError {
        path: dir.to_owned(),
        source,
    };

    let entries = tokio::fs::read_dir(dir).await.map_err(read_error)?;
    let mut entries = ReadDirStream::new(entries);

    let mut files = Vec::new();
    while let Some(entry) = entries.next().await {
        let entry = entry.map_err(read_error)?;

        if !entry.file_type().await.map_err(read_error)?.is_file() {
            continue;
        }

        let path = entry.path();
        if filter.selects(&path) {
            files.push(path);
        }
    }

    files.sort();

    Ok(files)
}

/// Converts every container of `dir` with [convert_file], in file name order.
///
/// Under [FailurePolicy::AbortOnFirst] the first file that cannot be converted aborts the
/// batch; PNG files already written are kept. Input files are never touched
#[tracing::instrument(skip(options))]
pub async fn convert_dir(dir: &Path, options: &ConvertOptions) -> Result<BatchReport> {
    let start = Instant::now();

    let files = list_containers(dir, &options.filter).await?;
    tracing::debug!("found {} containers", files.len());

    let mut report = BatchReport::default();
    for (index, file) in files.iter().enumerate() {
        if options.cancel.is_cancelled() {
            tracing::warn!("conversion cancelled before {}", file.display());

            return Err(Error::Cancelled);
        }

        let result = convert_file(file).await;
        report.record(options.policy, index, result)?;
    }

    tracing::info!(
        "converted {} of {} files in {:?}",
        report.written().count(),
        files.len(),
        start.elapsed()
    );

    Ok(report)
}
