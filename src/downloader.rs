use crate::batch::{BatchReport, FailurePolicy};
use crate::naming::page_file_name;
use crate::requests::chapter::Chapter;
use crate::requests::{Error, Result};
use crate::storage;
use crate::MangaRockClient;

use bon::Builder;
use futures::stream::{self, StreamExt as _};
use tokio_util::sync::CancellationToken;
use tracing::instrument::Instrument as _;

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Builder)]
pub struct DownloadOptions {
    /// How many pages may be fetched at the same time. Pages are still written in chapter order
    #[builder(default = 1)]
    pub concurrency: usize,
    #[builder(default)]
    pub policy: FailurePolicy,
    #[builder(default)]
    pub cancel: CancellationToken,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MangaRockClient {
    /// Downloads every page of `chapter` into `dir`, naming them with
    /// [`page_file_name`](crate::naming::page_file_name).
    ///
    /// Pages are committed to disk strictly in chapter order whatever `options.concurrency` is.
    /// With [FailurePolicy::AbortOnFirst] the first failing page is returned as the error and
    /// neither it nor any later page is written. Cancelling `options.cancel` stops the download
    /// with [Error::Cancelled] under any policy.
    #[tracing::instrument(skip(self, chapter, options), fields(chapter = %chapter.id, pages = chapter.pages.len()))]
    pub async fn download_chapter(
        &self,
        chapter: &Chapter,
        dir: impl AsRef<Path> + std::fmt::Debug,
        options: &DownloadOptions,
    ) -> Result<BatchReport> {
        let dir = dir.as_ref();
        let client = self;
        let cancel = &options.cancel;

        let fetches = stream::iter(chapter.pages.iter().enumerate())
            .map(move |(index, locator)| async move {
                let fetched = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(Error::Cancelled),
                    res = client.fetch_page(locator) => res,
                };

                (index, locator, fetched)
            })
            .buffered(options.concurrency.max(1));
        let mut fetches = std::pin::pin!(fetches);

        let mut report = BatchReport::default();
        while let Some((index, locator, fetched)) = fetches.next().await {
            if matches!(fetched, Err(Error::Cancelled)) || cancel.is_cancelled() {
                tracing::warn!("download cancelled at page {index}");

                return Err(Error::Cancelled);
            }

            let result = match fetched {
                Ok(bytes) => store_page(dir, index, locator, &bytes).await,
                Err(e) => Err(e),
            };

            report.record(options.policy, index, result)?;
        }

        tracing::info!(
            "downloaded {} of {} pages into {}",
            report.written().count(),
            chapter.pages.len(),
            dir.display()
        );

        Ok(report)
    }

    /// Resolves the chapter with [`chapter`](MangaRockClient::chapter) and downloads it with
    /// [`download_chapter`](MangaRockClient::download_chapter)
    #[tracing::instrument(skip(self, options))]
    pub async fn download_chapter_by_id(
        &self,
        manga_id: &str,
        chapter_id: &str,
        dir: impl AsRef<Path> + std::fmt::Debug,
        options: &DownloadOptions,
    ) -> Result<(Chapter, BatchReport)> {
        let chapter = self.chapter(manga_id, chapter_id).in_current_span().await?;

        let report = self
            .download_chapter(&chapter, dir, options)
            .in_current_span()
            .await?;

        Ok((chapter, report))
    }
}

async fn store_page(dir: &Path, index: usize, locator: &str, bytes: &[u8]) -> Result<PathBuf> {
    storage::ensure_dir(dir).await?;

    let path = dir.join(page_file_name(index, locator));
    storage::write_atomically(&path, bytes).await?;

    tracing::debug!("page {index} saved to {}", path.display());

    Ok(path)
}
