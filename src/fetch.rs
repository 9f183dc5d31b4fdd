use crate::requests::{Error, FetchCause, Result};
use crate::storage;
use crate::MangaRockClient;

use bytes::Bytes;
use reqwest::Response;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt as _};
use tokio_util::sync::CancellationToken;

use std::path::Path;

impl MangaRockClient {
    async fn page_response(&self, locator: &str) -> Result<Response> {
        let resp = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| Error::fetch(locator, e))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!("got {status} for page {locator}");

            return Err(Error::fetch(locator, FetchCause::Status(status)));
        }

        Ok(resp)
    }

    /// Downloads the page at `locator`. A body that breaks off midway is an error, never a
    /// shorter payload
    #[tracing::instrument(skip(self))]
    pub async fn fetch_page(&self, locator: &str) -> Result<Bytes> {
        let resp = self.page_response(locator).await?;

        resp.bytes()
            .await
            .map_err(|e| Error::fetch(locator, reqwest_middleware::Error::from(e)))
    }

    /// Streams the page at `locator` into `sink` chunk by chunk and returns the number of bytes
    /// written
    #[tracing::instrument(skip(self, sink))]
    pub async fn fetch_page_to<W>(&self, locator: &str, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut resp = self.page_response(locator).await?;

        let mut written = 0;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| Error::fetch(locator, reqwest_middleware::Error::from(e)))?
        {
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        sink.flush().await?;

        tracing::debug!("streamed {written} bytes");

        Ok(written)
    }

    /// Streams the page at `locator` into the file at `path`. The body goes to a hidden `.part`
    /// sibling first and is renamed over `path` once complete; on failure or cancellation the
    /// part file is removed and `path` is left as it was
    #[tracing::instrument(skip(self, cancel))]
    pub async fn fetch_page_to_file(
        &self,
        locator: &str,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let part = storage::part_path(path);
        let mut file = fs::File::create(&part)
            .await
            .map_err(|source| Error::WriteError {
                path: path.to_owned(),
                source,
            })?;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = self.fetch_page_to(locator, &mut file) => res,
        };
        drop(file);

        match result {
            Ok(written) => {
                storage::rename_into_place(&part, path).await?;

                Ok(written)
            }
            Err(e) => {
                let _ = fs::remove_file(&part).await;

                Err(e)
            }
        }
    }
}
