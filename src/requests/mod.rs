//! Structs and utilities for making requests to mangarock servers

pub mod author;
pub mod chapter;
pub mod manga;
pub mod query_utils;

use crate::mri::ContainerError;
use crate::MangaRockClient;
use author::Author;
use chapter::Chapter;
use manga::{Manga, MangaSingle};
use query_utils::{EmptyQuery, OidQuery, Query, ResponseCodeOk as _, SearchBody};

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::instrument::Instrument as _;

use std::collections::HashMap;
use std::path::PathBuf;

/// Cause of a failed page retrieval
#[derive(Error, Debug)]
pub enum FetchCause {
    #[error(transparent)]
    Transport(#[from] reqwest_middleware::Error),
    #[error("server responded with {0}")]
    Status(StatusCode),
}

/// Custom error type that contains all errors that this can be emitted by this crate's functions
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
    #[error(transparent)]
    RequestWithMiddleWareError(#[from] reqwest_middleware::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    QsError(#[from] serde_qs::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),
    #[error("error while parsing json value")]
    ParseError,
    #[error("server answered with response code {0}")]
    ResponseCodeError(i64),
    #[error("{0} not found")]
    NotFoundError(String),
    #[error("failed to fetch {locator}")]
    FetchError {
        locator: String,
        #[source]
        cause: FetchCause,
    },
    #[error("failed to write {}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {}", path.display())]
    DecodeError {
        path: PathBuf,
        #[source]
        cause: ContainerError,
    },
    #[error("failed to encode {}", path.display())]
    EncodeError {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn fetch(locator: &str, cause: impl Into<FetchCause>) -> Self {
        Error::FetchError {
            locator: locator.to_owned(),
            cause: cause.into(),
        }
    }
}

/// Type alias for the [`Result`](std::result::Result) that is used in the crate's functions
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Deserialize)]
struct RelatedManga {
    oid: String,
}

impl MangaRockClient {
    pub const API_URL: &str = "https://api.mangarockhd.com/query/web401";
    pub const META_URL: &str = "https://api.mangarockhd.com/meta";

    /// Appends the serialized `query` and the configured options to `base_url`
    fn endpoint(&self, base_url: &str, query: &impl Query) -> Result<String> {
        let mut params = serde_qs::to_string(query)?;

        let options = serde_qs::to_string(&self.config.options)?;
        if !options.is_empty() {
            if !params.is_empty() {
                params.push('&');
            }
            params.push_str(&options);
        }

        if params.is_empty() {
            Ok(base_url.to_owned())
        } else {
            Ok(format!("{base_url}?{params}"))
        }
    }

    /// Lowest level function that executes arbitrary GET [Query] and returnes its response
    #[tracing::instrument(skip(self))]
    pub async fn query(&self, base_url: &str, query: &impl Query) -> Result<Response> {
        let url = self.endpoint(base_url, query)?;

        Ok(self.client.get(url).send().await?.error_for_status()?)
    }

    /// Same as [`query`](MangaRockClient::query) but POSTs `body` encoded as json
    #[tracing::instrument(skip(self, body))]
    pub async fn post(
        &self,
        base_url: &str,
        query: &impl Query,
        body: &impl Serialize,
    ) -> Result<Response> {
        let url = self.endpoint(base_url, query)?;
        let body = serde_json::to_vec(body)?;

        Ok(self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?)
    }

    /// Unwraps the `{ code, data }` envelope every mangarock endpoint answers with
    pub async fn parse_respond_data<T>(resp: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut resp: Value = resp.json().await?;

        resp.response_code_ok()?;

        let data = match resp.get_mut("data") {
            Some(d) => d,
            None => return Err(Error::ParseError),
        };

        Ok(serde_json::from_value::<T>(data.take())?)
    }

    /// Latest mangas, re-resolved through the meta endpoint and with their authors attached
    #[tracing::instrument(skip(self))]
    pub async fn latest(&self) -> Result<Vec<Manga>> {
        let resp = self
            .query(&format!("{}/mrs_latest", self.config.api_url), &EmptyQuery {})
            .await?;
        let latest: Vec<Manga> = MangaRockClient::parse_respond_data(resp).await?;

        let ids: Vec<String> = latest.into_iter().map(|manga| manga.id).collect();
        let mangas = self.mangas_by_ids(&ids).in_current_span().await?;

        self.add_authors(mangas).in_current_span().await
    }

    /// Full info about the manga with the given `id`, including its chapter list
    #[tracing::instrument(skip(self))]
    pub async fn manga(&self, id: &str) -> Result<MangaSingle> {
        let resp = self
            .post(
                &format!("{}/info", self.config.api_url),
                &OidQuery { oid: id },
                &(),
            )
            .await?;

        let mut manga: MangaSingle = MangaRockClient::parse_respond_data(resp).await?;
        manga.manga.author = manga.manga.authors.first().cloned();

        Ok(manga)
    }

    /// Mangas for the given ids, in the same order. Unknown ids are skipped
    #[tracing::instrument(skip(self))]
    pub async fn mangas(&self, ids: &[String]) -> Result<Vec<Manga>> {
        self.mangas_by_ids(ids).in_current_span().await
    }

    /// Resolves the chapter `chapter_id` of the manga `manga_id` and attaches its ordered page list
    #[tracing::instrument(skip(self))]
    pub async fn chapter(&self, manga_id: &str, chapter_id: &str) -> Result<Chapter> {
        let manga = self.manga(manga_id).in_current_span().await?;

        let resp = self
            .post(
                &format!("{}/pages", self.config.api_url),
                &OidQuery { oid: chapter_id },
                &(),
            )
            .await?;
        let pages: Vec<String> = MangaRockClient::parse_respond_data(resp).await?;

        let Some(mut chapter) = manga
            .chapters
            .into_iter()
            .find(|chapter| chapter.id == chapter_id)
        else {
            tracing::warn!("manga {manga_id} has no chapter {chapter_id}");

            return Err(Error::NotFoundError(format!("chapter {chapter_id}")));
        };

        chapter.pages = pages;

        Ok(chapter)
    }

    /// The author with the given `id` together with the mangas they are related to
    #[tracing::instrument(skip(self))]
    pub async fn author(&self, id: &str) -> Result<(Author, Vec<Manga>)> {
        let authors = self
            .authors_by_ids(&[id.to_owned()])
            .in_current_span()
            .await?;

        let Some(author) = authors.into_iter().next() else {
            return Err(Error::NotFoundError(format!("author {id}")));
        };

        let resp = self
            .query(
                &format!("{}/mrs_serie_related_author", self.config.api_url),
                &OidQuery { oid: id },
            )
            .await?;
        let related: Vec<RelatedManga> = MangaRockClient::parse_respond_data(resp).await?;

        let ids: Vec<String> = related.into_iter().map(|manga| manga.oid).collect();
        let mut mangas = self.mangas_by_ids(&ids).in_current_span().await?;

        for manga in mangas.iter_mut() {
            manga.author = Some(author.clone());
        }

        Ok((author, mangas))
    }

    /// Searches for series matching `keywords` and returns their ids
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, keywords: &str) -> Result<Vec<String>> {
        let resp = self
            .post(
                &format!("{}/mrs_search", self.config.api_url),
                &EmptyQuery {},
                &SearchBody::series(keywords),
            )
            .await?;

        MangaRockClient::parse_respond_data(resp).await
    }

    async fn mangas_by_ids(&self, ids: &[String]) -> Result<Vec<Manga>> {
        let resp = self.post(&self.config.meta_url, &EmptyQuery {}, &ids).await?;
        let mut by_id: HashMap<String, Manga> = MangaRockClient::parse_respond_data(resp).await?;

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn authors_by_ids(&self, ids: &[String]) -> Result<Vec<Author>> {
        let resp = self.post(&self.config.meta_url, &EmptyQuery {}, &ids).await?;
        let mut by_id: HashMap<String, Author> = MangaRockClient::parse_respond_data(resp).await?;

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn add_authors(&self, mut mangas: Vec<Manga>) -> Result<Vec<Manga>> {
        let ids: Vec<String> = mangas
            .iter()
            .flat_map(|manga| manga.author_ids.iter().cloned())
            .collect();

        let authors: HashMap<String, Author> = self
            .authors_by_ids(&ids)
            .await?
            .into_iter()
            .map(|author| (author.id.clone(), author))
            .collect();

        for manga in mangas.iter_mut() {
            manga.authors = manga
                .author_ids
                .iter()
                .filter_map(|id| authors.get(id).cloned())
                .collect();
            manga.author = manga.authors.first().cloned();
        }

        Ok(mangas)
    }
}
