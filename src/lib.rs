pub mod batch;
pub mod convert;
pub mod downloader;
pub mod fetch;
pub mod mri;
pub mod naming;
pub mod requests;
pub mod storage;

pub use batch::{BatchReport, FailurePolicy, Outcome};
pub use convert::{convert_dir, convert_file, ContainerFilter, ConvertOptions};
pub use downloader::DownloadOptions;
pub use naming::page_file_name;
pub use requests::{Error, FetchCause, Result};

use bon::Builder;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Settings fixed for the whole lifetime of a [MangaRockClient]
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    #[builder(into, default = String::from(MangaRockClient::API_URL))]
    pub api_url: String,
    #[builder(into, default = String::from(MangaRockClient::META_URL))]
    pub meta_url: String,
    #[builder(into, default = String::from("MangaRock/1.0"))]
    pub user_agent: String,
    #[builder(default = Duration::from_secs(30))]
    pub timeout: Duration,
    /// Extra query parameters sent with every api request, e.g. `country`
    #[builder(default)]
    pub options: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Entry point for talking to mangarock servers and downloading their pages
#[derive(Debug, Clone)]
pub struct MangaRockClient {
    pub(crate) client: ClientWithMiddleware,
    pub(crate) config: Arc<ClientConfig>,
}

impl MangaRockClient {
    /// Client with the default [ClientConfig]
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        let client = ClientBuilder::new(client)
            .with(TracingMiddleware::default())
            .build();

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
