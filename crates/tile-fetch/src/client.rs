//! HTTP access to the data server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use viewer_common::{
    Dataset, DatasetColorbar, DatasetDescription, DatasetId, DatasetsResponse, Endpoints,
    PaletteEntry, Timestamp,
};

use crate::error::{FetchError, FetchResult};

/// Source of JSON documents keyed by URL.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch_json(&self, url: &str) -> FetchResult<Value>;
}

/// [`Fetcher`] backed by a reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch_json(&self, url: &str) -> FetchResult<Value> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        debug!("Fetched JSON");
        Ok(body)
    }
}

/// Typed calls for the catalog endpoints.
pub struct ViewerApi<F: Fetcher> {
    endpoints: Endpoints,
    fetcher: Arc<F>,
}

impl<F: Fetcher> Clone for ViewerApi<F> {
    fn clone(&self) -> Self {
        Self {
            endpoints: self.endpoints.clone(),
            fetcher: self.fetcher.clone(),
        }
    }
}

impl<F: Fetcher> ViewerApi<F> {
    pub fn new(endpoints: Endpoints, fetcher: Arc<F>) -> Self {
        Self { endpoints, fetcher }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn fetcher(&self) -> Arc<F> {
        self.fetcher.clone()
    }

    pub async fn datasets(&self) -> FetchResult<Vec<Dataset>> {
        let response: DatasetsResponse = self.get(&self.endpoints.datasets()).await?;
        Ok(response.datasets)
    }

    pub async fn description(&self, dataset: &DatasetId) -> FetchResult<DatasetDescription> {
        self.get(&self.endpoints.description(dataset)).await
    }

    pub async fn colorbar(&self, dataset: &DatasetId) -> FetchResult<DatasetColorbar> {
        self.get(&self.endpoints.colorbar(dataset)).await
    }

    /// Most recent `limit` times of the dataset with this label.
    pub async fn times(&self, label: &str, limit: usize) -> FetchResult<Vec<Timestamp>> {
        self.get(&self.endpoints.times(label, limit)).await
    }

    pub async fn palettes(&self) -> FetchResult<Vec<PaletteEntry>> {
        self.get(&self.endpoints.palettes()).await
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> FetchResult<T> {
        let value = self.fetcher.fetch_json(url).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
