//! Paginated STAC item search.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, instrument};

use scene_common::{SceneError, SceneResult};

use crate::models::{Feature, StacItemCollection};
use crate::query::{Collection, QueryParameters};

/// Default public catalog search endpoint.
pub const DEFAULT_STAC_ENDPOINT: &str = "https://explorer.sandbox.dea.ga.gov.au/stac/search";

/// Catalog client configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Search endpoint URL
    pub endpoint: String,
    /// Upper bound on pages followed per collection (guards against link cycles)
    pub max_pages: usize,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_STAC_ENDPOINT.to_string(),
            max_pages: 1000,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Counts reported by the catalog across every page of a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchSummary {
    pub pages: usize,
    pub matched: u64,
    pub returned: u64,
}

/// Client for a STAC `/search` endpoint.
pub struct CatalogClient {
    client: Client,
    config: CatalogConfig,
}

impl CatalogClient {
    pub fn new(config: CatalogConfig) -> SceneResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| SceneError::Catalog(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Search every configured collection and return all features in
    /// arrival order.
    pub async fn search(&self, query: &QueryParameters) -> SceneResult<Vec<Feature>> {
        let (features, _) = self.search_with_summary(query).await?;
        Ok(features)
    }

    /// As [`search`](Self::search), also returning summed page counts.
    ///
    /// Any failed page aborts the whole search; partial results are dropped.
    pub async fn search_with_summary(
        &self,
        query: &QueryParameters,
    ) -> SceneResult<(Vec<Feature>, SearchSummary)> {
        let mut features = Vec::new();
        let mut summary = SearchSummary::default();

        for collection in &query.collections {
            if Collection::lookup(collection).is_none() {
                debug!(collection = %collection, "Searching collection not in known list");
            }
            let url = query.search_url(&self.config.endpoint, collection)?;
            self.search_collection(url, collection, &mut features, &mut summary)
                .await?;
        }

        info!(
            pages = summary.pages,
            matched = summary.matched,
            returned = summary.returned,
            features = features.len(),
            "Catalog search complete"
        );

        Ok((features, summary))
    }

    #[instrument(skip(self, first_url, features, summary))]
    async fn search_collection(
        &self,
        first_url: String,
        collection: &str,
        features: &mut Vec<Feature>,
        summary: &mut SearchSummary,
    ) -> SceneResult<()> {
        let mut next = Some(first_url);
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            if pages >= self.config.max_pages {
                return Err(SceneError::Catalog(format!(
                    "exceeded {} pages for collection {}",
                    self.config.max_pages, collection
                )));
            }

            let page = self.fetch_page(&url).await?;
            pages += 1;

            summary.pages += 1;
            summary.matched += page.matched().unwrap_or(0);
            summary.returned += page.returned();

            debug!(
                page = pages,
                items = page.features.len(),
                "Fetched catalog page"
            );

            next = page.next_link().map(|l| l.href.clone());
            for item in page.features {
                features.push(Feature::from_item(item, collection)?);
            }
        }

        Ok(())
    }

    async fn fetch_page(&self, url: &str) -> SceneResult<StacItemCollection> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SceneError::Catalog(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SceneError::Catalog(format!(
                "HTTP {} from {}: {}",
                status,
                url,
                body.chars().take(200).collect::<String>()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SceneError::Catalog(format!("failed to read response body: {}", e)))?;

        Ok(serde_json::from_slice(&bytes)?)
    }
}
