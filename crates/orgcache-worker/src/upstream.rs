//! HTTP adapter for the authoritative organization query service.
//!
//! - `GET {base}/api/v1/organization-units?first=&offset=&search=`
//! - `GET {base}/api/v1/organization-units/{code}` (404 is `None`)
//! - `GET {base}/api/v1/organization-units/stats` (404 is `None`)
//!
//! Every request carries the tenant id in the configured header.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use orgcache_core::config::worker::UpstreamConfig;
use orgcache_core::error::{AppError, ErrorKind};
use orgcache_core::result::AppResult;
use orgcache_core::traits::OrganizationQuery;
use orgcache_core::types::{Organization, OrganizationStats, QueryParams};

const RESOURCE: &str = "api/v1/organization-units";

#[derive(Debug, Clone)]
pub struct HttpOrganizationQuery {
    client: Client,
    base_url: Url,
    tenant_header: String,
}

impl HttpOrganizationQuery {
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        // A trailing slash keeps `join` from replacing the last path segment.
        let base = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Invalid upstream.base_url '{}'", config.base_url),
                e,
            )
        })?;
        let client = Client::builder().build().map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
        })?;

        Ok(Self {
            client,
            base_url,
            tenant_header: config.tenant_header.clone(),
        })
    }

    /// URL of a resource path below the organization units collection.
    fn url(&self, path: &[&str]) -> AppResult<Url> {
        let mut url = self
            .base_url
            .join(RESOURCE)
            .map_err(|e| AppError::with_source(ErrorKind::Internal, "Bad upstream URL", e))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| AppError::internal("upstream.base_url cannot be a base"))?;
            segments.extend(path);
        }
        Ok(url)
    }

    async fn fetch(&self, tenant_id: Uuid, url: Url) -> AppResult<Response> {
        self.client
            .get(url)
            .header(self.tenant_header.as_str(), tenant_id.to_string())
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::ExternalService, "Query service unreachable", e)
            })
    }

    /// Decode a success body; 404 maps to `None`.
    async fn parse_optional<T: DeserializeOwned>(response: Response) -> AppResult<Option<T>> {
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse(response).await.map(Some)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> AppResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(format!(
                "Query service returned HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }
        response.json::<T>().await.map_err(|e| {
            AppError::with_source(ErrorKind::ExternalService, "Malformed query service response", e)
        })
    }
}

#[async_trait]
impl OrganizationQuery for HttpOrganizationQuery {
    async fn get_organizations(
        &self,
        tenant_id: Uuid,
        params: &QueryParams,
    ) -> AppResult<Vec<Organization>> {
        let mut url = self.url(&[])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("first", &params.first.to_string())
                .append_pair("offset", &params.offset.to_string());
            if !params.search_text.is_empty() {
                query.append_pair("search", &params.search_text);
            }
        }
        let response = self.fetch(tenant_id, url).await?;
        Self::parse(response).await
    }

    async fn get_organization(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> AppResult<Option<Organization>> {
        let response = self.fetch(tenant_id, self.url(&[code])?).await?;
        Self::parse_optional(response).await
    }

    async fn get_organization_stats(&self, tenant_id: Uuid) -> AppResult<Option<OrganizationStats>> {
        let response = self.fetch(tenant_id, self.url(&["stats"])?).await?;
        Self::parse_optional(response).await
    }
}
