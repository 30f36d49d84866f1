use futures_util::stream::{self, Stream, TryStreamExt};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::Config;
use crate::error::GatewayError;
use crate::fields::Resource;
use crate::models::Page;

const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_MAX_PAGES: u32 = 50;

/// Shared HTTP client for the Joplin Data API.
///
/// Holds no mutable state; it can be cloned freely and used from concurrent
/// tool calls. Every request carries the API token as a query parameter and a
/// bounded timeout, and every listing goes through the same pagination loop so
/// cursor handling and field selection live in exactly one place.
#[derive(Clone)]
pub struct JoplinClient {
    base_url: String,
    token: String,
    timeout: Duration,
    page_size: u32,
    max_pages: u32,
    client: reqwest::Client,
}

/// Continuation state for the pagination merge loop. Joplin's wire cursor is
/// a 1-based page number; it never leaves this module.
#[derive(Debug, Clone, Copy)]
struct PageCursor {
    next: u32,
    exhausted: bool,
}

impl PageCursor {
    fn first() -> Self {
        PageCursor {
            next: 1,
            exhausted: false,
        }
    }

    fn next_page(&self) -> Option<u32> {
        if self.exhausted {
            None
        } else {
            Some(self.next)
        }
    }

    fn advance(self, has_more: bool) -> Self {
        PageCursor {
            next: self.next + 1,
            exhausted: !has_more,
        }
    }
}

impl JoplinClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.base_url(), config.token.clone(), config.timeout)
    }

    /// Override the per-page size and the hard page ceiling.
    pub fn with_pagination(mut self, page_size: u32, max_pages: u32) -> Self {
        self.page_size = page_size;
        self.max_pages = max_pages;
        self
    }

    /// Per-page item count used by `fetch_all`.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch one page of a listing.
    ///
    /// `fields` must be drawn from the resource's recognized contract;
    /// violations fail here, before any request is issued, because the
    /// service answers an out-of-contract selection with a hard 500.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        resource: Resource,
        endpoint: &str,
        filters: &[(String, String)],
        fields: &[&str],
        page: u32,
        limit: u32,
    ) -> Result<Page<T>, GatewayError> {
        resource.check_fields(fields)?;

        let mut query: Vec<(String, String)> = filters.to_vec();
        query.push(("page".to_string(), page.to_string()));
        query.push(("limit".to_string(), limit.to_string()));
        if !fields.is_empty() {
            query.push(("fields".to_string(), fields.join(",")));
        }

        let response = self
            .send(resource, Method::GET, endpoint, &query, None)
            .await?;
        response
            .json::<Page<T>>()
            .await
            .map_err(GatewayError::from_reqwest)
    }

    /// Fetch a whole listing as a lazy stream, following the service's
    /// pagination until it reports completion.
    ///
    /// Items come out in receipt order (the service's own ordering); nothing
    /// is re-sorted here. Consumers that stop early (`take`) stop the
    /// underlying pagination too. If `has_more` never goes false within the
    /// page ceiling, the stream ends with `PaginationLimitError` rather than
    /// truncating silently.
    pub fn fetch_all<T: DeserializeOwned + Send + 'static>(
        &self,
        resource: Resource,
        endpoint: &str,
        filters: Vec<(String, String)>,
        fields: &'static [&'static str],
    ) -> impl Stream<Item = Result<T, GatewayError>> + Send + 'static {
        let client = self.clone();
        let endpoint = endpoint.to_string();

        stream::try_unfold(PageCursor::first(), move |cursor| {
            let client = client.clone();
            let endpoint = endpoint.clone();
            let filters = filters.clone();
            async move {
                let page_number = match cursor.next_page() {
                    Some(n) => n,
                    None => return Ok(None),
                };
                if page_number > client.max_pages {
                    return Err(GatewayError::PaginationLimit(client.max_pages));
                }

                let page: Page<T> = client
                    .fetch_page(
                        resource,
                        &endpoint,
                        &filters,
                        fields,
                        page_number,
                        client.page_size,
                    )
                    .await?;

                let cursor = cursor.advance(page.has_more);
                Ok(Some((stream::iter(page.items.into_iter().map(Ok)), cursor)))
            }
        })
        .try_flatten()
    }

    /// Fetch a single entity by id.
    pub async fn get<T: DeserializeOwned>(
        &self,
        resource: Resource,
        id: &str,
        fields: &[&str],
    ) -> Result<T, GatewayError> {
        resource.check_fields(fields)?;

        let mut query = Vec::new();
        if !fields.is_empty() {
            query.push(("fields".to_string(), fields.join(",")));
        }

        let endpoint = format!("{}/{}", resource.path(), id);
        let response = self
            .send(resource, Method::GET, &endpoint, &query, None)
            .await
            .map_err(|e| Self::name_not_found(e, resource, id))?;
        response
            .json::<T>()
            .await
            .map_err(GatewayError::from_reqwest)
    }

    /// Create an entity. Not idempotent at this layer; dedup rules live in
    /// the operations that need them.
    pub async fn create<T: DeserializeOwned>(
        &self,
        resource: Resource,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T, GatewayError> {
        let response = self
            .send(resource, Method::POST, endpoint, &[], Some(body))
            .await?;
        response
            .json::<T>()
            .await
            .map_err(GatewayError::from_reqwest)
    }

    /// Partial update: the body carries only the fields to change, the
    /// service leaves the rest untouched.
    pub async fn update<T: DeserializeOwned>(
        &self,
        resource: Resource,
        id: &str,
        body: &serde_json::Value,
    ) -> Result<T, GatewayError> {
        let endpoint = format!("{}/{}", resource.path(), id);
        let response = self
            .send(resource, Method::PUT, &endpoint, &[], Some(body))
            .await
            .map_err(|e| Self::name_not_found(e, resource, id))?;
        response
            .json::<T>()
            .await
            .map_err(GatewayError::from_reqwest)
    }

    pub async fn delete(&self, resource: Resource, id: &str) -> Result<(), GatewayError> {
        let endpoint = format!("{}/{}", resource.path(), id);
        self.send(resource, Method::DELETE, &endpoint, &[], None)
            .await
            .map_err(|e| Self::name_not_found(e, resource, id))?;
        Ok(())
    }

    /// POST where the response body carries nothing the caller needs
    /// (e.g. the tag-note association endpoint).
    pub async fn post_relation(
        &self,
        resource: Resource,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<(), GatewayError> {
        self.send(resource, Method::POST, endpoint, &[], Some(body))
            .await?;
        Ok(())
    }

    async fn send(
        &self,
        resource: Resource,
        method: Method,
        endpoint: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self
            .client
            .request(method, &url)
            .timeout(self.timeout)
            .query(&[("token", self.token.as_str())])
            .query(query);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(GatewayError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("Joplin API {} {} -> {}", endpoint, status, body);
            return Err(GatewayError::from_status(resource, status.as_u16(), &body));
        }

        Ok(response)
    }

    fn name_not_found(err: GatewayError, resource: Resource, id: &str) -> GatewayError {
        match err {
            GatewayError::NotFound(_) => {
                GatewayError::NotFound(format!("{} {}", resource.label(), id))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_walks_pages_until_exhausted() {
        let cursor = PageCursor::first();
        assert_eq!(cursor.next_page(), Some(1));

        let cursor = cursor.advance(true);
        assert_eq!(cursor.next_page(), Some(2));

        let cursor = cursor.advance(false);
        assert_eq!(cursor.next_page(), None);
    }

    #[test]
    fn test_pagination_overrides() {
        let client = JoplinClient::new("http://localhost:41184", "t", Duration::from_secs(1))
            .with_pagination(10, 3);
        assert_eq!(client.page_size(), 10);
        assert_eq!(client.max_pages, 3);
    }
}
