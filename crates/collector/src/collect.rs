//! Single-record and paginated multi-record collection.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tome_core::config::{
    render_query_defaults, CollectStrategy, EntityConfig, SourceConfig,
};
use tome_core::mapper::resolve_path;

use crate::api::{FetchError, SourceApi, DEFAULT_TIMEOUT};
use crate::query::{filter_pairs, page_pairs, Filter, FilterSet};
use crate::retry::{with_retry, RetryConfig};

/// Default page size for listing endpoints.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("filter '{filter}' is not supported by entity '{entity}'")]
    UnsupportedFilter { filter: String, entity: String },

    #[error("no record for entity '{entity}' with id {id}")]
    NotFound { entity: String, id: i64 },
}

// ── Pages ────────────────────────────────────────────────────────────

/// One page of a source listing response (`data`, `total`, `limit`).
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Value>,
    pub total: u64,
    pub limit: u64,
}

impl Page {
    /// Read a page from a response body, defaulting defensively: a
    /// missing `data` is an empty page, a missing `total` is the item
    /// count.
    pub fn from_value(value: &Value) -> Self {
        let items = value
            .get("data")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();
        let total = value
            .get("total")
            .and_then(|t| t.as_u64())
            .unwrap_or(items.len() as u64);
        let limit = value.get("limit").and_then(|l| l.as_u64()).unwrap_or(0);
        Self { items, total, limit }
    }
}

/// Seam between the pagination loop and the HTTP layer; tests drive the
/// loop with a stub implementation.
#[async_trait]
pub trait PageSource {
    async fn fetch_page(&self, skip: u64, limit: u64) -> Result<Page, FetchError>;
}

// ── Results ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CollectMeta {
    /// Total records the source reports for the query.
    pub total: u64,
    /// The requested limit (`0` means "all").
    pub limit: u64,
    pub offset: u64,
    /// How many records were actually collected.
    pub collected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectResult {
    pub items: Vec<Value>,
    pub meta: CollectMeta,
}

/// Walk a listing with the skip/limit protocol until the requested limit
/// is reached, a short page signals exhaustion, or (when `limit` is `0`)
/// the reported total has been collected.
pub async fn collect_pages<S>(
    source: &S,
    limit: u64,
    offset: u64,
    page_size: u64,
) -> Result<CollectResult, FetchError>
where
    S: PageSource + Sync + ?Sized,
{
    let page_size = page_size.max(1);
    let mut items: Vec<Value> = Vec::new();
    let mut total = 0u64;

    loop {
        let want = if limit > 0 {
            (limit - items.len() as u64).min(page_size)
        } else {
            page_size
        };
        if want == 0 {
            break;
        }

        let skip = offset + items.len() as u64;
        let page = source.fetch_page(skip, want).await?;
        total = page.total;
        let got = page.items.len() as u64;
        items.extend(page.items);

        if got < want {
            break; // short page: the source is exhausted
        }
        if limit > 0 && items.len() as u64 >= limit {
            break;
        }
        if limit == 0 && offset + items.len() as u64 >= total {
            break;
        }
    }

    Ok(CollectResult {
        meta: CollectMeta {
            total,
            limit,
            offset,
            collected: items.len() as u64,
        },
        items,
    })
}

// ── Catalog strategy ─────────────────────────────────────────────────

/// Group items by a key path and keep the first distinct value per key,
/// producing a compact `{id, name}` catalog from a large listing.
pub fn build_catalog(items: &[Value], group_by: &str, value_path: &str) -> Vec<Value> {
    let mut seen = std::collections::BTreeSet::new();
    let mut catalog = Vec::new();
    for item in items {
        let key = resolve_path(item, group_by);
        if key.is_null() {
            continue;
        }
        if seen.insert(key.to_string()) {
            catalog.push(json!({
                "id": key,
                "name": resolve_path(item, value_path),
            }));
        }
    }
    catalog
}

// ── Collector ────────────────────────────────────────────────────────

/// Collection options passed through from the trigger surface.
#[derive(Debug, Clone, Copy)]
pub struct CollectOptions {
    /// Maximum records to collect; `0` collects everything.
    pub limit: u64,
    pub offset: u64,
    pub page_size: u64,
    /// Bypass the response cache for this call.
    pub skip_cache: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            limit: 0,
            offset: 0,
            page_size: DEFAULT_PAGE_SIZE,
            skip_cache: false,
        }
    }
}

/// Drives record retrieval for one configured source.
///
/// Holds the HTTP client, the retry policy, and an optional response
/// cache keyed by request identity. The cache is orthogonal to
/// correctness and bypassable per call.
pub struct Collector {
    api: SourceApi,
    retry: RetryConfig,
    language: String,
    cache: Mutex<HashMap<String, Value>>,
}

impl Collector {
    pub fn new(source: &SourceConfig) -> Self {
        Self::with_api(
            SourceApi::new(source.base_url.clone(), DEFAULT_TIMEOUT),
            source.default_language.clone(),
        )
    }

    pub fn with_api(api: SourceApi, language: String) -> Self {
        Self {
            api,
            retry: RetryConfig::default(),
            language,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch a single record by id.
    ///
    /// Uses the declared single-item endpoint when there is one;
    /// otherwise falls back to the listing endpoint with an identity
    /// filter and a limit of 1.
    pub async fn fetch_one(
        &self,
        entity: &EntityConfig,
        id: i64,
        options: &CollectOptions,
    ) -> Result<Value, CollectError> {
        match &entity.endpoints.fetch_one {
            Some(endpoint) => {
                let path = endpoint.render_path(id);
                let pairs = render_query_defaults(&endpoint.query_defaults, &self.language);
                let key = cache_key("one", &path, &pairs, 1, 0);
                if !options.skip_cache {
                    if let Some(hit) = self.cache_get(&key) {
                        return Ok(hit);
                    }
                }
                let value = with_retry(&self.retry, || self.api.get(&path, &pairs)).await?;
                self.cache_put(key, value.clone());
                Ok(value)
            }
            None => {
                let mut filters = FilterSet::new();
                filters.insert("id".to_string(), Filter::Eq(json!(id)));
                let fallback = CollectOptions {
                    limit: 1,
                    offset: 0,
                    page_size: 1,
                    skip_cache: options.skip_cache,
                };
                let result = self.fetch_many_unchecked(entity, &filters, &fallback).await?;
                result
                    .items
                    .into_iter()
                    .next()
                    .ok_or_else(|| CollectError::NotFound {
                        entity: entity.entity.clone(),
                        id,
                    })
            }
        }
    }

    /// Fetch a filtered batch of records.
    pub async fn fetch_many(
        &self,
        entity: &EntityConfig,
        filters: &FilterSet,
        options: &CollectOptions,
    ) -> Result<CollectResult, CollectError> {
        for filter in filters.keys() {
            if !entity.filters.supported.contains(filter) {
                return Err(CollectError::UnsupportedFilter {
                    filter: filter.clone(),
                    entity: entity.entity.clone(),
                });
            }
        }
        self.fetch_many_unchecked(entity, filters, options).await
    }

    /// Listing fetch without the supported-filter check; the identity
    /// fallback of [`fetch_one`] also comes through here.
    async fn fetch_many_unchecked(
        &self,
        entity: &EntityConfig,
        filters: &FilterSet,
        options: &CollectOptions,
    ) -> Result<CollectResult, CollectError> {
        let endpoint = &entity.endpoints.fetch_many;
        let mut base = render_query_defaults(&endpoint.query_defaults, &self.language);
        base.extend(filter_pairs(filters));

        let key = cache_key(
            "many",
            &endpoint.path,
            &base,
            options.limit,
            options.offset,
        );
        if !options.skip_cache {
            if let Some(hit) = self.cache_get(&key) {
                if let Ok(result) = serde_json::from_value::<CollectResult>(hit) {
                    return Ok(result);
                }
            }
        }

        let source = ListPageSource {
            api: &self.api,
            retry: &self.retry,
            path: &endpoint.path,
            base: &base,
        };
        let mut result =
            collect_pages(&source, options.limit, options.offset, options.page_size).await?;

        if entity.meta.collect_strategy == CollectStrategy::Catalog {
            if let Some(catalog) = &entity.meta.catalog {
                result.items = build_catalog(&result.items, &catalog.group_by, &catalog.value);
                result.meta.collected = result.items.len() as u64;
            }
        }

        tracing::info!(
            entity = %entity.entity,
            collected = result.meta.collected,
            total = result.meta.total,
            "Collected records",
        );

        if let Ok(value) = serde_json::to_value(&result) {
            self.cache_put(key, value);
        }
        Ok(result)
    }

    fn cache_get(&self, key: &str) -> Option<Value> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    fn cache_put(&self, key: String, value: Value) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, value);
        }
    }
}

fn cache_key(kind: &str, path: &str, pairs: &[(String, String)], limit: u64, offset: u64) -> String {
    let query: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{kind}:{path}?{}#{limit}+{offset}", query.join("&"))
}

struct ListPageSource<'a> {
    api: &'a SourceApi,
    retry: &'a RetryConfig,
    path: &'a str,
    base: &'a [(String, String)],
}

#[async_trait]
impl PageSource for ListPageSource<'_> {
    async fn fetch_page(&self, skip: u64, limit: u64) -> Result<Page, FetchError> {
        let mut pairs = self.base.to_vec();
        pairs.extend(page_pairs(skip, limit));
        let value = with_retry(self.retry, || self.api.get(self.path, &pairs)).await?;
        Ok(Page::from_value(&value))
    }
}

// ── Tests ────────────────────────────────────────────────────────────
