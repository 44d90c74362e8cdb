//! HTTP Document Store
//!
//! Implements the store ports against an Elasticsearch-compatible REST API
//! using reqwest.

use crate::domain::entities::ClusterSettings;
use crate::domain::errors::StoreError;
use crate::domain::ports::{BulkFailure, BulkOperation, SearchResponse, StoreConnection, StoreConnector};
use crate::domain::value_objects::CollectionSpec;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Opens [`HttpStoreConnection`]s.
///
/// Each connection owns its own reqwest client configured from the cluster
/// settings (proxy, pool size, credentials). Connecting pings the cluster
/// root so unreachable clusters fail early.
#[derive(Debug, Default, Clone)]
pub struct HttpStoreConnector;

impl HttpStoreConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StoreConnector for HttpStoreConnector {
    async fn connect(&self, settings: &ClusterSettings) -> Result<Arc<dyn StoreConnection>, StoreError> {
        let connection = HttpStoreConnection::new(settings)?;
        connection.ping().await?;
        tracing::debug!(
            "connected to {} for collection {}",
            settings.address,
            settings.default_collection
        );
        Ok(Arc::new(connection))
    }
}

/// Connection to one cluster over HTTP.
pub struct HttpStoreConnection {
    client: Client,
    base: Url,
    address: String,
    credentials: Option<(String, String)>,
}

impl HttpStoreConnection {
    /// Build a client for `settings` without touching the network.
    pub fn new(settings: &ClusterSettings) -> Result<Self, StoreError> {
        let connect_err = |reason: String| StoreError::Connect {
            address: settings.address.clone(),
            reason,
        };

        let base = Url::parse(settings.address.trim()).map_err(|e| connect_err(e.to_string()))?;

        let mut builder = Client::builder().pool_max_idle_per_host(settings.connection_limit as usize);
        if let Some(proxy) = settings.proxy.as_deref().filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| connect_err(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| connect_err(e.to_string()))?;

        Ok(Self {
            client,
            base,
            address: settings.address.clone(),
            credentials: settings
                .credentials
                .as_ref()
                .map(|c| (c.username.clone(), c.password.clone())),
        })
    }

    /// Check that the cluster answers.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let url = self.url(&[])?;
        let response = self
            .request(Method::HEAD, url)
            .send()
            .await
            .map_err(|e| StoreError::Connect {
                address: self.address.clone(),
                reason: e.to_string(),
            })?;
        ensure_success(response).await.map(|_| ())
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Request(format!("{} cannot be a base URL", self.address)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        builder
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, StoreError> {
        let response = ensure_success(self.send(builder).await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

fn refresh_param(refresh: bool) -> &'static str {
    if refresh {
        "true"
    } else {
        "false"
    }
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Deserialize)]
struct IndexResponse {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

#[derive(Deserialize)]
struct MultiGetResponse {
    docs: Vec<GetResponse>,
}

#[derive(Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<Map<String, Value>>,
}

#[derive(Deserialize)]
struct RawSearchResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: RawHits,
}

#[derive(Deserialize)]
struct RawHits {
    total: Option<Value>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_source")]
    source: Option<Value>,
}

impl From<RawSearchResponse> for SearchResponse {
    fn from(raw: RawSearchResponse) -> Self {
        // 7.x reports {"value": n}, 6.x a bare number.
        let total = match raw.hits.total {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(Value::Object(o)) => o.get("value").and_then(Value::as_u64).unwrap_or(0),
            _ => 0,
        };
        Self {
            total,
            hits: raw.hits.hits.into_iter().filter_map(|h| h.source).collect(),
            scroll_id: raw.scroll_id,
        }
    }
}

fn bulk_body(operations: &[BulkOperation]) -> Result<String, StoreError> {
    let mut body = String::new();
    for op in operations {
        let lines = match op {
            BulkOperation::Index { id, document } => {
                let action = match id {
                    Some(id) => json!({ "index": { "_id": id } }),
                    None => json!({ "index": {} }),
                };
                vec![action, document.clone()]
            }
            BulkOperation::Delete { id } => vec![json!({ "delete": { "_id": id } })],
        };
        for line in lines {
            body.push_str(&serde_json::to_string(&line).map_err(|e| StoreError::Request(e.to_string()))?);
            body.push('\n');
        }
    }
    Ok(body)
}

fn bulk_failures(response: BulkResponse) -> Vec<BulkFailure> {
    if !response.errors {
        return Vec::new();
    }
    response
        .items
        .into_iter()
        .filter_map(|item| item.into_iter().next().map(|(_, result)| result))
        .filter_map(|result| {
            let error = result.get("error")?;
            let reason = error
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            Some(BulkFailure {
                id: result.get("_id").and_then(Value::as_str).map(str::to_string),
                status: result.get("status").and_then(Value::as_u64).unwrap_or(0) as u16,
                reason,
            })
        })
        .collect()
}

#[async_trait]
impl StoreConnection for HttpStoreConnection {
    async fn exists(&self, collection: &str) -> Result<bool, StoreError> {
        let url = self.url(&[collection])?;
        let response = self.send(self.request(Method::HEAD, url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => ensure_success(response).await.map(|_| true),
        }
    }

    async fn create(&self, collection: &str, spec: &CollectionSpec) -> Result<(), StoreError> {
        let mut body = json!({
            "settings": {
                "number_of_shards": spec.shards,
                "number_of_replicas": spec.replicas,
            }
        });
        if let Some(alias) = &spec.alias {
            let mut aliases = Map::new();
            aliases.insert(alias.clone(), json!({}));
            body["aliases"] = Value::Object(aliases);
        }
        let url = self.url(&[collection])?;
        self.send_json::<Value>(self.request(Method::PUT, url).json(&body))
            .await
            .map(|_| ())
    }

    async fn put_mapping(&self, collection: &str, mapping: &Value) -> Result<(), StoreError> {
        let url = self.url(&[collection, "_mapping"])?;
        self.send_json::<Value>(self.request(Method::PUT, url).json(mapping))
            .await
            .map(|_| ())
    }

    async fn index(
        &self,
        collection: &str,
        id: Option<&str>,
        document: &Value,
        refresh: bool,
    ) -> Result<String, StoreError> {
        let builder = match id {
            Some(id) => self.request(Method::PUT, self.url(&[collection, "_doc", id])?),
            None => self.request(Method::POST, self.url(&[collection, "_doc"])?),
        };
        let response: IndexResponse = self
            .send_json(builder.query(&[("refresh", refresh_param(refresh))]).json(document))
            .await?;
        Ok(response.id)
    }

    async fn bulk(
        &self,
        collection: &str,
        operations: &[BulkOperation],
        refresh: bool,
    ) -> Result<Vec<BulkFailure>, StoreError> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url(&[collection, "_bulk"])?;
        let builder = self
            .request(Method::POST, url)
            .query(&[("refresh", refresh_param(refresh))])
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(bulk_body(operations)?);
        let response: BulkResponse = self.send_json(builder).await?;
        Ok(bulk_failures(response))
    }

    async fn update(&self, collection: &str, id: &str, fields: &Value, refresh: bool) -> Result<(), StoreError> {
        let url = self.url(&[collection, "_update", id])?;
        let builder = self
            .request(Method::POST, url)
            .query(&[("refresh", refresh_param(refresh))])
            .json(&json!({ "doc": fields }));
        self.send_json::<Value>(builder).await.map(|_| ())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let url = self.url(&[collection, "_doc", id])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let found: GetResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(found.source.filter(|_| found.found))
    }

    async fn multi_get(&self, collection: &str, ids: &[String]) -> Result<Vec<Value>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url(&[collection, "_mget"])?;
        let response: MultiGetResponse = self
            .send_json(self.request(Method::POST, url).json(&json!({ "ids": ids })))
            .await?;
        Ok(response
            .docs
            .into_iter()
            .filter(|doc| doc.found)
            .filter_map(|doc| doc.source)
            .collect())
    }

    async fn search(&self, collection: &str, query: &Value, scroll: Option<&str>) -> Result<SearchResponse, StoreError> {
        let url = self.url(&[collection, "_search"])?;
        let mut builder = self.request(Method::POST, url).json(query);
        if let Some(keep_alive) = scroll {
            builder = builder.query(&[("scroll", keep_alive)]);
        }
        let response: RawSearchResponse = self.send_json(builder).await?;
        Ok(response.into())
    }

    async fn scroll(&self, scroll_id: &str, keep_alive: &str) -> Result<SearchResponse, StoreError> {
        let url = self.url(&["_search", "scroll"])?;
        let body = json!({ "scroll": keep_alive, "scroll_id": scroll_id });
        let response: RawSearchResponse = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(response.into())
    }

    async fn clear_scroll(&self, scroll_ids: &[String]) -> Result<(), StoreError> {
        if scroll_ids.is_empty() {
            return Ok(());
        }
        let url = self.url(&["_search", "scroll"])?;
        let body = json!({ "scroll_id": scroll_ids });
        self.send_json::<Value>(self.request(Method::DELETE, url).json(&body))
            .await
            .map(|_| ())
    }
}
