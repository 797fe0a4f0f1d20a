//! Question answering over a Qdrant collection of stored Q&A pairs.
//!
//! Questions are embedded with an OpenAI-compatible embeddings endpoint and
//! matched against the stored question vectors; the payload of each hit
//! carries the original question and its answer.
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use super::{register_tool, Param, ParamType, ToolArgs, ToolFunction, ToolRegistration};
use super::{ToolError, ToolResult, ToolSignature, ToolSource};

const TOOL_NAME: &str = "get_answer";
const NO_ANSWER: &str = "Sorry, I could not find an answer to that question.";

fn default_embedding_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "store_qa".to_string()
}

fn default_limit() -> usize {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

/// Where the embeddings and the vector index live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_embedding_url")]
    pub embedding_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Falls back to `OPENAI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default)]
    pub qdrant_api_key: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embedding_url: default_embedding_url(),
            embedding_model: default_embedding_model(),
            api_key: None,
            qdrant_url: default_qdrant_url(),
            qdrant_api_key: None,
            collection: default_collection(),
            limit: default_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn failed<E: std::fmt::Display>(e: E) -> ToolError {
    ToolError::execution(TOOL_NAME, e.to_string())
}

fn endpoint(base: &Url, path: &str) -> ToolResult<Url> {
    // keep any path prefix on the base url
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| ToolError::Internal(format!("invalid url for {}: {}", path, e)))
}

fn parse_url(url: &str) -> ToolResult<Url> {
    Url::parse(url).map_err(|e| ToolError::Internal(format!("invalid url '{}': {}", url, e)))
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> ToolResult<Vec<f32>>;
}

/// Client for an OpenAI-compatible `/embeddings` endpoint
pub struct OpenAiEmbeddings {
    client: Client,
    url: Url,
    model: String,
    api_key: String,
}

impl OpenAiEmbeddings {
    pub fn new(client: Client, base_url: &str, model: &str, api_key: String) -> ToolResult<Self> {
        Ok(Self {
            client,
            url: endpoint(&parse_url(base_url)?, "embeddings")?,
            model: model.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> ToolResult<Vec<f32>> {
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.api_key)
            .json(&json!({"model": self.model, "input": text}))
            .send()
            .await
            .map_err(failed)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("embedding request failed ({}): {}", status, body)));
        }

        let body: Value = response.json().await.map_err(failed)?;
        let embedding = body["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| failed("embedding response has no data"))?;
        embedding
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| failed("embedding contains a non-numeric value"))
    }
}

/// One stored question and its answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoredPoint {
    pub score: f32,
    #[serde(default)]
    pub payload: Value,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> ToolResult<bool>;

    /// Create a dot-product collection for vectors of `size` dimensions
    async fn create_collection(&self, collection: &str, size: usize) -> ToolResult<()>;

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> ToolResult<()>;

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> ToolResult<Vec<ScoredPoint>>;
}

/// Qdrant over its REST API
pub struct QdrantIndex {
    client: Client,
    url: Url,
    api_key: Option<String>,
}

impl QdrantIndex {
    pub fn new(client: Client, url: &str, api_key: Option<String>) -> ToolResult<Self> {
        Ok(Self {
            client,
            url: parse_url(url)?,
            api_key,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> ToolResult<RequestBuilder> {
        let request = self.client.request(method, endpoint(&self.url, path)?);
        Ok(match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder) -> ToolResult<Value> {
        let response = request.send().await.map_err(failed)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("qdrant request failed ({}): {}", status, body)));
        }
        response.json().await.map_err(failed)
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn collection_exists(&self, collection: &str) -> ToolResult<bool> {
        let path = format!("collections/{}", collection);
        let response = self
            .request(reqwest::Method::GET, &path)?
            .send()
            .await
            .map_err(failed)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(failed(format!("qdrant request failed ({})", status))),
        }
    }

    async fn create_collection(&self, collection: &str, size: usize) -> ToolResult<()> {
        let path = format!("collections/{}", collection);
        let body = json!({"vectors": {"size": size, "distance": "Dot"}});
        self.send(self.request(reqwest::Method::PUT, &path)?.json(&body))
            .await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> ToolResult<()> {
        let path = format!("collections/{}/points?wait=true", collection);
        self.send(
            self.request(reqwest::Method::PUT, &path)?
                .json(&json!({ "points": points })),
        )
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> ToolResult<Vec<ScoredPoint>> {
        let path = format!("collections/{}/points/search", collection);
        let body = json!({"vector": vector, "limit": limit, "with_payload": true});
        let response = self
            .send(self.request(reqwest::Method::POST, &path)?.json(&body))
            .await?;
        serde_json::from_value(response["result"].clone()).map_err(failed)
    }
}

/// Embeds questions and looks them up in one collection
pub struct Retriever {
    embedder: Box<dyn Embedder>,
    index: Box<dyn VectorIndex>,
    collection: String,
}

impl Retriever {
    pub fn new(
        embedder: Box<dyn Embedder>,
        index: Box<dyn VectorIndex>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
        }
    }

    /// Build the OpenAI embeddings and Qdrant clients described by `config`
    pub fn from_config(config: &RetrievalConfig) -> ToolResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                ToolError::Internal("retrieval needs an api key or OPENAI_API_KEY".to_string())
            })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::Internal(e.to_string()))?;

        let embedder = OpenAiEmbeddings::new(
            client.clone(),
            &config.embedding_url,
            &config.embedding_model,
            api_key,
        )?;
        let index = QdrantIndex::new(client, &config.qdrant_url, config.qdrant_api_key.clone())?;
        Ok(Self::new(
            Box::new(embedder),
            Box::new(index),
            config.collection.clone(),
        ))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Stored pairs whose question is closest to `query`
    pub async fn lookup(&self, query: &str, limit: usize) -> ToolResult<Vec<QaPair>> {
        let vector = self.embedder.embed(query).await?;
        let hits = self.index.search(&self.collection, vector, limit).await?;
        debug!(collection = %self.collection, hits = hits.len(), "retrieval search");
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let question = hit.payload["question"].as_str()?.to_string();
                let answer = hit.payload["page_content"].as_str()?.to_string();
                Some(QaPair { question, answer })
            })
            .collect())
    }

    /// Embed each question and store it with its answer, creating the
    /// collection first if it does not exist. Returns the number stored.
    pub async fn ingest(&self, pairs: &[QaPair]) -> ToolResult<usize> {
        let mut points = Vec::with_capacity(pairs.len());
        for pair in pairs {
            points.push(Point {
                id: Uuid::new_v4().to_string(),
                vector: self.embedder.embed(&pair.question).await?,
                payload: json!({"question": pair.question, "page_content": pair.answer}),
            });
        }
        let Some(size) = points.first().map(|p| p.vector.len()) else {
            return Ok(0);
        };

        if !self.index.collection_exists(&self.collection).await? {
            info!(collection = %self.collection, size, "creating collection");
            self.index.create_collection(&self.collection, size).await?;
        }
        let count = points.len();
        self.index.upsert(&self.collection, points).await?;
        info!(collection = %self.collection, count, "stored question/answer pairs");
        Ok(count)
    }
}

/// The `get_answer` tool
pub struct RetrievalTool {
    retriever: Arc<Retriever>,
    limit: usize,
    signature: ToolSignature,
}

impl RetrievalTool {
    pub fn new(retriever: Arc<Retriever>, limit: usize) -> Self {
        let signature = ToolSignature::new(TOOL_NAME)
            .with_description(
                "Answer questions about the store, its services and policies \
                 from the knowledge base",
            )
            .with_param(
                Param::required("query", ParamType::String)
                    .with_description("The customer's question"),
            );
        Self {
            retriever,
            limit,
            signature,
        }
    }
}

#[async_trait]
impl ToolFunction for RetrievalTool {
    fn signature(&self) -> &ToolSignature {
        &self.signature
    }

    async fn call(&self, args: ToolArgs) -> ToolResult<String> {
        let query = args.str("query")?;
        let pairs = self.retriever.lookup(query, self.limit).await?;
        if pairs.is_empty() {
            return Ok(NO_ANSWER.to_string());
        }
        Ok(pairs
            .iter()
            .map(|pair| format!("Q: {}\nA: {}", pair.question, pair.answer))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

pub struct RetrievalTools {
    config: RetrievalConfig,
}

impl RetrievalTools {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }
}

impl ToolSource for RetrievalTools {
    fn name(&self) -> &str {
        "retrieval"
    }

    fn tools(&self) -> ToolResult<Vec<ToolRegistration>> {
        let retriever = Retriever::from_config(&self.config)?;
        Ok(vec![register_tool(RetrievalTool::new(
            Arc::new(retriever),
            self.config.limit,
        ))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> RetrievalConfig {
        RetrievalConfig {
            embedding_url: format!("{}/v1", server.uri()),
            api_key: Some("sk-test".to_string()),
            qdrant_url: server.uri(),
            qdrant_api_key: Some("qd-test".to_string()),
            collection: "faq".to_string(),
            ..Default::default()
        }
    }

    async fn mount_embeddings(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "text-embedding-3-large"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1, 0.2, 0.3]}]
            })))
            .mount(server)
            .await;
    }

    async fn answer(server: &MockServer, query: &str) -> ToolResult<String> {
        let tool = RetrievalTool::new(Arc::new(Retriever::from_config(&config(server))?), 3);
        let args = tool.signature().bind(TOOL_NAME, json!({ "query": query }))?;
        tool.call(args).await
    }

    #[tokio::test]
    async fn test_get_answer_formats_hits() {
        let server = MockServer::start().await;
        mount_embeddings(&server).await;
        Mock::given(method("POST"))
            .and(path("/collections/faq/points/search"))
            .and(header("api-key", "qd-test"))
            .and(body_partial_json(json!({"limit": 3, "with_payload": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"id": "a", "score": 0.91, "payload": {
                        "question": "Do you ship abroad?",
                        "page_content": "Yes, to most countries."}},
                    {"id": "b", "score": 0.52, "payload": {
                        "question": "Can I print my logo?",
                        "page_content": "Every product can be customised."}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = answer(&server, "do you deliver overseas").await.unwrap();
        assert_eq!(
            output,
            "Q: Do you ship abroad?\nA: Yes, to most countries.\n\n\
             Q: Can I print my logo?\nA: Every product can be customised."
        );
    }

    #[tokio::test]
    async fn test_get_answer_without_hits() {
        let server = MockServer::start().await;
        mount_embeddings(&server).await;
        Mock::given(method("POST"))
            .and(path("/collections/faq/points/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .mount(&server)
            .await;

        assert_eq!(answer(&server, "anything").await.unwrap(), NO_ANSWER);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_an_execution_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = answer(&server, "anything").await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionError { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_ingest_creates_missing_collection() {
        let server = MockServer::start().await;
        mount_embeddings(&server).await;
        Mock::given(method("GET"))
            .and(path("/collections/faq"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/faq"))
            .and(body_partial_json(json!({"vectors": {"size": 3, "distance": "Dot"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/faq/points"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let retriever = Retriever::from_config(&config(&server)).unwrap();
        let pairs = vec![
            QaPair {
                question: "Do you ship abroad?".to_string(),
                answer: "Yes.".to_string(),
            },
            QaPair {
                question: "Is there a minimum order?".to_string(),
                answer: "One piece.".to_string(),
            },
        ];
        assert_eq!(retriever.ingest(&pairs).await.unwrap(), 2);

        let requests = server.received_requests().await.unwrap();
        let upsert = requests
            .iter()
            .find(|r| r.url.path() == "/collections/faq/points")
            .unwrap();
        let body: Value = serde_json::from_slice(&upsert.body).unwrap();
        assert_eq!(body["points"].as_array().unwrap().len(), 2);
        assert_eq!(body["points"][1]["payload"]["page_content"], "One piece.");
    }

    #[tokio::test]
    async fn test_ingest_reuses_existing_collection() {
        let server = MockServer::start().await;
        mount_embeddings(&server).await;
        Mock::given(method("GET"))
            .and(path("/collections/faq"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/faq"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/faq/points"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;

        let retriever = Retriever::from_config(&config(&server)).unwrap();
        let pairs = vec![QaPair {
            question: "q".to_string(),
            answer: "a".to_string(),
        }];
        assert_eq!(retriever.ingest(&pairs).await.unwrap(), 1);
        assert_eq!(retriever.ingest(&[]).await.unwrap(), 0);
    }

    #[test]
    fn test_retrieval_source_rejects_bad_url() {
        let config = RetrievalConfig {
            api_key: Some("sk-test".to_string()),
            qdrant_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            RetrievalTools::new(config).tools(),
            Err(ToolError::Internal(_))
        ));
    }

    #[test]
    fn test_endpoint_keeps_prefix() {
        let base = Url::parse("https://api.openai.com/v1").unwrap();
        assert_eq!(
            endpoint(&base, "embeddings").unwrap().as_str(),
            "https://api.openai.com/v1/embeddings"
        );
    }
}
