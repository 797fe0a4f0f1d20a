pub mod chat;
pub mod ingest;

use clap::Args;
use parley::tools::retrieval::RetrievalConfig;

/// Where the question/answer index lives
#[derive(Args, Debug, Clone)]
pub struct RetrievalArgs {
    /// Qdrant base URL
    #[arg(long, default_value = "http://localhost:6333")]
    pub qdrant_url: String,

    /// Collection holding the question/answer pairs
    #[arg(long, default_value = "store_qa")]
    pub collection: String,

    /// Embedding model (OPENAI_API_KEY is used for the embedding calls)
    #[arg(long, default_value = "text-embedding-3-large")]
    pub embedding_model: String,
}

impl RetrievalArgs {
    pub fn to_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            qdrant_url: self.qdrant_url.clone(),
            qdrant_api_key: std::env::var("QDRANT_API_KEY").ok(),
            collection: self.collection.clone(),
            embedding_model: self.embedding_model.clone(),
            ..RetrievalConfig::default()
        }
    }
}
