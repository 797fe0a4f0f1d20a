use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use tracing::info;

use super::RetrievalArgs;
use parley::tools::retrieval::{QaPair, Retriever};

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// JSON file holding an array of {"question", "answer"} objects
    pub file: PathBuf,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,
}

fn load_pairs(path: &Path) -> Result<Vec<QaPair>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let pairs: Vec<QaPair> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a list of question/answer pairs", path.display()))?;
    Ok(pairs
        .into_iter()
        .filter(|pair| !pair.question.trim().is_empty())
        .collect())
}

pub async fn execute(args: IngestArgs) -> Result<()> {
    let pairs = load_pairs(&args.file)?;
    let config = args.retrieval.to_config();
    info!(
        file = %args.file.display(),
        pairs = pairs.len(),
        collection = %config.collection,
        "ingesting"
    );

    let retriever = Retriever::from_config(&config).context("failed to set up retrieval")?;
    let stored = retriever.ingest(&pairs).await.context("ingest failed")?;

    println!(
        "{} {} pairs into '{}'",
        style("stored").green().bold(),
        stored,
        retriever.collection()
    );
    Ok(())
}
