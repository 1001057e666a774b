//! One-shot recall against a `SQLite` memory store.
//! Run with: cargo run --bin halldyll-recall -- [--config PATH] <conversation:user:character> <query> [limit]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use halldyll_recall::{OwnerKey, RecallConfig, RetrievalEngine, init_tracing};

const DEFAULT_LIMIT: usize = 10;
const USAGE: &str =
    "usage: halldyll-recall [--config PATH] <conversation:user:character> <query> [limit]";

struct Args {
    config: Option<PathBuf>,
    owner: OwnerKey,
    query: String,
    limit: usize,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let mut config = std::env::var_os("RECALL_CONFIG").map(PathBuf::from);
    let mut positional = Vec::new();
    while let Some(arg) = raw.next() {
        if arg == "--config" {
            let path = raw.next().context("--config needs a path")?;
            config = Some(PathBuf::from(path));
        } else {
            positional.push(arg);
        }
    }

    let (owner, query, limit) = match positional.as_slice() {
        [owner, query] => (owner, query, None),
        [owner, query, limit] => (owner, query, Some(limit)),
        _ => bail!(USAGE),
    };
    let owner: OwnerKey = owner.parse().context("invalid owner key")?;
    let limit = limit
        .map(|l| l.parse::<usize>())
        .transpose()
        .context("limit must be a non-negative integer")?
        .unwrap_or(DEFAULT_LIMIT);

    Ok(Args {
        config,
        owner,
        query: query.clone(),
        limit,
    })
}

async fn recall(args: Args) -> anyhow::Result<String> {
    let config = match &args.config {
        Some(path) => RecallConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RecallConfig::default(),
    };
    let engine = RetrievalEngine::from_config(config)
        .await
        .context("initializing recall engine")?;
    let ranked = engine
        .retrieve(&args.owner, &args.query, args.limit, None)
        .await
        .context("retrieval failed")?;
    Ok(serde_json::to_string_pretty(&ranked)?)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::from(2);
        }
    };

    match recall(args).await {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> anyhow::Result<Args> {
        parse_args(raw.iter().map(ToString::to_string))
    }

    #[test]
    fn test_parse_positional_and_flag() {
        let parsed = args(&["--config", "recall.json", "c:u:k", "what makes me anxious?", "5"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("recall.json")));
        assert_eq!(parsed.owner.partition(), "c:u:k");
        assert_eq!(parsed.query, "what makes me anxious?");
        assert_eq!(parsed.limit, 5);
    }

    #[test]
    fn test_parse_defaults_limit() {
        assert_eq!(args(&["c:u:k", "hello"]).unwrap().limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(args(&["c:u:k"]).is_err());
        assert!(args(&["c:u", "hello"]).is_err());
        assert!(args(&["c:u:k", "hello", "many"]).is_err());
        assert!(args(&["c:u:k", "hello", "--config"]).is_err());
    }
}
