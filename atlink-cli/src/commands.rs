use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use atlink_core::index::{FileIndex, WalkIndex};
use atlink_core::selection::{ContextSelector, SelectionEvent, SelectorConfig};
use atlink_core::{AtlinkConfig, StreamParser, StreamSummary};

fn open_input(file: Option<PathBuf>) -> anyhow::Result<Box<dyn Read>> {
    match file {
        Some(path) if path.as_os_str() != "-" => {
            let f = std::fs::File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(f))
        }
        _ => Ok(Box::new(std::io::stdin())),
    }
}

pub fn parse(file: Option<PathBuf>, summary_only: bool) -> anyhow::Result<()> {
    let reader = BufReader::new(open_input(file)?);
    let mut parser = StreamParser::new();
    let mut summary = StreamSummary::new();

    let mut emit = |messages: Vec<atlink_core::CliMessage>| -> anyhow::Result<()> {
        for msg in messages {
            summary.observe(&msg);
            if !summary_only {
                println!("{}", serde_json::to_string(&msg)?);
            }
        }
        Ok(())
    };

    for line in reader.lines() {
        let mut line = line?;
        line.push('\n');
        emit(parser.push(&line))?;
    }
    emit(parser.finish())?;

    tracing::info!(
        "parsed {} messages, skipped {} lines",
        parser.parsed(),
        parser.skipped()
    );
    println!(
        "{}",
        serde_json::json!({
            "summary": summary,
            "parsed": parser.parsed(),
            "skipped": parser.skipped(),
        })
    );
    Ok(())
}

pub fn detect(text: &str, cursor: Option<usize>) -> anyhow::Result<()> {
    let cursor = cursor.unwrap_or(text.len());
    let value = match atlink_core::detect(text, cursor) {
        Some(q) => serde_json::json!({
            "trigger_index": q.trigger_index,
            "query": q.query,
            "end_index": q.end_index(),
        }),
        None => serde_json::Value::Null,
    };
    println!("{value}");
    Ok(())
}

async fn build_index(root: &Path, config: &AtlinkConfig) -> anyhow::Result<Arc<WalkIndex>> {
    let index = Arc::new(WalkIndex::from_config(root, config)?);
    index.build().await?;
    Ok(index)
}

pub async fn search(query: &str, root: &Path, config: &AtlinkConfig) -> anyhow::Result<()> {
    let index = build_index(root, config).await?;
    let candidates = index.search_files(query, config.max_results).await;
    for r in atlink_core::search(query, &candidates, config.max_results) {
        let slash = if r.item.is_directory { "/" } else { "" };
        println!(
            "{:>3}  {:<8}  {}{slash}",
            r.weight,
            r.match_type.as_str(),
            r.item.relative_path
        );
    }
    Ok(())
}

pub async fn pick(
    text: &str,
    cursor: Option<usize>,
    root: &Path,
    choose: usize,
    config: &AtlinkConfig,
) -> anyhow::Result<()> {
    let cursor = cursor.unwrap_or(text.len());
    let Some(at) = atlink_core::detect(text, cursor) else {
        bail!("no @ query at byte {cursor}");
    };

    let index = build_index(root, config).await?;
    let selector_config = SelectorConfig::from(config);
    let encoding = selector_config.encoding;
    let mut selector = ContextSelector::new(index, selector_config);

    selector.dispatch(SelectionEvent::OpenInline {
        trigger_index: at.trigger_index,
        query: at.query.to_string(),
    });
    selector.next_results().await;

    let Some(commit) = selector.dispatch(SelectionEvent::ConfirmAt(choose)) else {
        bail!(
            "no result at row {choose} for {:?} ({} found)",
            at.query,
            selector.state().results.len()
        );
    };
    let replaced = commit.apply(text, cursor, encoding);
    println!("{}", replaced.text);
    Ok(())
}

pub fn refs(text: &str) -> anyhow::Result<()> {
    let parsed = atlink_core::parse_references(text);
    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}

pub fn config(config: &AtlinkConfig, path: &Path, init: bool) -> anyhow::Result<()> {
    if init {
        config.save_to(path)?;
        eprintln!("wrote {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
