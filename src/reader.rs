use std::path::Path;

use anyhow::Context;

/// Splits raw input into target URLs: one per line, trimmed, blanks dropped.
///
/// Entries are passed through as-is. No deduplication and no URL validation,
/// a malformed line simply fails later at fetch time.
pub fn parse_urls(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

pub async fn read_urls(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = tokio::fs::read(path)
        .await
        .context(format!("could not read input file {:?}", path))?;
    let urls = parse_urls(&String::from_utf8_lossy(&raw));
    debug!("{} urls read from {:?}", urls.len(), path);
    Ok(urls)
}
