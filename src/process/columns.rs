use anyhow::Result;
use std::collections::HashSet;

use crate::error::AuctionError;

/// Canonical form of a header: trimmed, whitespace → `_`, lowercased.
///
/// `" Date of Auction "` becomes `"date_of_auction"`. Applying it twice gives
/// the same result as applying it once.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize a whole header row. Two raw headers landing on the same
/// canonical name is rejected rather than silently dropping a column.
pub fn normalize_headers(headers: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::with_capacity(headers.len());
    let mut out = Vec::with_capacity(headers.len());
    for raw in headers {
        let name = normalize_header(raw);
        if !seen.insert(name.clone()) {
            return Err(AuctionError::DuplicateColumn { column: name }.into());
        }
        out.push(name);
    }
    Ok(out)
}
