// Trust-weighted search index over every tool of every known server

use crate::types::{FederatedServer, FederatedTool, SearchOptions, ToolSearchResult};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const EXACT_NAME_SCORE: f64 = 100.0;
const PREFIX_NAME_SCORE: f64 = 80.0;
const NAME_CONTAINS_SCORE: f64 = 60.0;
const DESCRIPTION_CONTAINS_SCORE: f64 = 30.0;
const KEYWORD_IN_NAME_SCORE: f64 = 10.0;
const KEYWORD_IN_DESCRIPTION_SCORE: f64 = 5.0;

#[derive(Debug, Clone)]
struct CatalogEntry {
    server_id: String,
    server_name: String,
    endpoint: String,
    server_sequence: u64,
    tool_position: usize,
    tool: FederatedTool,
    name: String,
    description: String,
    trust_score: f64,
}

/// Flattened `(server, tool)` index, rebuilt by the registry whenever the
/// set of servers, their catalogs or their trust scores change.
#[derive(Default)]
pub struct ToolCatalogIndex {
    entries: RwLock<Vec<CatalogEntry>>,
}

impl ToolCatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<CatalogEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<CatalogEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the index with the given servers and their insertion sequences
    pub fn reindex<'a, I>(&self, servers: I)
    where
        I: IntoIterator<Item = (&'a FederatedServer, u64)>,
    {
        let mut entries = Vec::new();
        for (server, sequence) in servers {
            for (position, tool) in server.tools.iter().enumerate() {
                entries.push(CatalogEntry {
                    server_id: server.id.clone(),
                    server_name: server.name.clone(),
                    endpoint: server.endpoint.clone(),
                    server_sequence: sequence,
                    tool_position: position,
                    tool: tool.clone(),
                    name: tool.name.to_lowercase(),
                    description: tool.description.to_lowercase(),
                    trust_score: server.trust_score,
                });
            }
        }
        tracing::debug!("Reindexed tool catalog: {} tools", entries.len());
        *self.write() = entries;
    }

    pub fn tool_count(&self) -> usize {
        self.read().len()
    }

    /// Rank matching tools by textual relevance boosted by host trust.
    ///
    /// Ties fall back to host trust, then registration order.
    pub fn search_tools(&self, query: &str, options: &SearchOptions) -> Vec<ToolSearchResult> {
        let query = query.trim().to_lowercase();
        let keywords: Vec<&str> = query.split_whitespace().collect();

        let entries = self.read();
        let mut hits: Vec<(&CatalogEntry, f64, f64)> = entries
            .iter()
            .filter(|entry| match &options.category {
                Some(category) => entry.tool.category.eq_ignore_ascii_case(category),
                None => true,
            })
            .filter_map(|entry| {
                let relevance = relevance(&query, &keywords, entry);
                (relevance > 0.0).then(|| (entry, relevance, trust_boost(relevance, entry.trust_score)))
            })
            .collect();

        hits.sort_by(|(a, _, a_score), (b, _, b_score)| {
            b_score
                .total_cmp(a_score)
                .then_with(|| b.trust_score.total_cmp(&a.trust_score))
                .then_with(|| a.server_sequence.cmp(&b.server_sequence))
                .then_with(|| a.tool_position.cmp(&b.tool_position))
        });

        let limit = options.limit.unwrap_or(usize::MAX);
        hits.into_iter()
            .take(limit)
            .map(|(entry, relevance, score)| ToolSearchResult {
                server_id: entry.server_id.clone(),
                server_name: entry.server_name.clone(),
                endpoint: entry.endpoint.clone(),
                tool: entry.tool.clone(),
                trust_score: entry.trust_score,
                relevance,
                score,
            })
            .collect()
    }
}

fn relevance(query: &str, keywords: &[&str], entry: &CatalogEntry) -> f64 {
    if query.is_empty() {
        return 1.0;
    }

    let mut score = if entry.name == query {
        EXACT_NAME_SCORE
    } else if entry.name.starts_with(query) {
        PREFIX_NAME_SCORE
    } else if entry.name.contains(query) {
        NAME_CONTAINS_SCORE
    } else {
        0.0
    };

    if entry.description.contains(query) {
        score += DESCRIPTION_CONTAINS_SCORE;
    }

    if keywords.len() > 1 {
        for keyword in keywords {
            if entry.name.contains(keyword) {
                score += KEYWORD_IN_NAME_SCORE;
            }
            if entry.description.contains(keyword) {
                score += KEYWORD_IN_DESCRIPTION_SCORE;
            }
        }
    }

    score
}

/// Multiplicative boost, strictly increasing in trust for any positive relevance
fn trust_boost(relevance: f64, trust_score: f64) -> f64 {
    relevance * (1.0 + trust_score / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::is_ranked;
    use chrono::Utc;

    fn server(id: &str, trust: f64, tools: Vec<FederatedTool>) -> FederatedServer {
        FederatedServer {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            endpoint: format!("http://{}.local", id),
            protocol_version: "1.0".to_string(),
            owner: "owner".to_string(),
            tools,
            capabilities: Default::default(),
            trust_score: trust,
            registered_at: Utc::now(),
            last_seen_at: Utc::now(),
            metadata: Default::default(),
        }
    }

    fn index(servers: &[FederatedServer]) -> ToolCatalogIndex {
        let index = ToolCatalogIndex::new();
        index.reindex(servers.iter().enumerate().map(|(i, s)| (s, i as u64)));
        index
    }

    #[test]
    fn test_exact_name_beats_prefix_and_description() {
        let servers = vec![server(
            "a",
            50.0,
            vec![
                FederatedTool::new("quote_history", "historical quotes", "market"),
                FederatedTool::new("quote", "latest quote", "market"),
                FederatedTool::new("fetch_news", "news that may quote prices", "news"),
            ],
        )];
        let results = index(&servers).search_tools("quote", &SearchOptions::default());

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].tool.name, "quote");
        assert_eq!(results[1].tool.name, "quote_history");
        assert_eq!(results[2].tool.name, "fetch_news");
        assert!(is_ranked(&results));
    }

    #[test]
    fn test_trust_breaks_textual_ties() {
        let servers = vec![
            server("low", 30.0, vec![FederatedTool::new("get_x", "", "data")]),
            server("high", 90.0, vec![FederatedTool::new("get_x", "", "data")]),
            server("mid", 60.0, vec![FederatedTool::new("get_x", "", "data")]),
        ];
        let results = index(&servers).search_tools("get", &SearchOptions::default());

        let order: Vec<&str> = results.iter().map(|r| r.server_id.as_str()).collect();
        assert_eq!(order, vec!["high", "mid", "low"]);
        assert_eq!(results[0].relevance, results[2].relevance);
    }

    #[test]
    fn test_raising_trust_never_moves_a_tool_down() {
        let mut servers = vec![
            server("a", 40.0, vec![FederatedTool::new("get_price", "price", "market")]),
            server("b", 50.0, vec![FederatedTool::new("get_price", "price", "market")]),
        ];
        let before = index(&servers).search_tools("price", &SearchOptions::default());
        assert_eq!(before[0].server_id, "b");

        servers[0].trust_score = 70.0;
        let after = index(&servers).search_tools("price", &SearchOptions::default());
        assert_eq!(after[0].server_id, "a");
    }

    #[test]
    fn test_category_filter_and_limit() {
        let servers = vec![server(
            "a",
            50.0,
            vec![
                FederatedTool::new("get_price", "", "market"),
                FederatedTool::new("get_news", "", "news"),
                FederatedTool::new("get_volume", "", "market"),
            ],
        )];
        let index = index(&servers);

        let market = index.search_tools(
            "get",
            &SearchOptions {
                category: Some("Market".to_string()),
                limit: None,
            },
        );
        assert_eq!(market.len(), 2);
        assert!(market.iter().all(|r| r.tool.category == "market"));

        let limited = index.search_tools(
            "",
            &SearchOptions {
                category: None,
                limit: Some(1),
            },
        );
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].tool.name, "get_price");
    }

    #[test]
    fn test_non_matching_tools_are_excluded() {
        let servers = vec![server("a", 50.0, vec![FederatedTool::new("get_price", "", "market")])];
        assert!(index(&servers)
            .search_tools("weather", &SearchOptions::default())
            .is_empty());
    }
}
