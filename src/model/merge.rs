//! Combining several repositories into one "all repositories" graph.
//!
//! Node ids are only unique inside one repository (`file:src/main.rs`
//! appears everywhere), so every id is prefixed with the repository's full
//! name. Each repository contributes at most `limit_per_repo` nodes, picked
//! by [`truncate_by_priority`].

use std::collections::HashSet;

use serde_json::Value;

use super::ingest::{IngestReport, Ingested};
use super::types::{GraphEdge, GraphNode, GraphPayload, GraphStats, NodeKind};

/// Separator between repository and local id in merged ids.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Merged-scope id of node `id` from `repository`.
pub fn namespace_id(repository: &str, id: &str) -> String {
	format!("{repository}{NAMESPACE_SEPARATOR}{id}")
}

/// Lower sorts first: vulnerabilities by severity, then files, then the rest.
fn priority(node: &GraphNode) -> (u8, u8) {
	match node.kind {
		NodeKind::Vulnerability => (0, node.severity_or_unknown().rank()),
		NodeKind::File => (1, 0),
		NodeKind::Repository => (2, 0),
		NodeKind::Dependency => (3, 0),
		NodeKind::Analysis => (4, 0),
		NodeKind::Other => (5, 0),
	}
}

/// Keeps at most `limit` nodes, preferring the most severe vulnerabilities,
/// then files, then repository, dependency, analysis and other nodes. Ties
/// keep insertion order, and survivors are returned in insertion order, so
/// the result is the same for the same input on every run.
pub fn truncate_by_priority(nodes: Vec<GraphNode>, limit: usize) -> Vec<GraphNode> {
	if nodes.len() <= limit {
		return nodes;
	}
	let mut order: Vec<usize> = (0..nodes.len()).collect();
	// stable, so equal priorities stay in insertion order
	order.sort_by_key(|&i| priority(&nodes[i]));

	let mut keep = vec![false; nodes.len()];
	for &i in order.iter().take(limit) {
		keep[i] = true;
	}
	nodes
		.into_iter()
		.zip(keep)
		.filter_map(|(node, kept)| kept.then_some(node))
		.collect()
}

/// One repository's share of a merged view, with its untruncated stats.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoBreakdown {
	/// `owner/name`.
	pub repository: String,
	/// Counts of this repository's kept nodes and edges.
	pub stats: GraphStats,
}

/// Result of [`merge_payloads`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergedGraph {
	/// Namespaced, truncated union of all parts.
	pub payload: GraphPayload,
	/// Per-repository stats before truncation, in input order.
	pub breakdown: Vec<RepoBreakdown>,
	/// Integrity counters of the merge itself.
	pub report: IngestReport,
}

/// Truncates, namespaces and concatenates already ingested payloads.
/// Edges survive only if both endpoints survived truncation.
pub fn merge_payloads(parts: Vec<(String, GraphPayload)>, limit_per_repo: usize) -> MergedGraph {
	let mut nodes = Vec::new();
	let mut edges = Vec::new();
	let mut breakdown = Vec::with_capacity(parts.len());

	for (repository, payload) in parts {
		breakdown.push(RepoBreakdown {
			repository: repository.clone(),
			stats: payload.stats.clone(),
		});

		let kept = truncate_by_priority(payload.nodes, limit_per_repo);
		let kept_ids: HashSet<&str> = kept.iter().map(|n| n.id.as_str()).collect();
		edges.extend(
			payload
				.edges
				.into_iter()
				.filter(|e| {
					kept_ids.contains(e.source.as_str()) && kept_ids.contains(e.target.as_str())
				})
				.map(|e| GraphEdge {
					source: namespace_id(&repository, &e.source),
					target: namespace_id(&repository, &e.target),
					kind: e.kind,
				}),
		);
		nodes.extend(kept.into_iter().map(|mut node| {
			node.id = namespace_id(&repository, &node.id);
			node.data
				.entry("repository")
				.or_insert_with(|| Value::String(repository.clone()));
			node
		}));
	}

	let Ingested {
		mut payload,
		report,
	} = GraphPayload::from_parts(nodes, edges);
	payload.stats.repositories = breakdown.len();
	MergedGraph {
		payload,
		breakdown,
		report,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::Severity;

	fn vulns(critical: usize, low: usize) -> Vec<GraphNode> {
		// lows first so insertion order alone would lose the criticals
		let lows = (0..low).map(|i| {
			GraphNode::new(format!("vuln:low-{i}"), NodeKind::Vulnerability, "low")
				.with_severity(Severity::Low)
		});
		let crits = (0..critical).map(|i| {
			GraphNode::new(format!("vuln:crit-{i}"), NodeKind::Vulnerability, "crit")
				.with_severity(Severity::Critical)
		});
		lows.chain(crits).collect()
	}

	#[test]
	fn test_truncation_keeps_all_criticals() {
		let kept = truncate_by_priority(vulns(10, 30), 30);
		assert_eq!(kept.len(), 30);
		let crit = kept
			.iter()
			.filter(|n| n.severity == Some(Severity::Critical))
			.count();
		assert_eq!(crit, 10);
		let lows: Vec<&str> = kept
			.iter()
			.filter(|n| n.severity == Some(Severity::Low))
			.map(|n| n.id.as_str())
			.collect();
		let expected: Vec<String> = (0..20).map(|i| format!("vuln:low-{i}")).collect();
		assert_eq!(lows, expected);
	}

	#[test]
	fn test_truncation_is_deterministic() {
		let mut nodes = vulns(3, 7);
		nodes.insert(2, GraphNode::new("file:a", NodeKind::File, "a"));
		nodes.push(GraphNode::new("dep:x@1", NodeKind::Dependency, "x"));
		nodes.push(GraphNode::new("vuln:h", NodeKind::Vulnerability, "h").with_severity(Severity::High));
		let first = truncate_by_priority(nodes.clone(), 6);
		for _ in 0..5 {
			assert_eq!(truncate_by_priority(nodes.clone(), 6), first);
		}
		assert!(first.iter().any(|n| n.id == "vuln:h"));
		assert!(!first.iter().any(|n| n.id == "dep:x@1"));
	}

	#[test]
	fn test_files_outrank_other_kinds() {
		let nodes = vec![
			GraphNode::new("analysis:1", NodeKind::Analysis, "a"),
			GraphNode::new("repo:o/r", NodeKind::Repository, "r"),
			GraphNode::new("file:a", NodeKind::File, "a"),
			GraphNode::new("dep:x", NodeKind::Dependency, "x"),
		];
		let kept: Vec<String> = truncate_by_priority(nodes, 2).into_iter().map(|n| n.id).collect();
		assert_eq!(kept, vec!["repo:o/r".to_string(), "file:a".to_string()]);
	}

	#[test]
	fn test_merge_namespaces_colliding_ids() {
		let part = |repo: &str| {
			let ingested = GraphPayload::from_parts(
				vec![
					GraphNode::new("repo", NodeKind::Repository, repo),
					GraphNode::new("file:src/main.rs", NodeKind::File, "main.rs"),
				],
				vec![GraphEdge::new("repo", "file:src/main.rs", "CONTAINS")],
			);
			(repo.to_string(), ingested.payload)
		};
		let merged = merge_payloads(vec![part("org/a"), part("org/b")], 50);

		let ids: HashSet<&str> = merged.payload.nodes.iter().map(|n| n.id.as_str()).collect();
		assert_eq!(ids.len(), 4);
		assert!(ids.contains("org/a::file:src/main.rs"));
		assert!(ids.contains("org/b::file:src/main.rs"));
		assert_eq!(merged.payload.edges.len(), 2);
		assert!(merged.report.is_clean());
		assert_eq!(merged.payload.stats.repositories, 2);
		assert_eq!(merged.breakdown.len(), 2);
		assert_eq!(
			merged.payload.nodes[1].data.get("repository"),
			Some(&Value::String("org/a".into()))
		);
	}

	#[test]
	fn test_merge_drops_edges_of_truncated_nodes() {
		let ingested = GraphPayload::from_parts(
			vec![
				GraphNode::new("file:a", NodeKind::File, "a"),
				GraphNode::new("dep:x", NodeKind::Dependency, "x"),
			],
			vec![GraphEdge::new("file:a", "dep:x", "IMPORTS")],
		);
		let merged = merge_payloads(vec![("o/r".into(), ingested.payload)], 1);
		assert_eq!(merged.payload.nodes.len(), 1);
		assert!(merged.payload.edges.is_empty());
		assert_eq!(merged.breakdown[0].stats.total_nodes, 2);
	}
}
