use std::collections::HashMap;

use super::ingest::Ingested;
use super::types::{GraphPayload, NodeKind, Severity};

/// A file with several vulnerabilities attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighRiskFile {
	/// Node id of the file.
	pub id: String,
	/// Display name, usually the file path.
	pub label: String,
	/// Number of distinct vulnerability nodes linked to the file.
	pub vulnerabilities: usize,
	/// Most severe of those.
	pub worst: Severity,
}

/// Files linked to at least `min_vulnerabilities` vulnerability nodes, most
/// affected first (ties: worse severity first, then id).
pub fn high_risk_files(payload: &GraphPayload, min_vulnerabilities: usize) -> Vec<HighRiskFile> {
	let by_id: HashMap<&str, _> = payload.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
	let mut hits: HashMap<&str, (usize, Severity)> = HashMap::new();

	for edge in &payload.edges {
		let (Some(a), Some(b)) = (by_id.get(edge.source.as_str()), by_id.get(edge.target.as_str()))
		else {
			continue;
		};
		let (file, vuln) = match (a.kind, b.kind) {
			(NodeKind::File, NodeKind::Vulnerability) => (a, b),
			(NodeKind::Vulnerability, NodeKind::File) => (b, a),
			_ => continue,
		};
		let entry = hits.entry(file.id.as_str()).or_insert((0, Severity::Unknown));
		entry.0 += 1;
		if vuln.severity_or_unknown().rank() < entry.1.rank() {
			entry.1 = vuln.severity_or_unknown();
		}
	}

	let mut files: Vec<HighRiskFile> = hits
		.into_iter()
		.filter(|(_, (count, _))| *count >= min_vulnerabilities.max(1))
		.filter_map(|(id, (vulnerabilities, worst))| {
			by_id.get(id).map(|node| HighRiskFile {
				id: id.to_owned(),
				label: node.label.clone(),
				vulnerabilities,
				worst,
			})
		})
		.collect();
	files.sort_by(|a, b| {
		b.vulnerabilities
			.cmp(&a.vulnerabilities)
			.then(a.worst.rank().cmp(&b.worst.rank()))
			.then_with(|| a.id.cmp(&b.id))
	});
	files
}

/// A view of `payload` without vulnerabilities less severe than `min`.
/// Other node kinds are untouched; edges follow their endpoints.
pub fn filter_min_severity(payload: &GraphPayload, min: Option<Severity>) -> GraphPayload {
	let Some(min) = min else {
		return payload.clone();
	};
	let nodes = payload
		.nodes
		.iter()
		.filter(|n| n.kind != NodeKind::Vulnerability || n.severity_or_unknown().rank() <= min.rank())
		.cloned()
		.collect();
	let Ingested { payload, .. } = GraphPayload::from_parts(nodes, payload.edges.clone());
	payload
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{GraphEdge, GraphNode};

	fn sample() -> GraphPayload {
		let nodes = vec![
			GraphNode::new("file:a", NodeKind::File, "a.py"),
			GraphNode::new("file:b", NodeKind::File, "b.py"),
			GraphNode::new("v1", NodeKind::Vulnerability, "XSS").with_severity(Severity::Low),
			GraphNode::new("v2", NodeKind::Vulnerability, "SQLi").with_severity(Severity::Critical),
			GraphNode::new("v3", NodeKind::Vulnerability, "SSRF").with_severity(Severity::Medium),
		];
		let edges = vec![
			GraphEdge::new("file:a", "v1", "HAS_VULNERABILITY"),
			GraphEdge::new("file:a", "v2", "HAS_VULNERABILITY"),
			GraphEdge::new("file:b", "v3", "HAS_VULNERABILITY"),
		];
		GraphPayload::from_parts(nodes, edges).payload
	}

	#[test]
	fn test_high_risk_files_threshold() {
		let files = high_risk_files(&sample(), 2);
		assert_eq!(files.len(), 1);
		assert_eq!(files[0].id, "file:a");
		assert_eq!(files[0].vulnerabilities, 2);
		assert_eq!(files[0].worst, Severity::Critical);

		let files = high_risk_files(&sample(), 1);
		assert_eq!(files.len(), 2);
		assert_eq!(files[1].id, "file:b");
	}

	#[test]
	fn test_filter_min_severity() {
		let filtered = filter_min_severity(&sample(), Some(Severity::Medium));
		let ids: Vec<&str> = filtered.nodes.iter().map(|n| n.id.as_str()).collect();
		assert_eq!(ids, vec!["file:a", "file:b", "v2", "v3"]);
		assert_eq!(filtered.edges.len(), 2);
		assert_eq!(filtered.stats.vulnerabilities, 2);

		assert_eq!(filter_min_severity(&sample(), None), sample());
	}
}
