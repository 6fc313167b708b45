use std::collections::HashSet;

use log::warn;

use super::types::{GraphEdge, GraphNode, GraphPayload, GraphStats, RawGraph};

/// Data-quality counters collected while ingesting a payload. Non-zero
/// values are warnings, never errors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
	/// Nodes dropped because an earlier node had the same id.
	pub duplicate_nodes: usize,
	/// Edges dropped because an endpoint is not in the node set.
	pub dangling_edges: usize,
}

impl IngestReport {
	/// Nothing was dropped.
	pub fn is_clean(&self) -> bool {
		self.duplicate_nodes == 0 && self.dangling_edges == 0
	}

	/// Adds another report's counters to this one.
	pub fn absorb(&mut self, other: IngestReport) {
		self.duplicate_nodes += other.duplicate_nodes;
		self.dangling_edges += other.dangling_edges;
	}
}

/// A payload together with what had to be dropped to build it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ingested {
	/// The cleaned graph.
	pub payload: GraphPayload,
	/// What was dropped on the way.
	pub report: IngestReport,
}

impl GraphPayload {
	/// Ingests a wire graph. Backend stats are ignored in favour of the
	/// recomputed ones.
	pub fn ingest(raw: RawGraph) -> Ingested {
		Self::from_parts(raw.nodes, raw.edges)
	}

	/// Keeps the first node of every id, drops edges with a missing
	/// endpoint, and recomputes stats.
	pub fn from_parts(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Ingested {
		let mut report = IngestReport::default();

		let mut seen = HashSet::with_capacity(nodes.len());
		let nodes: Vec<GraphNode> = nodes
			.into_iter()
			.filter(|node| {
				let fresh = seen.insert(node.id.clone());
				if !fresh {
					report.duplicate_nodes += 1;
				}
				fresh
			})
			.collect();

		let edges: Vec<GraphEdge> = edges
			.into_iter()
			.filter(|edge| {
				let intact = seen.contains(&edge.source) && seen.contains(&edge.target);
				if !intact {
					report.dangling_edges += 1;
				}
				intact
			})
			.collect();

		if report.duplicate_nodes > 0 {
			warn!("dropped {} duplicate node id(s)", report.duplicate_nodes);
		}
		if report.dangling_edges > 0 {
			warn!(
				"dropped {} edge(s) referencing unknown nodes",
				report.dangling_edges
			);
		}

		let stats = GraphStats::from_graph(&nodes, &edges);
		Ingested {
			payload: GraphPayload {
				nodes,
				edges,
				stats,
			},
			report,
		}
	}
}
