use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node kind as sent by the backend in the `type` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
	/// The repository root.
	Repository,
	/// A source file.
	File,
	/// A finding attached to a file.
	Vulnerability,
	/// A third-party package.
	Dependency,
	/// An analysis run summary.
	Analysis,
	/// Anything the backend adds later.
	#[default]
	#[serde(other)]
	Other,
}

impl NodeKind {
	/// Every kind, in legend order.
	pub const ALL: [NodeKind; 6] = [
		NodeKind::Repository,
		NodeKind::File,
		NodeKind::Vulnerability,
		NodeKind::Dependency,
		NodeKind::Analysis,
		NodeKind::Other,
	];

	/// Human readable name.
	pub fn label(self) -> &'static str {
		match self {
			NodeKind::Repository => "Repository",
			NodeKind::File => "File",
			NodeKind::Vulnerability => "Vulnerability",
			NodeKind::Dependency => "Dependency",
			NodeKind::Analysis => "Analysis",
			NodeKind::Other => "Other",
		}
	}
}

/// Vulnerability severity. Parsed case-insensitively; unrecognised values
/// become [`Severity::Unknown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
	/// Exploitable, fix now.
	Critical,
	/// Serious.
	High,
	/// Moderate.
	Medium,
	/// Minor.
	Low,
	/// Informational only.
	Info,
	/// Missing or unrecognised severity.
	Unknown,
}

impl Severity {
	/// Most severe first.
	pub const ALL: [Severity; 6] = [
		Severity::Critical,
		Severity::High,
		Severity::Medium,
		Severity::Low,
		Severity::Info,
		Severity::Unknown,
	];

	/// 0 is the most severe.
	pub fn rank(self) -> u8 {
		match self {
			Severity::Critical => 0,
			Severity::High => 1,
			Severity::Medium => 2,
			Severity::Low => 3,
			Severity::Info => 4,
			Severity::Unknown => 5,
		}
	}

	/// Lowercase wire name.
	pub fn as_str(self) -> &'static str {
		match self {
			Severity::Critical => "critical",
			Severity::High => "high",
			Severity::Medium => "medium",
			Severity::Low => "low",
			Severity::Info => "info",
			Severity::Unknown => "unknown",
		}
	}

	/// Inverse of [`Severity::as_str`], case-insensitive.
	pub fn parse(value: &str) -> Self {
		match value.trim().to_ascii_lowercase().as_str() {
			"critical" => Severity::Critical,
			"high" => Severity::High,
			"medium" | "moderate" => Severity::Medium,
			"low" => Severity::Low,
			"info" | "informational" => Severity::Info,
			_ => Severity::Unknown,
		}
	}
}

impl From<String> for Severity {
	fn from(value: String) -> Self {
		Severity::parse(&value)
	}
}

impl From<Severity> for String {
	fn from(value: Severity) -> Self {
		value.as_str().to_owned()
	}
}

/// A node of the knowledge graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
	/// Unique within one payload; namespaced per repository when merged.
	pub id: String,
	/// Node kind.
	#[serde(rename = "type", default)]
	pub kind: NodeKind,
	/// Display string.
	#[serde(default)]
	pub label: String,
	/// Only meaningful for vulnerabilities.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub severity: Option<Severity>,
	/// Dependency risk as reported by the analysis pipeline.
	#[serde(default, alias = "riskLevel", skip_serializing_if = "Option::is_none")]
	pub risk_level: Option<String>,
	/// Type specific metadata, shown as plain key/value pairs.
	#[serde(default)]
	pub data: Map<String, Value>,
}

impl GraphNode {
	/// A node with no attributes.
	pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			kind,
			label: label.into(),
			severity: None,
			risk_level: None,
			data: Map::new(),
		}
	}

	/// Builder for vulnerability nodes.
	pub fn with_severity(mut self, severity: Severity) -> Self {
		self.severity = Some(severity);
		self
	}

	/// Severity, treating an absent value as unknown.
	pub fn severity_or_unknown(&self) -> Severity {
		self.severity.unwrap_or(Severity::Unknown)
	}
}

/// A directed relation between two nodes of the same payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
	/// Id of the origin node.
	pub source: String,
	/// Id of the destination node.
	pub target: String,
	/// Relation label, e.g. `CONTAINS` or `HAS_VULNERABILITY`.
	#[serde(rename = "type", default)]
	pub kind: String,
}

impl GraphEdge {
	/// Edge of type `kind` from `source` to `target`.
	pub fn new(source: impl Into<String>, target: impl Into<String>, kind: impl Into<String>) -> Self {
		Self {
			source: source.into(),
			target: target.into(),
			kind: kind.into(),
		}
	}

	/// Whether `id` is one of the endpoints.
	pub fn touches(&self, id: &str) -> bool {
		self.source == id || self.target == id
	}
}

/// Aggregate counters. Derived data: always recomputable from the nodes
/// and edges, and missing fields default to zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphStats {
	/// Nodes in the graph.
	pub total_nodes: usize,
	/// Edges in the graph.
	pub total_edges: usize,
	/// Repository nodes.
	pub repositories: usize,
	/// File nodes.
	pub files: usize,
	/// Vulnerability nodes.
	pub vulnerabilities: usize,
	/// Dependency nodes.
	pub dependencies: usize,
	/// Analysis nodes.
	pub analyses: usize,
}

impl GraphStats {
	/// Counts the given node and edge sets.
	pub fn from_graph(nodes: &[GraphNode], edges: &[GraphEdge]) -> Self {
		let count = |kind: NodeKind| nodes.iter().filter(|n| n.kind == kind).count();
		Self {
			total_nodes: nodes.len(),
			total_edges: edges.len(),
			repositories: count(NodeKind::Repository),
			files: count(NodeKind::File),
			vulnerabilities: count(NodeKind::Vulnerability),
			dependencies: count(NodeKind::Dependency),
			analyses: count(NodeKind::Analysis),
		}
	}
}

/// Graph response body as it comes off the wire, before ingestion.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RawGraph {
	/// Echo of the requested repository, when the backend sends it.
	#[serde(default)]
	pub repository: Option<String>,
	/// Nodes as sent; ids may repeat.
	#[serde(default)]
	pub nodes: Vec<GraphNode>,
	/// Edges as sent; endpoints may be missing.
	#[serde(default)]
	pub edges: Vec<GraphEdge>,
	/// Backend supplied stats; informational only.
	#[serde(default)]
	pub stats: Option<GraphStats>,
}

/// An ingested graph: unique node ids, no dangling edges, recomputed stats.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphPayload {
	/// Nodes with unique ids.
	pub nodes: Vec<GraphNode>,
	/// Edges whose endpoints all exist.
	pub edges: Vec<GraphEdge>,
	/// Counts derived from `nodes` and `edges`.
	pub stats: GraphStats,
}

impl GraphPayload {
	/// True when there is nothing to draw.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Looks a node up by id.
	pub fn node(&self, id: &str) -> Option<&GraphNode> {
		self.nodes.iter().find(|n| n.id == id)
	}

	/// Edges with `id` as either endpoint.
	pub fn adjacent_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
		self.edges.iter().filter(move |e| e.touches(id))
	}

	/// The selected node with its attributes and adjacent edges.
	pub fn selection(&self, id: &str) -> Option<NodeSelection> {
		let node = self.node(id)?.clone();
		let edges = self.adjacent_edges(id).cloned().collect();
		Some(NodeSelection { node, edges })
	}
}

/// What the detail panel shows for a selected node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSelection {
	/// The selected node.
	pub node: GraphNode,
	/// Every edge touching the node.
	pub edges: Vec<GraphEdge>,
}
