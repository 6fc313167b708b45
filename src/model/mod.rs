//! Graph payload model: typed nodes, edges and stats, plus the pure
//! transformations applied to them before they reach the renderer.

mod ingest;
mod insights;
mod merge;
mod repository;
mod types;

pub use ingest::{IngestReport, Ingested};
pub use insights::{HighRiskFile, filter_min_severity, high_risk_files};
pub use merge::{
	MergedGraph, NAMESPACE_SEPARATOR, RepoBreakdown, merge_payloads, namespace_id,
	truncate_by_priority,
};
pub use repository::{RepositoryIndexStatus, RepositoryListing, split_full_name};
pub use types::{
	GraphEdge, GraphNode, GraphPayload, GraphStats, NodeKind, NodeSelection, RawGraph, Severity,
};
