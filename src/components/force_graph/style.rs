use crate::model::{NodeKind, Severity};

/// Outline drawn for a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeShape {
	#[default]
	Circle,
	Square,
	Diamond,
	Triangle,
	Hexagon,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeStyle {
	pub color: &'static str,
	pub shape: NodeShape,
	pub radius: f64,
}

pub const BACKGROUND: &str = "#1a1a2e";
pub const EDGE_RGB: &str = "100, 180, 255";
pub const SELECTION: &str = "#ffd166";

pub fn severity_color(severity: Severity) -> &'static str {
	match severity {
		Severity::Critical => "#d62728",
		Severity::High => "#ff7f0e",
		Severity::Medium => "#e6c229",
		Severity::Low => "#2ca02c",
		Severity::Info => "#17becf",
		Severity::Unknown => "#9e9e9e",
	}
}

/// Style of a node. Total over every kind and severity, including nodes
/// the backend sent without one.
pub fn node_style(kind: NodeKind, severity: Option<Severity>) -> NodeStyle {
	match kind {
		NodeKind::Repository => NodeStyle {
			color: "#9467bd",
			shape: NodeShape::Hexagon,
			radius: 9.0,
		},
		NodeKind::File => NodeStyle {
			color: "#1f77b4",
			shape: NodeShape::Square,
			radius: 5.0,
		},
		NodeKind::Vulnerability => {
			let severity = severity.unwrap_or(Severity::Unknown);
			NodeStyle {
				color: severity_color(severity),
				shape: NodeShape::Triangle,
				// worse findings draw larger
				radius: 8.0 - f64::from(severity.rank()) * 0.6,
			}
		}
		NodeKind::Dependency => NodeStyle {
			color: "#8c564b",
			shape: NodeShape::Diamond,
			radius: 5.0,
		},
		NodeKind::Analysis => NodeStyle {
			color: "#e377c2",
			shape: NodeShape::Circle,
			radius: 6.0,
		},
		NodeKind::Other => NodeStyle {
			color: "#7f7f7f",
			shape: NodeShape::Circle,
			radius: 4.0,
		},
	}
}

/// One legend row.
#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
	pub label: &'static str,
	pub style: NodeStyle,
}

/// Node kinds followed by vulnerability severities.
pub fn legend() -> Vec<LegendEntry> {
	let kinds = NodeKind::ALL
		.into_iter()
		.filter(|kind| *kind != NodeKind::Vulnerability)
		.map(|kind| LegendEntry {
			label: kind.label(),
			style: node_style(kind, None),
		});
	let severities = Severity::ALL.into_iter().map(|severity| LegendEntry {
		label: severity.as_str(),
		style: node_style(NodeKind::Vulnerability, Some(severity)),
	});
	kinds.chain(severities).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_every_kind_and_severity_has_a_style() {
		let severities = Severity::ALL.into_iter().map(Some).chain([None]);
		for severity in severities {
			for kind in NodeKind::ALL {
				let style = node_style(kind, severity);
				assert!(style.radius > 0.0, "{kind:?} {severity:?}");
				assert!(style.color.starts_with('#'));
			}
		}
	}

	#[test]
	fn test_critical_draws_larger_than_low() {
		let critical = node_style(NodeKind::Vulnerability, Some(Severity::Critical));
		let low = node_style(NodeKind::Vulnerability, Some(Severity::Low));
		assert!(critical.radius > low.radius);
		assert_ne!(critical.color, low.color);
		assert_eq!(
			node_style(NodeKind::Vulnerability, None),
			node_style(NodeKind::Vulnerability, Some(Severity::Unknown))
		);
	}

	#[test]
	fn test_legend_lists_kinds_then_severities() {
		let legend = legend();
		assert_eq!(legend.len(), NodeKind::ALL.len() - 1 + Severity::ALL.len());
		assert_eq!(legend[0].label, "Repository");
		assert_eq!(legend.last().map(|e| e.label), Some("unknown"));
	}
}
