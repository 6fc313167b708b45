use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::sync::Arc;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};

use super::style::{NodeStyle, node_style};
use crate::model::{GraphPayload, NodeSelection};

pub const HIT_RADIUS: f64 = 12.0;
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;
pub const ZOOM_STEP: f64 = 1.2;
const FIT_PADDING: f64 = 40.0;

#[derive(Clone, Debug, Default)]
pub struct NodeInfo {
	pub id: String,
	pub label: String,
	pub style: NodeStyle,
}

/// Screen position of graph point `p` is `p * k + (x, y)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self { x: 0.0, y: 0.0, k: 1.0 }
	}
}

impl ViewTransform {
	/// Scales by `factor` keeping the screen point `(sx, sy)` fixed.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64) {
		let k = (self.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
		let ratio = k / self.k;
		self.x = sx - (sx - self.x) * ratio;
		self.y = sy - (sy - self.y) * ratio;
		self.k = k;
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		((sx - self.x) / self.k, (sy - self.y) / self.k)
	}

	#[cfg(test)]
	pub fn graph_to_screen(&self, gx: f64, gy: f64) -> (f64, f64) {
		(gx * self.k + self.x, gy * self.k + self.y)
	}
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub node_idx: Option<DefaultNodeIdx>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f32,
	pub node_start_y: f32,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub moved: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<DefaultNodeIdx>,
	pub neighbors: HashSet<DefaultNodeIdx>,
	pub highlight_t: f64,
	pub prev_node: Option<DefaultNodeIdx>,
	pub prev_neighbors: HashSet<DefaultNodeIdx>,
	delay_t: f64,
}

pub struct ForceGraphState {
	pub graph: ForceGraph<NodeInfo, ()>,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub hover: HoverState,
	pub selected: Option<DefaultNodeIdx>,
	pub width: f64,
	pub height: f64,
	pub animation_running: bool,
	pub flow_time: f64,
	payload: Arc<GraphPayload>,
	edges: Vec<(DefaultNodeIdx, DefaultNodeIdx)>,
	index: HashMap<String, DefaultNodeIdx>,
}

fn simulation() -> ForceGraph<NodeInfo, ()> {
	ForceGraph::new(SimulationParameters {
		force_charge: 150.0,
		force_spring: 0.05,
		force_max: 100.0,
		node_speed: 3000.0,
		damping_factor: 0.9,
	})
}

impl ForceGraphState {
	/// Lays the payload out on a circle around the origin, centred in the
	/// viewport.
	pub fn new(payload: Arc<GraphPayload>, width: f64, height: f64) -> Self {
		let mut state = Self {
			graph: simulation(),
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			selected: None,
			width,
			height,
			animation_running: true,
			flow_time: 0.0,
			payload: Arc::new(GraphPayload::default()),
			edges: Vec::new(),
			index: HashMap::new(),
		};
		state.load(payload, &HashMap::new());
		state
	}

	/// Swaps in a new snapshot. Nodes that survive keep their position and
	/// the selection; the view transform is left alone.
	pub fn replace(&mut self, payload: Arc<GraphPayload>) {
		let mut positions = HashMap::new();
		self.graph.visit_nodes(|node| {
			positions.insert(node.data.user_data.id.clone(), (node.x(), node.y()));
		});
		let selected = self.selected_id();

		self.graph = simulation();
		self.edges.clear();
		self.index.clear();
		self.hover = HoverState::default();
		self.drag = DragState::default();
		self.load(payload, &positions);
		self.selected = selected.and_then(|id| self.index.get(&id).copied());
		self.animation_running = true;
	}

	fn load(&mut self, payload: Arc<GraphPayload>, positions: &HashMap<String, (f32, f32)>) {
		let count = payload.nodes.len().max(1) as f64;
		let ring = 100.0_f64.max(count.sqrt() * 20.0);

		for (i, node) in payload.nodes.iter().enumerate() {
			let angle = (i as f64) * 2.0 * PI / count;
			let (x, y) = positions
				.get(&node.id)
				.copied()
				.unwrap_or(((ring * angle.cos()) as f32, (ring * angle.sin()) as f32));
			let idx = self.graph.add_node(NodeData {
				x,
				y,
				mass: 10.0,
				is_anchor: false,
				user_data: NodeInfo {
					id: node.id.clone(),
					label: node.label.clone(),
					style: node_style(node.kind, node.severity),
				},
			});
			self.index.insert(node.id.clone(), idx);
		}

		for edge in &payload.edges {
			if let (Some(&src), Some(&tgt)) = (self.index.get(&edge.source), self.index.get(&edge.target)) {
				self.graph.add_edge(src, tgt, EdgeData::default());
				self.edges.push((src, tgt));
			}
		}
		self.payload = payload;
	}

	pub fn is_empty(&self) -> bool {
		self.index.is_empty()
	}

	pub fn payload(&self) -> &Arc<GraphPayload> {
		&self.payload
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		self.transform.screen_to_graph(sx, sy)
	}

	/// Closest node whose hit area contains the screen point.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<DefaultNodeIdx> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let mut found: Option<(f64, DefaultNodeIdx)> = None;
		self.graph.visit_nodes(|node| {
			let (dx, dy) = (node.x() as f64 - gx, node.y() as f64 - gy);
			let dist = (dx * dx + dy * dy).sqrt();
			// world-space, scales with zoom like nodes
			let hit = HIT_RADIUS.max(node.data.user_data.style.radius);
			if dist < hit && found.is_none_or(|(best, _)| dist < best) {
				found = Some((dist, node.index()));
			}
		});
		found.map(|(_, idx)| idx)
	}

	pub fn position(&self, idx: DefaultNodeIdx) -> Option<(f32, f32)> {
		let mut found = None;
		self.graph.visit_nodes(|node| {
			if node.index() == idx {
				found = Some((node.x(), node.y()));
			}
		});
		found
	}

	fn id_of(&self, idx: DefaultNodeIdx) -> Option<String> {
		self.index
			.iter()
			.find(|(_, i)| **i == idx)
			.map(|(id, _)| id.clone())
	}

	pub fn selected_id(&self) -> Option<String> {
		self.selected.and_then(|idx| self.id_of(idx))
	}

	/// Selects the node under the screen point, or clears the selection.
	pub fn select_at(&mut self, sx: f64, sy: f64) -> Option<NodeSelection> {
		self.selected = self.node_at_position(sx, sy);
		self.selection()
	}

	pub fn clear_selection(&mut self) {
		self.selected = None;
	}

	/// Attributes and adjacent edges of the selected node.
	pub fn selection(&self) -> Option<NodeSelection> {
		let id = self.selected_id()?;
		self.payload.selection(&id)
	}

	pub fn zoom_in(&mut self) {
		self.transform.zoom_at(self.width / 2.0, self.height / 2.0, ZOOM_STEP);
	}

	pub fn zoom_out(&mut self) {
		self.transform.zoom_at(self.width / 2.0, self.height / 2.0, 1.0 / ZOOM_STEP);
	}

	/// Centres all nodes in the viewport with some padding.
	pub fn fit_to_view(&mut self) {
		let mut bounds: Option<(f64, f64, f64, f64)> = None;
		self.graph.visit_nodes(|node| {
			let (x, y) = (node.x() as f64, node.y() as f64);
			bounds = Some(match bounds {
				None => (x, y, x, y),
				Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
			});
		});
		let Some((x0, y0, x1, y1)) = bounds else {
			self.transform = ViewTransform {
				x: self.width / 2.0,
				y: self.height / 2.0,
				k: 1.0,
			};
			return;
		};

		let (span_x, span_y) = ((x1 - x0).max(1.0), (y1 - y0).max(1.0));
		let avail_x = (self.width - 2.0 * FIT_PADDING).max(1.0);
		let avail_y = (self.height - 2.0 * FIT_PADDING).max(1.0);
		let k = (avail_x / span_x).min(avail_y / span_y).clamp(MIN_ZOOM, MAX_ZOOM);
		let (cx, cy) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
		self.transform = ViewTransform {
			x: self.width / 2.0 - cx * k,
			y: self.height / 2.0 - cy * k,
			k,
		};
	}

	pub fn set_hover(&mut self, node: Option<DefaultNodeIdx>) {
		if self.hover.node == node {
			return;
		}
		let was_hovering = self.hover.node.is_some();

		// keep the previous highlight around for the fade-out
		if was_hovering && node.is_none() {
			self.hover.prev_node = self.hover.node.take();
			self.hover.prev_neighbors = std::mem::take(&mut self.hover.neighbors);
		} else {
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}

		self.hover.node = node;
		self.hover.neighbors.clear();

		if let Some(idx) = node {
			if !was_hovering {
				self.hover.delay_t = 0.0;
			}
			for &(src, tgt) in &self.edges {
				if src == idx {
					self.hover.neighbors.insert(tgt);
				} else if tgt == idx {
					self.hover.neighbors.insert(src);
				}
			}
		}
	}

	pub fn is_highlighted(&self, idx: DefaultNodeIdx) -> bool {
		self.hover.node == Some(idx)
			|| self.hover.neighbors.contains(&idx)
			|| self.hover.prev_node == Some(idx)
			|| self.hover.prev_neighbors.contains(&idx)
	}

	pub fn is_hovered(&self, idx: DefaultNodeIdx) -> bool {
		self.hover.node == Some(idx) || self.hover.prev_node == Some(idx)
	}

	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some() || self.hover.prev_node.is_some()
	}

	pub fn tick(&mut self, dt: f32) {
		self.graph.update(dt);
		self.flow_time += dt as f64;

		let (target, delay, speed) = if self.hover.node.is_some() {
			(1.0, 0.08, 1.8)
		} else {
			(0.0, 0.0, 1.26)
		};

		if self.hover.node.is_some() {
			self.hover.delay_t = (self.hover.delay_t + dt as f64).min(delay);
			if self.hover.delay_t >= delay {
				self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt as f64;
			}
		} else {
			self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt as f64;
			if self.hover.highlight_t < 0.01 {
				self.hover.highlight_t = 0.0;
				self.hover.prev_node = None;
				self.hover.prev_neighbors.clear();
			}
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}
