use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::state::ForceGraphState;
use super::style::{BACKGROUND, EDGE_RGB, NodeShape, SELECTION};

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

pub fn render(state: &ForceGraphState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	if state.is_empty() {
		draw_placeholder(state, ctx);
		return;
	}
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_edges(state, ctx);
	draw_nodes(state, ctx);
	draw_selection(state, ctx);
	ctx.restore();
}

fn draw_placeholder(state: &ForceGraphState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str("rgba(255, 255, 255, 0.5)");
	ctx.set_font("16px sans-serif");
	ctx.set_text_align("center");
	let _ = ctx.fill_text("No graph data", state.width / 2.0, state.height / 2.0);
	ctx.set_text_align("start");
}

/// Traces the outline of `shape` centred on `(x, y)`; the caller fills or
/// strokes it.
fn trace_shape(ctx: &CanvasRenderingContext2d, shape: NodeShape, x: f64, y: f64, r: f64) {
	ctx.begin_path();
	match shape {
		NodeShape::Circle => {
			let _ = ctx.arc(x, y, r, 0.0, 2.0 * PI);
		}
		NodeShape::Square => {
			let s = r * 0.9;
			ctx.rect(x - s, y - s, 2.0 * s, 2.0 * s);
		}
		NodeShape::Diamond => {
			ctx.move_to(x, y - r * 1.2);
			ctx.line_to(x + r, y);
			ctx.line_to(x, y + r * 1.2);
			ctx.line_to(x - r, y);
			ctx.close_path();
		}
		NodeShape::Triangle => {
			let h = r * 1.2;
			ctx.move_to(x, y - h);
			ctx.line_to(x + h * 0.866, y + h * 0.5);
			ctx.line_to(x - h * 0.866, y + h * 0.5);
			ctx.close_path();
		}
		NodeShape::Hexagon => {
			for i in 0..6 {
				let a = PI / 3.0 * i as f64;
				let (px, py) = (x + r * a.cos(), y + r * a.sin());
				if i == 0 {
					ctx.move_to(px, py);
				} else {
					ctx.line_to(px, py);
				}
			}
			ctx.close_path();
		}
	}
}

fn draw_edges(state: &ForceGraphState, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	let (line_width, dash, gap, arrow_size) = (1.5 / k, 8.0 / k, 4.0 / k, 8.0 / k);
	let dash_offset = -(state.flow_time * 30.0) % (dash + gap);
	let t = ease_out_cubic(state.hover.highlight_t);

	state.graph.visit_edges(|n1, n2, _| {
		let (x1, y1, x2, y2) = (n1.x() as f64, n1.y() as f64, n2.x() as f64, n2.y() as f64);
		let (dx, dy) = (x2 - x1, y2 - y1);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			return;
		}
		let (r1, r2) = (
			n1.data.user_data.style.radius,
			n2.data.user_data.style.radius,
		);

		let is_highlighted = state.is_highlighted(n1.index()) && state.is_highlighted(n2.index());

		// t=0: all edges at base, t=1: highlighted edges brighten and the rest dim
		let (edge_alpha, arrow_alpha, width) = if is_highlighted {
			(0.6 + 0.3 * t, 0.8 + 0.1 * t, line_width * (1.0 + 0.3 * t))
		} else {
			(0.6 - 0.45 * t, 0.8 - 0.45 * t, line_width * (1.0 - 0.3 * t))
		};

		ctx.set_stroke_style_str(&format!("rgba({EDGE_RGB}, {edge_alpha})"));
		ctx.set_line_width(width);
		let _ = ctx.set_line_dash(&js_sys::Array::of2(
			&JsValue::from_f64(dash),
			&JsValue::from_f64(gap),
		));
		ctx.set_line_dash_offset(dash_offset);

		let (ux, uy) = (dx / dist, dy / dist);
		ctx.begin_path();
		ctx.move_to(x1 + ux * r1, y1 + uy * r1);
		ctx.line_to(x2 - ux * (r2 + arrow_size), y2 - uy * (r2 + arrow_size));
		ctx.stroke();

		let _ = ctx.set_line_dash(&js_sys::Array::new());
		ctx.set_fill_style_str(&format!("rgba({EDGE_RGB}, {arrow_alpha})"));
		let (tip_x, tip_y) = (x2 - ux * r2, y2 - uy * r2);
		let (back_x, back_y) = (tip_x - ux * arrow_size, tip_y - uy * arrow_size);
		let (px, py) = (-uy * arrow_size * 0.5, ux * arrow_size * 0.5);
		ctx.begin_path();
		ctx.move_to(tip_x, tip_y);
		ctx.line_to(back_x + px, back_y + py);
		ctx.line_to(back_x - px, back_y - py);
		ctx.close_path();
		ctx.fill();
	});
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

fn draw_label(ctx: &CanvasRenderingContext2d, label: &str, x: f64, y: f64, k: f64, color: &str) {
	if label.is_empty() {
		return;
	}
	ctx.set_fill_style_str(color);
	ctx.set_font(&format!("{}px sans-serif", 10.0 / k.max(0.5)));
	let _ = ctx.fill_text(label, x, y);
}

fn draw_nodes(state: &ForceGraphState, ctx: &CanvasRenderingContext2d) {
	let (has_highlight, t, k) = (
		state.has_active_highlight(),
		ease_out_cubic(state.hover.highlight_t),
		state.transform.k,
	);
	// labels only once zoomed in far enough to read them
	let show_labels = k >= 0.8;

	state.graph.visit_nodes(|node| {
		let idx = node.index();
		if has_highlight && state.is_highlighted(idx) {
			return;
		}
		let info = &node.data.user_data;
		let (x, y) = (node.x() as f64, node.y() as f64);
		let (alpha, radius) = (1.0 - 0.7 * t, info.style.radius * (1.0 - 0.15 * t));

		ctx.set_global_alpha(alpha);
		trace_shape(ctx, info.style.shape, x, y, radius);
		ctx.set_fill_style_str(info.style.color);
		ctx.fill();
		ctx.set_global_alpha(1.0);

		if show_labels {
			let color = format!("rgba(255, 255, 255, {})", alpha * 0.8);
			draw_label(ctx, &info.label, x + radius + 3.0, y + 3.0, k, &color);
		}
	});

	if !has_highlight {
		return;
	}

	state.graph.visit_nodes(|node| {
		let idx = node.index();
		if !state.is_highlighted(idx) {
			return;
		}
		let info = &node.data.user_data;
		let base = info.style.radius;
		let (x, y) = (node.x() as f64, node.y() as f64);
		let is_hovered = state.is_hovered(idx);
		let is_neighbor =
			state.hover.neighbors.contains(&idx) || state.hover.prev_neighbors.contains(&idx);

		let (radius, glow_radius) = if is_hovered {
			(base * (1.0 + 0.35 * t), base * (1.8 + 1.2 * t))
		} else if is_neighbor {
			(base * (1.0 + 0.2 * t), base * (1.4 + 0.6 * t))
		} else {
			(base, 0.0)
		};

		if glow_radius > 0.0 && t > 0.01 {
			if let Ok(gradient) = ctx.create_radial_gradient(x, y, radius * 0.3, x, y, glow_radius) {
				let alpha = if is_hovered { 0.35 * t } else { 0.2 * t };
				let _ = gradient.add_color_stop(0.0, &format!("rgba(255, 255, 255, {alpha})"));
				let _ = gradient.add_color_stop(0.6, &format!("rgba(200, 220, 255, {})", alpha * 0.3));
				let _ = gradient.add_color_stop(1.0, "rgba(255, 255, 255, 0)");
				ctx.begin_path();
				let _ = ctx.arc(x, y, glow_radius, 0.0, 2.0 * PI);
				#[allow(deprecated)]
				ctx.set_fill_style(&gradient);
				ctx.fill();
			}
		}

		trace_shape(ctx, info.style.shape, x, y, radius);
		ctx.set_fill_style_str(info.style.color);
		ctx.fill();

		if is_hovered && t > 0.01 {
			trace_shape(ctx, info.style.shape, x, y, radius + 2.0 / k);
			ctx.set_stroke_style_str(&format!("rgba(255, 255, 255, {})", 0.7 * t));
			ctx.set_line_width(1.5 / k);
			ctx.stroke();
		}

		draw_label(ctx, &info.label, x + radius + 3.0, y + 3.0, k, "white");
	});
}

fn draw_selection(state: &ForceGraphState, ctx: &CanvasRenderingContext2d) {
	let Some(idx) = state.selected else {
		return;
	};
	let k = state.transform.k;
	state.graph.visit_nodes(|node| {
		if node.index() != idx {
			return;
		}
		let info = &node.data.user_data;
		let (x, y) = (node.x() as f64, node.y() as f64);
		trace_shape(ctx, info.style.shape, x, y, info.style.radius + 4.0 / k);
		ctx.set_stroke_style_str(SELECTION);
		ctx.set_line_width(2.0 / k);
		ctx.stroke();
		draw_label(ctx, &info.label, x + info.style.radius + 3.0, y + 3.0, k, SELECTION);
	});
}
