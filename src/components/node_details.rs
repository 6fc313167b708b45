use leptos::prelude::*;
use serde_json::Value;

use super::force_graph::severity_color;
use crate::model::{GraphStats, NodeSelection, Severity};
use crate::state::ViewModel;

fn render_value(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

fn severity_badge(severity: Severity) -> impl IntoView {
	view! {
		<span class="severity" style=format!("background: {};", severity_color(severity))>
			{severity.as_str()}
		</span>
	}
}

fn stat_entries(stats: &GraphStats) -> [(&'static str, usize); 7] {
	[
		("Nodes", stats.total_nodes),
		("Edges", stats.total_edges),
		("Repositories", stats.repositories),
		("Files", stats.files),
		("Vulnerabilities", stats.vulnerabilities),
		("Dependencies", stats.dependencies),
		("Analyses", stats.analyses),
	]
}

fn stats_rows(stats: &GraphStats) -> impl IntoView + use<> {
	stat_entries(stats)
		.into_iter()
		.map(|(label, count)| view! { <dt>{label}</dt><dd>{count}</dd> })
		.collect_view()
}

#[component]
fn Selected(selection: NodeSelection) -> impl IntoView {
	let NodeSelection { node, edges } = selection;
	let id = node.id.clone();
	let attributes = node
		.data
		.iter()
		.map(|(key, value)| view! { <dt>{key.clone()}</dt><dd>{render_value(value)}</dd> })
		.collect_view();
	let edges = edges
		.into_iter()
		.map(|edge| {
			let (arrow, other) = if edge.source == id {
				("→", edge.target)
			} else {
				("←", edge.source)
			};
			view! { <li>{edge.kind} " " {arrow} " " <code>{other}</code></li> }
		})
		.collect_view();

	view! {
		<section class="node-details">
			<h3>{node.label.clone()}</h3>
			<p class="node-kind">{node.kind.label()} {node.severity.map(severity_badge)}</p>
			<dl>
				<dt>"id"</dt>
				<dd><code>{node.id.clone()}</code></dd>
				{node.risk_level.clone().map(|risk| view! { <dt>"risk"</dt><dd>{risk}</dd> })}
				{attributes}
			</dl>
			<h4>"Edges"</h4>
			<ul class="node-edges">{edges}</ul>
		</section>
	}
}

/// Side panel: selected node, graph stats, per-repository breakdown and
/// high-risk files.
#[component]
pub fn NodeDetails(
	#[prop(into)] selection: Signal<Option<NodeSelection>>,
	#[prop(into)] model: Signal<ViewModel>,
) -> impl IntoView {
	view! {
		<aside class="details-panel">
			{move || {
				selection
					.get()
					.map(|selection| view! { <Selected selection=selection /> })
			}}
			<section class="graph-stats">
				<h3>"Graph"</h3>
				<dl>{move || model.with(|vm| stats_rows(&vm.payload.stats))}</dl>
			</section>
			{move || {
				model
					.with(|vm| {
						(!vm.breakdown.is_empty())
							.then(|| {
								let rows = vm
									.breakdown
									.iter()
									.map(|b| {
										view! {
											<li>
												<code>{b.repository.clone()}</code>
												" "
												{format!("{} nodes", b.stats.total_nodes)}
											</li>
										}
									})
									.collect_view();
								view! {
									<section class="breakdown">
										<h3>"Per repository"</h3>
										<ul>{rows}</ul>
									</section>
								}
							})
					})
			}}
			{move || {
				model
					.with(|vm| {
						(!vm.high_risk_files.is_empty())
							.then(|| {
								let rows = vm
									.high_risk_files
									.iter()
									.map(|file| {
										view! {
											<li>
												{file.label.clone()}
												" "
												{format!("{} findings", file.vulnerabilities)}
												" "
												{severity_badge(file.worst)}
											</li>
										}
									})
									.collect_view();
								view! {
									<section class="high-risk">
										<h3>"High-risk files"</h3>
										<ol>{rows}</ol>
									</section>
								}
							})
					})
			}}
		</aside>
	}
}
