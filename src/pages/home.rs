use std::sync::Arc;

use futures::StreamExt;
use futures::channel::mpsc;
use leptos::ev::MouseEvent;
use leptos::prelude::*;
use leptos_router::hooks::use_query_map;
use log::{error, info};
use wasm_bindgen_futures::spawn_local;

use crate::api::HttpGraphApi;
use crate::components::force_graph::ForceGraphCanvas;
use crate::components::node_details::NodeDetails;
use crate::components::repo_list::RepoList;
use crate::components::{Commands, ErrorBanner, dispatch};
use crate::config::AppConfig;
use crate::model::{GraphPayload, NodeSelection, Severity, filter_min_severity};
use crate::state::{
	ConnectionState, EventSourceTransport, LiveChannel, ReconnectPolicy, Scope, UiCommand,
	ViewController, ViewModel,
};

/// Wires the controller, the command outbox and the live channel to the
/// view. Everything here is torn down with the page.
fn start(config: AppConfig, model: RwSignal<ViewModel>) -> Commands {
	let controller = ViewController::new(HttpGraphApi::new(config.clone()), config.clone());
	controller.on_change(move |vm| model.set(vm));

	let (commands, mut inbox) = mpsc::unbounded::<UiCommand>();
	{
		let controller = controller.clone();
		spawn_local(async move { controller.initialize().await });
	}
	{
		let controller = controller.clone();
		spawn_local(async move {
			while let Some(command) = inbox.next().await {
				let controller = controller.clone();
				spawn_local(async move { controller.handle(command).await });
			}
		});
	}

	let channel = LiveChannel::new(
		EventSourceTransport::new(&config),
		controller,
		config.user_id.clone(),
		ReconnectPolicy::from(&config),
	)
	.spawn();
	let outbox = commands.clone();
	on_cleanup(move || {
		channel.close();
		outbox.close_channel();
	});
	info!("explorer started for user {}", config.user_id);
	commands
}

fn severity_from_select(value: &str) -> Option<Severity> {
	(!value.is_empty()).then(|| Severity::parse(value))
}

#[component]
fn Toolbar(model: RwSignal<ViewModel>, commands: Commands, min_severity: RwSignal<Option<Severity>>) -> impl IntoView {
	let refresh = move |_: MouseEvent| dispatch(&commands, UiCommand::Refresh);
	let scope_label = move || {
		model.with(|vm| match &vm.scope {
			Some(Scope::All) => "All repositories".to_owned(),
			Some(scope) => scope.to_string(),
			None => "Nothing selected".to_owned(),
		})
	};
	let live_class = move || match model.with(|vm| vm.connection) {
		ConnectionState::Connected => "live-indicator live",
		ConnectionState::Connecting => "live-indicator connecting",
		ConnectionState::Disconnected => "live-indicator offline",
	};

	view! {
		<header class="toolbar">
			<h1>"Knowledge Graph"</h1>
			<span class="scope">{scope_label}</span>
			{move || model.with(|vm| vm.loading).then(|| view! { <span class="loading">"Loading…"</span> })}
			<label class="severity-filter">
				"Minimum severity "
				<select on:change=move |ev| min_severity.set(severity_from_select(&event_target_value(&ev)))>
					<option value="">"All"</option>
					{[Severity::Critical, Severity::High, Severity::Medium, Severity::Low, Severity::Info]
						.into_iter()
						.map(|s| view! { <option value=s.as_str()>{s.as_str()}</option> })
						.collect_view()}
				</select>
			</label>
			<span class=live_class>{move || model.with(|vm| vm.connection.to_string())}</span>
			<button on:click=refresh>"Refresh"</button>
		</header>
	}
}

/// Explorer page: repository list, graph canvas and details panel.
#[component]
pub fn Home() -> impl IntoView {
	let query = use_query_map();
	let user = query.with_untracked(|q| q.get("user_id")).unwrap_or_default();
	let config = AppConfig::default().with_user(user);
	if let Err(err) = config.validate() {
		error!("cannot start explorer: {err}");
		return view! {
			<div class="banner banner-invalid" role="alert">
				{format!("Cannot load graphs: {err}. Open this page with a user_id.")}
			</div>
		}
		.into_any();
	}

	let model = RwSignal::new(ViewModel::default());
	let min_severity = RwSignal::new(None::<Severity>);
	let (selection, set_selection) = signal(None::<NodeSelection>);
	let commands = start(config, model);

	let payload = Memo::new(move |_| model.with(|vm| vm.payload.clone()));
	// the filter only shapes what is drawn; the store keeps the full payload
	let visible = Memo::new(move |_| -> Arc<GraphPayload> {
		let payload = payload.get();
		match min_severity.get() {
			None => payload,
			Some(min) => Arc::new(filter_min_severity(&payload, Some(min))),
		}
	});

	view! {
		<div class="explorer">
			<Toolbar model=model commands=commands.clone() min_severity=min_severity />
			{move || model.with(|vm| vm.list_error.clone()).map(|error| view! { <ErrorBanner error=error context="Repositories:" /> })}
			{move || model.with(|vm| vm.graph_error.clone()).map(|error| view! { <ErrorBanner error=error context="Graph:" /> })}
			{move || {
				model
					.with(|vm| {
						(!vm.integrity_warnings.is_clean())
							.then(|| {
								let report = vm.integrity_warnings;
								view! {
									<div class="banner banner-warning">
										{format!(
											"Some graph data was inconsistent: dropped {} duplicate nodes and {} dangling edges.",
											report.duplicate_nodes,
											report.dangling_edges,
										)}
									</div>
								}
							})
					})
			}}
			{move || {
				model
					.with(|vm| {
						(!vm.skipped_repositories.is_empty())
							.then(|| {
								view! {
									<div class="banner banner-warning">
										{format!("Not shown: {}", vm.skipped_repositories.join(", "))}
									</div>
								}
							})
					})
			}}
			<main class="explorer-body">
				<RepoList model=model commands=commands />
				<div class="graph-area">
					<ForceGraphCanvas data=visible on_select=set_selection />
				</div>
				<NodeDetails selection=selection model=model />
			</main>
		</div>
	}
	.into_any()
}
