use leptos::ev::MouseEvent;
use leptos::prelude::*;

use super::{Commands, dispatch};
use crate::state::{IndexState, RepositoryRow, Scope, UiCommand, ViewModel};

fn badge(row: &RepositoryRow) -> (&'static str, String) {
	match row.state {
		IndexState::Indexed => (
			"badge badge-indexed",
			format!("Indexed · {} nodes", row.status.node_count),
		),
		IndexState::IndexRequested => ("badge badge-pending", "Indexing…".to_owned()),
		IndexState::NotIndexed => ("badge badge-missing", "Not indexed".to_owned()),
	}
}

#[component]
fn RepoRow(row: RepositoryRow, selected: bool, commands: Commands) -> impl IntoView {
	let (badge_class, badge_text) = badge(&row);
	let name = row.status.full_name.clone();
	let indexed = row.state == IndexState::Indexed;
	let class = if selected { "repo-row selected" } else { "repo-row" };

	let select = {
		let (commands, name) = (commands.clone(), name.clone());
		move |_: MouseEvent| {
			if indexed {
				dispatch(&commands, UiCommand::Select(Scope::Repository(name.clone())));
			}
		}
	};
	let index_now = {
		let name = name.clone();
		move |_: MouseEvent| dispatch(&commands, UiCommand::Index(name.clone()))
	};

	view! {
		<li class=class>
			<button class="repo-name" disabled=!indexed on:click=select>
				{name}
			</button>
			<span class=badge_class>{badge_text}</span>
			{(row.state == IndexState::NotIndexed)
				.then(|| view! { <button class="index-now" on:click=index_now>"Index now"</button> })}
			{row.error.map(|err| view! { <p class="row-error">{err.to_string()}</p> })}
		</li>
	}
}

/// Repository list with indexing status and per-row "Index now".
#[component]
pub fn RepoList(#[prop(into)] model: Signal<ViewModel>, commands: Commands) -> impl IntoView {
	let all_commands = commands.clone();
	let show_all = move |_: MouseEvent| dispatch(&all_commands, UiCommand::Select(Scope::All));

	view! {
		<aside class="repo-list">
			<header>
				<h2>"Repositories"</h2>
				<span class="repo-count">
					{move || {
						model
							.with(|vm| {
								let indexed = vm
									.repositories
									.iter()
									.filter(|r| r.state == IndexState::Indexed)
									.count();
								format!("{indexed}/{} indexed", vm.repositories.len())
							})
					}}
				</span>
			</header>
			<button
				class=move || {
					if model.with(|vm| vm.scope == Some(Scope::All)) {
						"scope-all selected"
					} else {
						"scope-all"
					}
				}
				on:click=show_all
			>
				"All repositories"
			</button>
			{move || {
				model
					.with(|vm| {
						vm.needs_indexing
							.then(|| {
								view! {
									<p class="hint">
										"None of your repositories is indexed yet. Pick one and choose \"Index now\"."
									</p>
								}
							})
					})
			}}
			{move || model.with(|vm| vm.list_message.clone()).map(|msg| view! { <p class="hint">{msg}</p> })}
			<ul>
				{move || {
					let commands = commands.clone();
					model
						.with(|vm| {
							vm.repositories
								.iter()
								.map(|row| {
									let selected = vm
										.scope
										.as_ref()
										.is_some_and(|s| *s == Scope::Repository(row.status.full_name.clone()));
									view! {
										<RepoRow row=row.clone() selected=selected commands=commands.clone() />
									}
								})
								.collect_view()
						})
				}}
			</ul>
			{move || {
				model
					.with(|vm| vm.list_loaded && vm.repositories.is_empty())
					.then(|| view! { <p class="hint">"No repositories available."</p> })
			}}
		</aside>
	}
}
