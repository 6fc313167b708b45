pub mod force_graph;
pub mod node_details;
pub mod repo_list;

use futures::channel::mpsc::UnboundedSender;
use leptos::prelude::*;

use crate::error::{ApiError, ErrorClass};
use crate::state::UiCommand;

/// Outbox for user intents; the page drains it into the controller.
pub type Commands = UnboundedSender<UiCommand>;

pub fn dispatch(commands: &Commands, command: UiCommand) {
	if let Err(err) = commands.unbounded_send(command) {
		log::warn!("dropping command, view is shutting down: {err}");
	}
}

/// Inline banner for a failed request, styled by error class.
#[component]
pub fn ErrorBanner(error: ApiError, #[prop(into)] context: String) -> impl IntoView {
	let (class, hint) = match error.class() {
		ErrorClass::Network => ("banner banner-network", "Check your connection and retry."),
		ErrorClass::AccessDenied => ("banner banner-denied", "You do not have access to this resource."),
		ErrorClass::Server => ("banner banner-server", "The server had a problem, try again shortly."),
		ErrorClass::Invalid => ("banner banner-invalid", ""),
	};
	view! {
		<div class=class role="alert">
			<strong>{context}</strong>
			" "
			{error.to_string()}
			<span class="banner-hint">" " {hint}</span>
		</div>
	}
}
