use std::time::Duration;

use async_trait::async_trait;
use futures::future::{Either, select};
use gloo_net::http::{Request, RequestBuilder, Response};
use gloo_timers::future::TimeoutFuture;
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::AppConfig;
use crate::error::{ApiError, Result};
use crate::model::{RawGraph, RepositoryListing, split_full_name};

/// Acknowledgement of an indexing trigger. The backend answers once the
/// clone and index run is over; completion is also announced over the push
/// channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct IndexAccepted {
	/// Free-form status text.
	#[serde(default)]
	pub message: Option<String>,
	/// Files picked up by the indexer, when reported.
	#[serde(default)]
	pub files_indexed: Option<usize>,
}

/// The backend operations this subsystem consumes.
#[async_trait(?Send)]
pub trait GraphApi {
	/// Repositories visible to `user_id`, with indexing status.
	async fn list_repositories(&self, user_id: &str) -> Result<RepositoryListing>;

	/// Nodes, edges and stats of one repository.
	async fn single_graph(&self, full_name: &str, user_id: &str) -> Result<RawGraph>;

	/// Asks the backend to (re)build the graph of one repository.
	async fn trigger_indexing(&self, full_name: &str, user_id: &str) -> Result<IndexAccepted>;
}

/// Backend routes, used to pick the request bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
	Listing,
	Graph,
	Index,
}

/// [`GraphApi`] over the REST endpoints. Reads are bounded by
/// `request_timeout`; the indexing trigger runs until the backend answers.
#[derive(Clone, Debug)]
pub struct HttpGraphApi {
	config: AppConfig,
}

impl HttpGraphApi {
	/// Client for the backend described by `config`.
	pub fn new(config: AppConfig) -> Self {
		Self { config }
	}

	/// The trigger responds only after the clone and index run finishes and
	/// has no client side bound.
	fn deadline(&self, route: Route) -> Option<Duration> {
		match route {
			Route::Listing | Route::Graph => Some(self.config.request_timeout),
			Route::Index => None,
		}
	}

	async fn send<T: DeserializeOwned>(&self, route: Route, request: RequestBuilder) -> Result<T> {
		let exchange = async {
			let response = request
				.send()
				.await
				.map_err(|e| ApiError::Network(e.to_string()))?;
			decode(response).await
		};
		let Some(timeout) = self.deadline(route) else {
			return exchange.await;
		};
		let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
		match select(Box::pin(exchange), TimeoutFuture::new(millis)).await {
			Either::Left((result, _)) => result,
			Either::Right(_) => Err(ApiError::Timeout(timeout)),
		}
	}
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
	let status = response.status();
	if !response.ok() {
		let body = response.text().await.unwrap_or_default();
		return Err(ApiError::from_status(status, &body));
	}
	response
		.json::<T>()
		.await
		.map_err(|e| ApiError::InvalidPayload(e.to_string()))
}

#[async_trait(?Send)]
impl GraphApi for HttpGraphApi {
	async fn list_repositories(&self, user_id: &str) -> Result<RepositoryListing> {
		let url = self.config.url("/graphs/user");
		debug!("GET {url}");
		self.send(Route::Listing, Request::get(&url).query([("user_id", user_id)]))
			.await
	}

	async fn single_graph(&self, full_name: &str, user_id: &str) -> Result<RawGraph> {
		let (owner, repo) = split_full_name(full_name)?;
		let url = self.config.url(&format!("/graphs/{owner}/{repo}"));
		debug!("GET {url}");
		self.send(Route::Graph, Request::get(&url).query([("user_id", user_id)]))
			.await
	}

	async fn trigger_indexing(&self, full_name: &str, user_id: &str) -> Result<IndexAccepted> {
		let (owner, repo) = split_full_name(full_name)?;
		let url = self.config.url(&format!("/graphs/{owner}/{repo}/index"));
		debug!("POST {url}");
		self.send(Route::Index, Request::post(&url).query([("user_id", user_id)]))
			.await
	}
}
