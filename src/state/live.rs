//! Live update channel: a server-sent event stream announcing that a
//! repository finished indexing.
//!
//! The channel only forwards parsed events to a [`PushSink`]; it never keeps
//! status of its own. Refetches are idempotent overwrites, so duplicate
//! events after a reconnect need no bookkeeping.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{AbortHandle, Abortable};
use futures::stream::{self, LocalBoxStream, StreamExt};
use gloo_net::eventsource::futures::EventSource;
use log::{debug, info, warn};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::ChannelError;

/// Connectivity of the push channel, as shown by the live indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
	/// Not connected; a reconnect may be scheduled.
	#[default]
	Disconnected,
	/// Attempting to establish the stream.
	Connecting,
	/// Stream open.
	Connected,
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Disconnected => write!(f, "Offline"),
			Self::Connecting => write!(f, "Connecting"),
			Self::Connected => write!(f, "Live"),
		}
	}
}

/// An event this subsystem acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
	/// The repository's graph is ready.
	Indexed {
		/// `owner/name`.
		repository: String,
	},
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PushMessage {
	Indexed { repository: String },
	#[serde(other)]
	Other,
}

/// Parses one frame. Anything but a well-formed `indexed` message yields
/// `None` and has no side effect.
pub fn parse_push_message(frame: &str) -> Option<PushEvent> {
	match serde_json::from_str::<PushMessage>(frame) {
		Ok(PushMessage::Indexed { repository }) if !repository.trim().is_empty() => {
			Some(PushEvent::Indexed {
				repository: repository.trim().to_owned(),
			})
		}
		Ok(_) => {
			debug!("ignoring push frame: {frame}");
			None
		}
		Err(err) => {
			debug!("ignoring malformed push frame ({err}): {frame}");
			None
		}
	}
}

/// One item of a push stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFrame {
	/// The server accepted the stream.
	Opened,
	/// A raw text frame.
	Message(String),
}

/// Frames of one connection, until it errors or ends.
pub type FrameStream = LocalBoxStream<'static, Result<PushFrame, ChannelError>>;

/// Receiver of channel activity.
#[async_trait(?Send)]
pub trait PushSink {
	/// Connectivity changed.
	fn set_connection(&self, state: ConnectionState);

	/// A parsed event arrived. The channel waits for this before reading the
	/// next frame.
	async fn on_event(&self, event: PushEvent);
}

/// Source of push frames.
#[async_trait(?Send)]
pub trait PushTransport {
	/// Starts a connection for `user_id`. The stream yields
	/// [`PushFrame::Opened`] once the server accepts it.
	async fn connect(&self, user_id: &str) -> Result<FrameStream, ChannelError>;

	/// Waits before the next connection attempt.
	async fn backoff(&self, delay: Duration);
}

/// Exponential reconnect delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
	/// Delay after the first failure.
	pub base: Duration,
	/// Delays never exceed this.
	pub max: Duration,
}

impl ReconnectPolicy {
	/// Delay before reconnect attempt number `attempt` (0-based).
	pub fn delay(&self, attempt: u32) -> Duration {
		let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
		self.base.saturating_mul(factor).min(self.max)
	}
}

impl From<&AppConfig> for ReconnectPolicy {
	fn from(config: &AppConfig) -> Self {
		Self {
			base: config.reconnect_base,
			max: config.reconnect_max,
		}
	}
}

/// Keeps the channel alive; closing (or dropping) it ends the loop and
/// releases the connection.
#[derive(Debug)]
pub struct ChannelHandle {
	abort: AbortHandle,
}

impl ChannelHandle {
	/// Tears the channel down. Safe to call more than once.
	pub fn close(&self) {
		if !self.abort.is_aborted() {
			info!("closing push channel");
			self.abort.abort();
		}
	}

	/// Whether [`close`](Self::close) ran.
	pub fn is_closed(&self) -> bool {
		self.abort.is_aborted()
	}
}

impl Drop for ChannelHandle {
	fn drop(&mut self) {
		self.close();
	}
}

/// The connect / forward / reconnect loop.
pub struct LiveChannel<T, S> {
	transport: T,
	sink: S,
	user_id: String,
	policy: ReconnectPolicy,
}

impl<T: PushTransport + 'static, S: PushSink + 'static> LiveChannel<T, S> {
	/// A channel for `user_id`; nothing happens until it runs.
	pub fn new(transport: T, sink: S, user_id: impl Into<String>, policy: ReconnectPolicy) -> Self {
		Self {
			transport,
			sink,
			user_id: user_id.into(),
			policy,
		}
	}

	/// Runs until aborted. Never returns on its own.
	///
	/// The channel reports `Connected` only once the stream is open; a
	/// message counts as proof of that too. Backoff resets only after an
	/// open stream.
	pub async fn run(self) {
		let mut attempt = 0u32;
		loop {
			self.sink.set_connection(ConnectionState::Connecting);
			match self.transport.connect(&self.user_id).await {
				Ok(mut frames) => {
					let mut open = false;
					let reason = loop {
						let frame = match frames.next().await {
							Some(Ok(frame)) => frame,
							Some(Err(err)) => break err,
							None => break ChannelError::Disconnected("stream ended".into()),
						};
						if !open {
							open = true;
							attempt = 0;
							info!("push channel connected");
							self.sink.set_connection(ConnectionState::Connected);
						}
						let event = match frame {
							PushFrame::Opened => None,
							PushFrame::Message(text) => parse_push_message(&text),
						};
						if let Some(event) = event {
							self.sink.on_event(event).await;
						}
					};
					warn!("{reason}");
				}
				Err(err) => warn!("{err}"),
			}
			self.sink.set_connection(ConnectionState::Disconnected);
			let delay = self.policy.delay(attempt);
			attempt = attempt.saturating_add(1);
			debug!("reconnecting push channel in {delay:?}");
			self.transport.backoff(delay).await;
		}
	}

	/// The loop as an abortable future, plus the handle that aborts it.
	pub fn into_task(self) -> (ChannelHandle, impl Future<Output = ()>) {
		let (abort, registration) = AbortHandle::new_pair();
		let task = async move {
			let _ = Abortable::new(self.run(), registration).await;
		};
		(ChannelHandle { abort }, task)
	}

	/// Starts the loop on the browser's event loop.
	pub fn spawn(self) -> ChannelHandle {
		let (handle, task) = self.into_task();
		wasm_bindgen_futures::spawn_local(task);
		handle
	}
}

/// [`PushTransport`] over the backend's SSE endpoint.
#[derive(Clone, Debug)]
pub struct EventSourceTransport {
	url: String,
}

impl EventSourceTransport {
	/// Transport for the events endpoint of `config`.
	pub fn new(config: &AppConfig) -> Self {
		Self {
			url: config.events_url(),
		}
	}
}

#[async_trait(?Send)]
impl PushTransport for EventSourceTransport {
	/// `EventSource::new` succeeds even when the server is unreachable, so
	/// the returned stream stays silent until the browser fires `open`.
	async fn connect(&self, user_id: &str) -> Result<FrameStream, ChannelError> {
		let user = js_sys::encode_uri_component(user_id);
		let url = format!("{}?user_id={}", self.url, String::from(user));
		let mut source =
			EventSource::new(&url).map_err(|e| ChannelError::Connect(format!("{e:?}")))?;
		let opened = source
			.subscribe("open")
			.map_err(|e| ChannelError::Connect(format!("{e:?}")))?
			.map(|item| item.map(|_| PushFrame::Opened));
		let messages = source
			.subscribe("message")
			.map_err(|e| ChannelError::Connect(format!("{e:?}")))?
			.map(|item| {
				item.map(|(_, event)| {
					PushFrame::Message(event.data().as_string().unwrap_or_default())
				})
			});
		let frames = stream::select(opened, messages).map(move |item| {
			// the subscriptions only live as long as their source
			let _ = &source;
			item.map_err(|e| ChannelError::Disconnected(e.to_string()))
		});
		Ok(frames.boxed_local())
	}

	async fn backoff(&self, delay: Duration) {
		gloo_timers::future::sleep(delay).await;
	}
}
