// SPDX-License-Identifier: GPL-3.0

//! WebSocket connection.

use super::{Connector, DuplexConnection, FrameSink};
use crate::error::RpcClientError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use url::Url;

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Opens WebSocket connections to a fixed endpoint.
#[derive(Clone, Debug)]
pub struct WsConnector {
	endpoint: Url,
}

impl WsConnector {
	/// Create a connector for a `ws://` or `wss://` endpoint.
	pub fn new(endpoint: Url) -> Self {
		Self { endpoint }
	}

	/// Get the endpoint URL this connector dials.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}

#[async_trait]
impl Connector for WsConnector {
	async fn connect(&self) -> Result<DuplexConnection, RpcClientError> {
		let (socket, _) = connect_async(self.endpoint.as_str()).await.map_err(|e| {
			RpcClientError::ConnectionFailed {
				endpoint: self.endpoint.to_string(),
				message: e.to_string(),
			}
		})?;
		log::debug!("Connected to {}", self.endpoint);

		let (writer, reader) = socket.split();
		let stream = reader
			.filter_map(|message| async move {
				match message {
					Ok(Message::Text(text)) => Some(Ok(text)),
					Ok(Message::Binary(bytes)) => Some(String::from_utf8(bytes).map_err(|e| {
						RpcClientError::Malformed(format!("binary frame is not UTF-8: {e}"))
					})),
					// Ping/pong are answered by tungstenite; the stream ends after a close frame.
					Ok(_) => None,
					Err(e) => Some(Err(RpcClientError::Transport(e.to_string()))),
				}
			})
			.boxed();

		Ok(DuplexConnection { sink: Box::new(WsSink { writer: Mutex::new(writer) }), stream })
	}
}

/// Write half of a WebSocket; the async mutex serializes frames from concurrent callers.
struct WsSink {
	writer: Mutex<WsWriter>,
}

#[async_trait]
impl FrameSink for WsSink {
	async fn send(&self, frame: String) -> Result<(), RpcClientError> {
		self.writer
			.lock()
			.await
			.send(Message::Text(frame))
			.await
			.map_err(|e| RpcClientError::Transport(e.to_string()))
	}

	async fn close(&self) {
		if let Err(e) = self.writer.lock().await.close().await {
			log::trace!("Closing WebSocket failed: {e}");
		}
	}
}
