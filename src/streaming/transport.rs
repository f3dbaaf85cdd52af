use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use crate::error::{Error, Result};

/// A live push connection delivering text frames.
#[async_trait]
pub trait StreamTransport: Send {
    /// `None` once the peer has closed the connection.
    async fn next_message(&mut self) -> Option<Result<String>>;
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamTransport>>;

    /// Whether one connection can carry several topics.
    fn supports_multiplex(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamTransport>> {
        let (stream, response) = connect_async(url).await?;
        tracing::info!(url = %url, status = %response.status(), "WebSocket connected");
        Ok(Box::new(WsTransport { stream }))
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn next_message(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(String::from_utf8(bytes).map_err(|e| {
                        Error::DeserializationError(format!("non-UTF-8 binary frame: {}", e))
                    }))
                }
                // tungstenite answers pings itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Ok(Message::Close(frame)) => {
                    tracing::info!(frame = ?frame, "WebSocket closed by peer");
                    return None;
                }
                Err(e) => return Some(Err(Error::ConnectionLost(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await.map_err(Error::from)
    }
}
