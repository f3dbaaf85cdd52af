pub mod client;
pub mod envelope;
pub mod transport;

pub use client::{StreamCallback, StreamPhase, StreamStats, StreamingClient};
pub use envelope::{latest_price, parse_envelope, StreamEnvelope};
pub use transport::{StreamConnector, StreamTransport, WsConnector};
