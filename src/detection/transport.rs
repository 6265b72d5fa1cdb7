// Network capability the detector drives; concrete sockets live outside this crate
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::probes::Protocol;

/// One open exchange with a target.
#[async_trait]
pub trait Transport: Send {
    /// Write `payload` to the peer. An empty payload is still a valid send.
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Read at most `max_len` bytes, waiting no longer than `timeout`.
    async fn receive(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// Opens transports to a single target.
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Transport;

    async fn connect(&self, protocol: Protocol) -> Result<Self::Conn, TransportError>;

    /// Host name or address substituted for `{$host}` in probe payloads.
    fn host(&self) -> &str;
}
