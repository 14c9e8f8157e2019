//! TCP client connections.

use log::debug;
use tokio::net::TcpStream;

use super::{Connection, InputSink};
use crate::error::{Result, TransportError};

/// Connect to `host:port` and split the stream into one output and the
/// input sink.
pub async fn connect(host: &str, port: u16) -> Result<Connection> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|source| TransportError::ConnectionFailed {
            host: host.to_string(),
            port,
            source,
        })?;
    debug!("connected to {}:{}", host, port);

    let (reader, writer) = stream.into_split();
    Ok(Connection::new()
        .with_input(InputSink::Socket(writer))
        .with_output(reader)
        .with_description("Socket opened successfully"))
}
