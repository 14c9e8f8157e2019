//! Write side of an attached stream.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::process::ChildStdin;

/// Where `send` writes go, one variant per transport.
pub enum InputSink {
    /// Child process stdin.
    Process(ChildStdin),

    /// Write half of a TCP connection.
    Socket(OwnedWriteHalf),

    /// Write half of a serial port.
    #[cfg(feature = "serial")]
    Serial(tokio::io::WriteHalf<tokio_serial::SerialStream>),

    /// Any other writer (in-memory pipes, custom transports).
    Custom(Box<dyn AsyncWrite + Send + Unpin>),
}

impl InputSink {
    /// Write all of `data`.
    ///
    /// Pipes and serial ports are flushed after every write so the peer
    /// sees each command as soon as it is sent.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            InputSink::Process(stdin) => {
                stdin.write_all(data).await?;
                stdin.flush().await
            }
            InputSink::Socket(stream) => stream.write_all(data).await,
            #[cfg(feature = "serial")]
            InputSink::Serial(port) => {
                port.write_all(data).await?;
                port.flush().await
            }
            InputSink::Custom(writer) => {
                writer.write_all(data).await?;
                writer.flush().await
            }
        }
    }

    /// Short transport name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            InputSink::Process(_) => "process",
            InputSink::Socket(_) => "socket",
            #[cfg(feature = "serial")]
            InputSink::Serial(_) => "serial",
            InputSink::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Debug for InputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InputSink").field(&self.kind()).finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn test_custom_sink_writes_through() {
        let (writer, mut reader) = tokio::io::duplex(64);
        let mut sink = InputSink::Custom(Box::new(writer));
        sink.write(b"ping\r\n").await.unwrap();

        let mut buf = [0u8; 6];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping\r\n");
        assert_eq!(sink.kind(), "custom");
    }
}
