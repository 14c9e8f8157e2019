//! Serial port connections, available with the `serial` feature.

use super::Connection;
use crate::error::Result;
#[cfg(not(feature = "serial"))]
use crate::error::TransportError;

/// Open `path` at `baud` bits per second.
#[cfg(feature = "serial")]
pub fn open(path: &str, baud: u32) -> Result<Connection> {
    use log::debug;
    use tokio_serial::SerialPortBuilderExt;

    use super::InputSink;
    use crate::error::TransportError;

    let port = tokio_serial::new(path, baud)
        .open_native_async()
        .map_err(|e| TransportError::SerialOpen {
            path: path.to_string(),
            message: e.to_string(),
        })?;
    debug!("opened serial port {} at {} b/s", path, baud);

    let (reader, writer) = tokio::io::split(port);
    Ok(Connection::new()
        .with_input(InputSink::Serial(writer))
        .with_output(reader)
        .with_description(format!("Opened serial port {path} at {baud} b/s")))
}

/// Serial support was not compiled in.
#[cfg(not(feature = "serial"))]
pub fn open(_path: &str, _baud: u32) -> Result<Connection> {
    Err(TransportError::Unsupported {
        capability: "serial",
    }
    .into())
}
