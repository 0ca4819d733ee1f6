use crate::prelude::*;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};

/// A duplex byte stream to the inverter.
pub trait Link: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Link for T {}

/// Opens connections to the inverter. The reader opens a fresh link for the
/// init handshake and for every read session.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Link>>;

    fn describe(&self) -> String;
}

/// Serial port at 8-N-1 without flow control.
pub struct SerialConnector {
    device: String,
    baudrate: u32,
}

impl SerialConnector {
    pub fn new(config: &config::Serial) -> Self {
        Self {
            device: config.device().to_string(),
            baudrate: config.baudrate(),
        }
    }
}

#[async_trait]
impl Connector for SerialConnector {
    async fn open(&self) -> Result<Box<dyn Link>> {
        let stream = tokio_serial::new(&self.device, self.baudrate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|err| anyhow!("serial open {}: {}", self.device, err))?;

        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("{} [{},8,N,1]", self.device, self.baudrate)
    }
}
