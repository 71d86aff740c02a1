use crate::prelude::*;
use crate::vedirect::LineCodec;

use {
    futures::StreamExt,
    tokio::io::AsyncRead,
    tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits},
    tokio_util::codec::FramedRead,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelData {
    Connected(StreamHandle),    // stream -> coordinator
    Disconnected(StreamHandle), // stream -> coordinator
    Line(StreamHandle, ProtocolLine),
    Close(StreamHandle), // coordinator -> one stream
    Shutdown,
}

/// One physical VE.Direct interface.
///
/// Reads lines off the serial port and forwards them to the coordinator. A
/// stream that stops for any reason reports `Disconnected` and is not
/// reopened.
#[derive(Clone)]
pub struct DeviceStream {
    config: ConfigWrapper,
    channels: Channels,
    handle: StreamHandle,
    path: String,
}

impl DeviceStream {
    pub fn new(
        config: ConfigWrapper,
        channels: Channels,
        handle: StreamHandle,
        path: String,
    ) -> Self {
        Self {
            config,
            channels,
            handle,
            path,
        }
    }

    /// Opens the port and runs until stopped. `to_stream_rx` must be
    /// subscribed before the task is spawned, or a `Shutdown` sent in the
    /// meantime is never seen.
    pub async fn start(&self, to_stream_rx: broadcast::Receiver<ChannelData>) -> Result<()> {
        let result = self.connect(to_stream_rx).await;
        self.finish(result)
    }

    async fn connect(&self, to_stream_rx: broadcast::Receiver<ChannelData>) -> Result<()> {
        let serial = self.config.serial();
        info!(
            "{}: opening {} at {} baud",
            self.handle,
            self.path,
            serial.baud_rate()
        );

        let port = tokio_serial::new(&self.path, serial.baud_rate())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open_native_async()
            .map_err(|err| file_error_with_source!(err, "opening serial port {}", self.path))?;

        self.run(port, to_stream_rx).await
    }

    /// Forwards lines read from `reader` until shutdown, close, EOF or a
    /// read error.
    pub async fn run<R>(
        &self,
        reader: R,
        mut to_stream_rx: broadcast::Receiver<ChannelData>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let serial = self.config.serial();
        let mut lines = FramedRead::new(reader, LineCodec::new(serial.max_line_length()));

        info!("{}: connected to {}", self.handle, self.path);
        self.channels.emit(Event::ConnectionOpen(self.path.clone()));
        let _ = self.channels.from_stream.send(ChannelData::Connected(self.handle));

        loop {
            tokio::select! {
                msg = to_stream_rx.recv() => {
                    match msg {
                        Ok(ChannelData::Shutdown) => {
                            info!("{}: received shutdown signal", self.handle);
                            break;
                        }
                        Ok(ChannelData::Close(handle)) if handle == self.handle => {
                            info!("{}: closing {}", self.handle, self.path);
                            break;
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }

                line = lines.next() => {
                    match line {
                        Some(Ok(line)) => {
                            trace!(
                                "{}: RX {:?}",
                                self.handle,
                                String::from_utf8_lossy(line.content())
                            );
                            let data = ChannelData::Line(self.handle, line);
                            if self.channels.from_stream.send(data).is_err() {
                                bail!("send(from_stream) failed - channel closed?");
                            }
                        }
                        Some(Err(err)) => bail!("read error on {}: {}", self.path, err),
                        None => bail!("{} closed by device", self.path),
                    }
                }
            }
        }

        let discarded = lines.decoder().discarded();
        if discarded > 0 {
            info!("{}: {} bytes discarded by line framing", self.handle, discarded);
        }

        Ok(())
    }

    /// Reports the outcome of a run and tells the coordinator this stream is
    /// gone.
    pub fn finish(&self, result: Result<()>) -> Result<()> {
        if let Err(err) = &result {
            error!("{}: {}", self.handle, err);
            self.channels.emit(Event::ConnectionError {
                path: self.path.clone(),
                message: err.to_string(),
            });
        }

        let _ = self.channels.from_stream.send(ChannelData::Disconnected(self.handle));
        result
    }
}
