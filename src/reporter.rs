use crate::prelude::*;
use crate::stream::ChannelData;

use std::time::Duration;

/// Periodically logs every known device as JSON.
pub struct Reporter {
    coordinator: Coordinator,
    interval: Duration,
}

impl Reporter {
    pub fn new(coordinator: Coordinator, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    /// Reports every interval until `Shutdown` arrives on `to_stream_rx`,
    /// which the caller subscribes before spawning.
    pub async fn start(&self, mut to_stream_rx: broadcast::Receiver<ChannelData>) -> Result<()> {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.report() {
                        warn!("report failed: {}", err);
                    }
                }
                msg = to_stream_rx.recv() => {
                    match msg {
                        Ok(ChannelData::Shutdown)
                        | Err(broadcast::error::RecvError::Closed) => break,
                        _ => continue,
                    }
                }
            }
        }

        Ok(())
    }

    /// Logs one line per device and returns how many were logged.
    pub fn report(&self) -> Result<usize> {
        let devices = self.coordinator.devices_data();
        if devices.is_empty() {
            debug!("no device data yet");
        }

        for (key, data) in &devices {
            info!("{}: {}", key, serde_json::to_string(data)?);
        }

        Ok(devices.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_every_device_and_stops_on_shutdown() -> Result<()> {
        let yaml = "custom_device_paths: [/dev/ttyUSB0]";
        let config = ConfigWrapper::from_config(Config::from_yaml(yaml)?);
        let channels = Channels::new();
        let coordinator = Coordinator::new(config, channels.clone());

        let handle = coordinator.register_stream("/dev/ttyUSB0", 0);
        let frame = Frame::from_fields([("SER#", "HQ1"), ("SOC", "870")]);
        let mut buf = bytes::BytesMut::from(&frame.encode()[..]);
        buf.extend_from_slice(b"\r\n");
        let mut codec = vedirect::LineCodec::default();
        while let Some(line) = tokio_util::codec::Decoder::decode(&mut codec, &mut buf)? {
            coordinator.process_line(handle, &line);
        }

        let reporter = Reporter::new(coordinator, Duration::from_millis(10));
        assert_eq!(reporter.report()?, 1);

        let to_stream_rx = channels.to_stream.subscribe();
        let task = tokio::spawn(async move { reporter.start(to_stream_rx).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        channels.to_stream.send(ChannelData::Shutdown)?;

        tokio::time::timeout(Duration::from_secs(1), task).await???;
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_sent_before_the_task_runs_is_seen() -> Result<()> {
        let config = ConfigWrapper::from_config(Config::from_yaml("{}")?);
        let channels = Channels::new();
        let coordinator = Coordinator::new(config, channels.clone());
        let reporter = Reporter::new(coordinator, Duration::from_secs(3600));

        let to_stream_rx = channels.to_stream.subscribe();
        let task = tokio::spawn(async move { reporter.start(to_stream_rx).await });
        channels.to_stream.send(ChannelData::Shutdown)?;

        tokio::time::timeout(Duration::from_secs(1), task).await???;
        Ok(())
    }
}
