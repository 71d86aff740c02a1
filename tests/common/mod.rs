#![allow(dead_code)]

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use vedirect_bridge::prelude::*;
use vedirect_bridge::vedirect::LineCodec;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory();

impl Factory {
    /// Config with fixed device paths, no discovery.
    pub fn config(paths: &[&str]) -> ConfigWrapper {
        let yaml = format!("custom_device_paths: [{}]", paths.join(", "));
        ConfigWrapper::from_config(Config::from_yaml(&yaml).unwrap())
    }

    /// Wire bytes of one valid frame, including the trailing delimiter a
    /// device sends before the next frame.
    pub fn frame_bytes(fields: &[(&str, &str)]) -> Vec<u8> {
        let mut bytes = Frame::from_fields(fields.iter().copied()).encode().to_vec();
        bytes.extend_from_slice(b"\r\n");
        bytes
    }

    /// The lines a serial stream would deliver for one valid frame.
    pub fn frame_lines(fields: &[(&str, &str)]) -> Vec<ProtocolLine> {
        Self::lines(&Self::frame_bytes(fields))
    }

    pub fn lines(bytes: &[u8]) -> Vec<ProtocolLine> {
        let mut buf = BytesMut::from(bytes);
        let mut codec = LineCodec::default();
        let mut lines = Vec::new();
        while let Some(line) = codec.decode(&mut buf).unwrap() {
            lines.push(line);
        }
        lines
    }
}
