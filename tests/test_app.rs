mod common;
use common::*;
use vedirect_bridge::prelude::*;
use vedirect_bridge::Components;

use std::time::Duration;

fn lifecycle(events: &mut broadcast::Receiver<Event>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::InterfaceFound(_) | Event::StreamDestroy) {
            names.push(event.name());
        }
    }
    names
}

fn devices_dir() -> Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    for name in [
        "usb-VictronEnergy_BV_VE_Direct_cable_VE0001-if00-port0",
        "usb-VictronEnergy_BV_VE_Direct_cable_VE0002-if00-port0",
        "usb-FTDI_FT232R_USB_UART_A1-if00-port0",
    ] {
        std::fs::write(dir.path().join(name), b"")?;
    }
    Ok(dir)
}

fn config_for(dir: &tempfile::TempDir) -> Result<ConfigWrapper> {
    let yaml = format!(
        "devices_path: {:?}\nreport_interval: 3600",
        dir.path().to_string_lossy()
    );
    Ok(ConfigWrapper::from_config(Config::from_yaml(&yaml)?))
}

#[tokio::test]
async fn stop_right_after_start_does_not_hang() -> Result<()> {
    common_setup();

    let dir = devices_dir()?;
    let channels = Channels::new();
    let mut events = channels.events.subscribe();

    let mut components = Components::start(config_for(&dir)?, channels)?;
    assert_eq!(components.stream_tasks(), 2);

    tokio::time::timeout(Duration::from_secs(2), components.stop()).await?;

    assert_eq!(components.stream_tasks(), 0);
    assert_eq!(
        lifecycle(&mut events),
        vec!["interface-found", "interface-found", "stream-destroy"]
    );
    Ok(())
}

#[tokio::test]
async fn reset_reopens_discovered_interfaces() -> Result<()> {
    common_setup();

    let dir = devices_dir()?;
    let channels = Channels::new();
    let mut events = channels.events.subscribe();

    let mut components = Components::start(config_for(&dir)?, channels)?;
    tokio::time::timeout(Duration::from_secs(2), components.reset()).await??;

    assert_eq!(components.stream_tasks(), 2);
    assert!(components.coordinator.snapshot_all().is_empty());
    assert_eq!(
        lifecycle(&mut events),
        vec![
            "interface-found",
            "interface-found",
            "stream-destroy",
            "interface-found",
            "interface-found"
        ]
    );

    tokio::time::timeout(Duration::from_secs(2), components.stop()).await?;
    Ok(())
}

#[tokio::test]
async fn discovery_failure_stops_startup() {
    common_setup();

    let config = Config::from_yaml("devices_path: /nonexistent/").unwrap();
    let config = ConfigWrapper::from_config(config);
    assert!(Components::start(config, Channels::new()).is_err());
}
