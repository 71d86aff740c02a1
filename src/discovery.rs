use crate::prelude::*;

use std::path::Path;

/// Device paths to open, in stream index order.
///
/// Configured custom paths are used as-is; otherwise the devices directory
/// is scanned and each match is announced as an `InterfaceFound` event.
pub fn device_paths(config: &ConfigWrapper, channels: &Channels) -> Result<Vec<String>> {
    let custom = config.custom_device_paths();
    if !custom.is_empty() {
        info!("Using {} custom device paths", custom.len());
        return Ok(custom);
    }

    let devices_path = config.devices_path();
    let paths = discover(&devices_path, &config.device_filter()).map_err(|err| {
        channels.emit(Event::Error(format!(
            "Failed to get available VE.Direct devices from {}, \
             try with custom_device_paths option: {}",
            devices_path, err
        )));
        err
    })?;

    for path in &paths {
        info!("Found VE.Direct interface {}", path);
        channels.emit(Event::InterfaceFound(path.clone()));
    }

    Ok(paths)
}

/// Lists entries of `devices_path` whose file name contains `filter`.
pub fn discover(devices_path: &str, filter: &str) -> Result<Vec<String>> {
    let dir = Path::new(devices_path);
    let entries = std::fs::read_dir(dir)
        .map_err(|err| file_error_with_source!(err, "listing {}", devices_path))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().contains(filter) {
            paths.push(dir.join(&name).to_string_lossy().to_string());
        }
    }
    paths.sort();

    debug!("{} of {} matched filter {:?}", paths.len(), devices_path, filter);
    Ok(paths)
}
