use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the named input device, or the host default when no name is given.
pub fn get_or_default_input(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    let target = match device_name {
        Some(name) => name.to_string(),
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No default input device"))?
            .name()?,
    };

    for in_device in host.input_devices()? {
        if in_device.name().is_ok_and(|name| name == target) {
            return Ok(in_device);
        }
    }
    Err(anyhow::anyhow!("No target device found: {}", target))
}

pub fn get_available_inputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();

    let mut device_names: Vec<String> = Vec::new();
    let default_device = host
        .default_input_device()
        .and_then(|device| device.name().ok());
    for in_device in host.input_devices()? {
        let d_name = in_device.name()?;
        let d_cfg = in_device.default_input_config()?;
        let d_sampling_rate = d_cfg.sample_rate().0;
        let d_ch = d_cfg.channels();

        let mut d = format!(" * {}({}ch, {}hz)", d_name, d_ch, d_sampling_rate);
        if default_device.as_deref() == Some(d_name.as_str()) {
            d.push_str(" [default]");
        }
        device_names.push(d);
    }
    Ok(device_names.join("\n"))
}
