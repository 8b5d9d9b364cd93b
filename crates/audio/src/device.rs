//! Auswahl der Audio-Geraete
//!
//! Ohne Namen wird das Standardgeraet des cpal-Hosts verwendet, sonst das
//! erste Geraet, dessen Name den gesuchten Teilstring enthaelt.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use tracing::debug;

use crate::error::{AudioError, AudioResult};

/// Laedt das Eingabegeraet (None = Standard)
pub fn eingabegeraet_laden(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    let device = match name {
        None => host
            .default_input_device()
            .ok_or(AudioError::KeinStandardEingabegeraet)?,
        Some(n) => {
            let devices = host
                .input_devices()
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
            nach_name_suchen(devices, n)?
        }
    };
    debug!(geraet = %geraetename(&device), "Eingabegeraet gewaehlt");
    Ok(device)
}

/// Laedt das Ausgabegeraet (None = Standard)
pub fn ausgabegeraet_laden(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    let device = match name {
        None => host
            .default_output_device()
            .ok_or(AudioError::KeinStandardAusgabegeraet)?,
        Some(n) => {
            let devices = host
                .output_devices()
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
            nach_name_suchen(devices, n)?
        }
    };
    debug!(geraet = %geraetename(&device), "Ausgabegeraet gewaehlt");
    Ok(device)
}

/// Anzeigename eines Geraets (leer wenn der Treiber keinen liefert)
pub fn geraetename(device: &Device) -> String {
    device.name().unwrap_or_default()
}

fn nach_name_suchen(devices: impl Iterator<Item = Device>, name: &str) -> AudioResult<Device> {
    devices
        .into_iter()
        .find(|d| namen_passen(&geraetename(d), name))
        .ok_or_else(|| AudioError::GeraetNichtGefunden(name.to_string()))
}

fn namen_passen(geraet: &str, gesucht: &str) -> bool {
    geraet.to_lowercase().contains(&gesucht.to_lowercase())
}
