//! Sprechfunk-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass Relay und Client ohne
//! Konfigurationsdatei lauffaehig sind.

use serde::{Deserialize, Serialize};
use sprechfunk_audio::AudioEngineConfig;
use sprechfunk_core::SprechfunkError;
use sprechfunk_voice::{RegistryConfig, RelayConfig};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

/// Vollstaendige Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SprechfunkConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Relay-Einstellungen (nur Host-Modus)
    pub relay: RelayEinstellungen,
    /// Audio-Einstellungen (nur Connect-Modus)
    pub audio: AudioEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse des Relays
    pub bind_adresse: String,
    /// UDP-Port des Relays (auch Ziel-Port der Clients)
    pub relay_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            relay_port: 12345,
        }
    }
}

/// Relay-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Abstand zwischen zwei Keepalive-Sweeps in Sekunden
    pub sweep_intervall_s: u64,
    /// Ab diesem Alter des letzten Pakets wird ein Client angepingt
    pub veraltet_nach_s: u64,
    /// Clients ohne Paket seit dieser Dauer werden entfernt (leer = nie)
    pub stille_entfernen_nach_s: Option<u64>,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        Self {
            sweep_intervall_s: 30,
            veraltet_nach_s: 15,
            stille_entfernen_nach_s: None,
        }
    }
}

/// Audio-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    /// Kapazitaet des Jitter Buffers in Millisekunden
    pub jitter_buffer_ms: u32,
    /// Eingabegeraet (Teilstring des Namens, leer = Standard)
    pub eingabegeraet: Option<String>,
    /// Ausgabegeraet (Teilstring des Namens, leer = Standard)
    pub ausgabegeraet: Option<String>,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            jitter_buffer_ms: 500,
            eingabegeraet: None,
            ausgabegeraet: None,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl SprechfunkConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };

        config.validieren()?;
        Ok(config)
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn validieren(&self) -> Result<(), SprechfunkError> {
        if self.relay.sweep_intervall_s == 0 {
            return Err(SprechfunkError::Konfiguration(
                "relay.sweep_intervall_s muss groesser als 0 sein".into(),
            ));
        }
        if self.relay.veraltet_nach_s == 0 {
            return Err(SprechfunkError::Konfiguration(
                "relay.veraltet_nach_s muss groesser als 0 sein".into(),
            ));
        }
        if let Some(stille) = self.relay.stille_entfernen_nach_s {
            if stille < self.relay.veraltet_nach_s {
                return Err(SprechfunkError::Konfiguration(format!(
                    "relay.stille_entfernen_nach_s ({stille}) ist kleiner als relay.veraltet_nach_s ({})",
                    self.relay.veraltet_nach_s
                )));
            }
        }
        // Mindestens ein Frame (20 ms)
        if self.audio.jitter_buffer_ms < 20 {
            return Err(SprechfunkError::Konfiguration(
                "audio.jitter_buffer_ms muss mindestens 20 sein".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(SprechfunkError::Konfiguration(format!(
                "logging.format '{}' unbekannt (text oder json)",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Gibt die Bind-Adresse des Relays zurueck
    pub fn relay_bind_adresse(&self, port: u16) -> Result<SocketAddr, SprechfunkError> {
        let ip: IpAddr = self.netzwerk.bind_adresse.parse().map_err(|_| {
            SprechfunkError::Konfiguration(format!(
                "netzwerk.bind_adresse '{}' ist keine IP-Adresse",
                self.netzwerk.bind_adresse
            ))
        })?;
        Ok(SocketAddr::new(ip, port))
    }

    /// Lokale Client-Adresse passend zur Adressfamilie des Servers (Port 0)
    pub fn client_bind_adresse(server: SocketAddr) -> SocketAddr {
        let ip = match server {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        SocketAddr::new(ip, 0)
    }

    pub fn relay_config(&self, bind_addr: SocketAddr) -> RelayConfig {
        RelayConfig {
            bind_addr,
            sweep_intervall: Duration::from_secs(self.relay.sweep_intervall_s),
            registry: RegistryConfig {
                veraltet_nach: Duration::from_secs(self.relay.veraltet_nach_s),
                stille_entfernen_nach: self.relay.stille_entfernen_nach_s.map(Duration::from_secs),
            },
        }
    }

    pub fn jitter_dauer(&self) -> Duration {
        Duration::from_millis(u64::from(self.audio.jitter_buffer_ms))
    }

    pub fn audio_engine_config(&self) -> AudioEngineConfig {
        AudioEngineConfig {
            eingabegeraet: self.audio.eingabegeraet.clone(),
            ausgabegeraet: self.audio.ausgabegeraet.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = SprechfunkConfig::default();
        assert!(cfg.validieren().is_ok());
        assert_eq!(cfg.netzwerk.relay_port, 12345);
        assert_eq!(cfg.relay.sweep_intervall_s, 30);
        assert_eq!(cfg.relay.veraltet_nach_s, 15);
        assert!(cfg.relay.stille_entfernen_nach_s.is_none());
        assert_eq!(cfg.audio.jitter_buffer_ms, 500);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            relay_port = 40000

            [relay]
            stille_entfernen_nach_s = 120

            [logging]
            format = "json"
        "#;
        let cfg: SprechfunkConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.relay_port, 40000);
        assert_eq!(cfg.relay.stille_entfernen_nach_s, Some(120));
        assert_eq!(cfg.logging.format, "json");
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.relay.sweep_intervall_s, 30);
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = SprechfunkConfig::laden("/gibt/es/nicht/sprechfunk.toml").unwrap();
        assert_eq!(cfg.netzwerk.relay_port, 12345);
    }

    #[test]
    fn ungueltige_werte_werden_abgelehnt() {
        let mut cfg = SprechfunkConfig::default();
        cfg.relay.sweep_intervall_s = 0;
        assert!(matches!(
            cfg.validieren(),
            Err(SprechfunkError::Konfiguration(_))
        ));

        let mut cfg = SprechfunkConfig::default();
        cfg.relay.stille_entfernen_nach_s = Some(5);
        assert!(cfg.validieren().is_err());

        let mut cfg = SprechfunkConfig::default();
        cfg.audio.jitter_buffer_ms = 10;
        assert!(cfg.validieren().is_err());

        let mut cfg = SprechfunkConfig::default();
        cfg.logging.format = "xml".into();
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn relay_config_uebernimmt_zeiten() {
        let mut cfg = SprechfunkConfig::default();
        cfg.relay.stille_entfernen_nach_s = Some(60);
        let bind = cfg.relay_bind_adresse(12345).unwrap();
        let rc = cfg.relay_config(bind);

        assert_eq!(rc.bind_addr, "0.0.0.0:12345".parse::<SocketAddr>().unwrap());
        assert_eq!(rc.sweep_intervall, Duration::from_secs(30));
        assert_eq!(rc.registry.veraltet_nach, Duration::from_secs(15));
        assert_eq!(rc.registry.stille_entfernen_nach, Some(Duration::from_secs(60)));
    }

    #[test]
    fn ungueltige_bind_adresse() {
        let mut cfg = SprechfunkConfig::default();
        cfg.netzwerk.bind_adresse = "kein-ip".into();
        assert!(cfg.relay_bind_adresse(1).is_err());
    }

    #[test]
    fn client_bind_folgt_adressfamilie() {
        let v4 = SprechfunkConfig::client_bind_adresse("10.0.0.1:12345".parse().unwrap());
        let v6 = SprechfunkConfig::client_bind_adresse("[::1]:12345".parse().unwrap());
        assert!(v4.is_ipv4());
        assert!(v6.is_ipv6());
        assert_eq!(v4.port(), 0);
    }

    #[test]
    fn jitter_dauer_aus_millisekunden() {
        let cfg = SprechfunkConfig::default();
        assert_eq!(cfg.jitter_dauer(), Duration::from_millis(500));
    }
}
