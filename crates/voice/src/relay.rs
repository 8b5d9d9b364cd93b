//! Relay-Server – verbindet UDP-Kanal, Registry und periodischen Sweep
//!
//! Der Relay haelt keinen Audio-Zustand: jedes Voice-Datagramm wird so wie
//! empfangen an alle anderen aktiven Clients weitergereicht.
//!
//! ```text
//! UdpKanal::empfang --> RelayRegistry::paket_empfangen --> UdpKanal::senden (Fan-out)
//!
//! Sweep-Task (alle 30 s) --> RelayRegistry::sweep_einmal --> Keepalive an Veraltete
//! ```

use crate::error::VoiceError;
use crate::registry::{RegistryConfig, RelayRegistry};
use crate::udp::UdpKanal;
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Standard-Port des Relays
pub const STANDARD_PORT: u16 = 12345;

/// Abstand zwischen zwei Sweeps
pub const SWEEP_INTERVALL: Duration = Duration::from_secs(30);

/// Konfiguration des Relay-Servers
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub sweep_intervall: Duration,
    pub registry: RegistryConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), STANDARD_PORT),
            sweep_intervall: SWEEP_INTERVALL,
            registry: RegistryConfig::default(),
        }
    }
}

/// Laufender Relay-Server
pub struct RelayServer {
    kanal: Arc<UdpKanal>,
    registry: RelayRegistry,
    sweep_intervall: Duration,
    abbruch: CancellationToken,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
    beendet: AtomicBool,
}

impl RelayServer {
    /// Bindet den Relay-Socket, startet aber noch nichts
    ///
    /// # Fehler
    /// - `Bind` wenn der Port belegt ist
    pub fn binden(config: RelayConfig) -> Result<Self, VoiceError> {
        let kanal = UdpKanal::oeffnen(config.bind_addr)?;

        Ok(Self {
            kanal: Arc::new(kanal),
            registry: RelayRegistry::neu(config.registry),
            sweep_intervall: config.sweep_intervall,
            abbruch: CancellationToken::new(),
            sweep_task: Mutex::new(None),
            beendet: AtomicBool::new(false),
        })
    }

    /// Tatsaechlich gebundene Adresse
    pub fn lokale_adresse(&self) -> SocketAddr {
        self.kanal.lokale_adresse()
    }

    pub fn registry(&self) -> &RelayRegistry {
        &self.registry
    }

    /// Startet Empfangs-Loop und Sweep-Task
    ///
    /// Muss innerhalb einer Tokio-Laufzeit aufgerufen werden.
    pub fn starten(&self) -> Result<(), VoiceError> {
        let laufzeit =
            tokio::runtime::Handle::try_current().map_err(|_| VoiceError::KeineLaufzeit)?;

        let kanal = Arc::clone(&self.kanal);
        let registry = self.registry.clone();
        self.kanal.empfang_starten(move |daten, absender| {
            if let Err(e) = registry.paket_empfangen(daten, absender, kanal.as_ref()) {
                tracing::debug!(absender = %absender, fehler = %e, "Datagramm ignoriert");
            }
        })?;

        let kanal = Arc::clone(&self.kanal);
        let registry = self.registry.clone();
        let abbruch = self.abbruch.clone();
        let intervall = self.sweep_intervall;

        let task = laufzeit.spawn(async move {
            let mut ticker = tokio::time::interval(intervall);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Erster Tick kommt sofort
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = abbruch.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.sweep_einmal(kanal.as_ref());
                    }
                }
            }
            tracing::debug!("Sweep-Task beendet");
        });
        *self.sweep_task.lock() = Some(task);

        tracing::info!(
            addr = %self.lokale_adresse(),
            sweep_intervall_s = self.sweep_intervall.as_secs_f32(),
            "Relay gestartet"
        );
        Ok(())
    }

    /// Stoppt Sweep und Empfang (idempotent)
    pub fn beenden(&self) {
        if self.beendet.swap(true, Ordering::AcqRel) {
            return;
        }
        self.abbruch.cancel();
        self.kanal.schliessen();
        tracing::info!(aktive = self.registry.anzahl(), "Relay beendet");
    }

    /// Wartet bis alle Hintergrund-Tasks nach `beenden()` ausgelaufen sind
    pub async fn abwarten(&self) {
        let task = self.sweep_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.kanal.empfang_abwarten().await;
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        self.beenden();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
