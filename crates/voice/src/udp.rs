//! UDP-Kanal – Verbindungsloser Transport fuer Client und Relay
//!
//! Kapselt genau einen UDP-Socket. Empfangen wird in einem eigenen
//! Tokio-Task, der jedes Datagramm an einen registrierten Callback uebergibt.
//! Gesendet wird fire-and-forget direkt aus dem Aufrufer-Thread.
//!
//! ## Architektur
//!
//! ```text
//! std::net::UdpSocket (nicht-blockierend)
//!     |
//!     +--> senden()       <- beliebiger Thread (Audio-Callback, Sweep, Fan-out)
//!     |
//!     +--> try_clone() -> tokio::net::UdpSocket
//!              |
//!              v
//!          Empfangs-Task (recv_from) --> Callback(&[u8], SocketAddr)
//!              ^
//!              |
//!          CancellationToken <- schliessen()
//! ```
//!
//! Das Senden laeuft ueber den std-Socket, damit es ohne Tokio-Kontext
//! funktioniert (der cpal-Capture-Callback laeuft auf einem Geraete-Thread).

use crate::error::VoiceError;
use parking_lot::Mutex;
use sprechfunk_protocol::voice::MAX_DATAGRAM_GROESSE;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// PaketSender
// ---------------------------------------------------------------------------

/// Naht zwischen Paket-Logik und Socket
///
/// Registry und Client-Session senden ausschliesslich ueber diesen Trait,
/// Tests ersetzen den Socket durch einen Rekorder.
pub trait PaketSender: Send + Sync {
    /// Sendet ein Datagramm an `ziel` (best effort, kein Retry)
    fn senden(&self, daten: &[u8], ziel: SocketAddr) -> Result<(), VoiceError>;
}

// ---------------------------------------------------------------------------
// UdpKanal
// ---------------------------------------------------------------------------

/// Bidirektionaler UDP-Kanal mit genau einer Empfangs-Loop
pub struct UdpKanal {
    socket: std::net::UdpSocket,
    lokale_adresse: SocketAddr,
    abbruch: CancellationToken,
    geschlossen: AtomicBool,
    empfang_task: Mutex<Option<JoinHandle<()>>>,
}

impl UdpKanal {
    /// Bindet den Socket (Port 0 = OS waehlt einen freien Port)
    ///
    /// # Fehler
    /// - `Bind` wenn der Socket nicht geoeffnet oder konfiguriert werden kann
    pub fn oeffnen(bind_addr: SocketAddr) -> Result<Self, VoiceError> {
        let bind_fehler = |quelle: io::Error| VoiceError::Bind {
            adresse: bind_addr,
            quelle,
        };

        let socket = std::net::UdpSocket::bind(bind_addr).map_err(bind_fehler)?;
        socket.set_broadcast(true).map_err(bind_fehler)?;
        socket.set_nonblocking(true).map_err(bind_fehler)?;
        let lokale_adresse = socket.local_addr().map_err(bind_fehler)?;

        tracing::info!(addr = %lokale_adresse, "UDP-Kanal gebunden");

        Ok(Self {
            socket,
            lokale_adresse,
            abbruch: CancellationToken::new(),
            geschlossen: AtomicBool::new(false),
            empfang_task: Mutex::new(None),
        })
    }

    /// Gibt die tatsaechlich gebundene lokale Adresse zurueck
    pub fn lokale_adresse(&self) -> SocketAddr {
        self.lokale_adresse
    }

    /// Startet die Empfangs-Loop
    ///
    /// Der Callback wird fuer jedes Datagramm in der Reihenfolge aufgerufen,
    /// in der der Socket sie liefert. Die Loop laeuft bis `schliessen()`.
    /// Muss innerhalb einer Tokio-Laufzeit aufgerufen werden.
    pub fn empfang_starten<F>(&self, callback: F) -> Result<(), VoiceError>
    where
        F: Fn(&[u8], SocketAddr) + Send + Sync + 'static,
    {
        if self.ist_geschlossen() {
            return Err(VoiceError::Geschlossen);
        }

        let mut task_slot = self.empfang_task.lock();
        if task_slot.is_some() {
            return Err(VoiceError::EmpfangLaeuftBereits);
        }

        let laufzeit =
            tokio::runtime::Handle::try_current().map_err(|_| VoiceError::KeineLaufzeit)?;
        let _kontext = laufzeit.enter();

        let empfangs_socket = self
            .socket
            .try_clone()
            .and_then(tokio::net::UdpSocket::from_std)?;

        let abbruch = self.abbruch.clone();
        let lokal = self.lokale_adresse;

        let task = laufzeit.spawn(async move {
            empfangs_loop(empfangs_socket, abbruch, callback).await;
            tracing::debug!(addr = %lokal, "Empfangs-Loop beendet");
        });

        *task_slot = Some(task);
        tracing::debug!(addr = %self.lokale_adresse, "Empfangs-Loop gestartet");
        Ok(())
    }

    /// Sendet ein Datagramm ohne zu blockieren
    ///
    /// # Fehler
    /// - `Geschlossen` nach `schliessen()`
    /// - `Ueberlastet` wenn der lokale Sendepuffer voll ist
    /// - `Senden` bei jedem anderen Socket-Fehler
    pub fn senden(&self, daten: &[u8], ziel: SocketAddr) -> Result<(), VoiceError> {
        if self.ist_geschlossen() {
            return Err(VoiceError::Geschlossen);
        }

        match self.socket.send_to(daten, ziel) {
            Ok(gesendet) => {
                tracing::trace!(bytes = gesendet, ziel = %ziel, "UDP-Paket gesendet");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                Err(VoiceError::Ueberlastet { ziel })
            }
            Err(quelle) => Err(VoiceError::Senden { ziel, quelle }),
        }
    }

    /// Schliesst den Kanal
    ///
    /// Idempotent und aus jedem Thread aufrufbar. Bricht die Empfangs-Loop
    /// ab, auch wenn sie gerade auf ein Datagramm wartet.
    pub fn schliessen(&self) {
        if self.geschlossen.swap(true, Ordering::AcqRel) {
            return;
        }
        self.abbruch.cancel();
        tracing::info!(addr = %self.lokale_adresse, "UDP-Kanal geschlossen");
    }

    /// Gibt true zurueck wenn `schliessen()` bereits aufgerufen wurde
    pub fn ist_geschlossen(&self) -> bool {
        self.geschlossen.load(Ordering::Acquire)
    }

    /// Wartet bis die Empfangs-Loop beendet ist (nach `schliessen()`)
    pub async fn empfang_abwarten(&self) {
        let task = self.empfang_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl PaketSender for UdpKanal {
    fn senden(&self, daten: &[u8], ziel: SocketAddr) -> Result<(), VoiceError> {
        UdpKanal::senden(self, daten, ziel)
    }
}

impl Drop for UdpKanal {
    fn drop(&mut self) {
        self.schliessen();
    }
}

// ---------------------------------------------------------------------------
// Empfangs-Loop
// ---------------------------------------------------------------------------

async fn empfangs_loop<F>(socket: tokio::net::UdpSocket, abbruch: CancellationToken, callback: F)
where
    F: Fn(&[u8], SocketAddr),
{
    // Empfangspuffer wird wiederverwendet (kein Heap pro Paket)
    let mut buf = vec![0u8; MAX_DATAGRAM_GROESSE];

    loop {
        tokio::select! {
            biased;

            _ = abbruch.cancelled() => break,

            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, absender)) => {
                        tracing::trace!(bytes = len, absender = %absender, "UDP-Paket empfangen");
                        callback(&buf[..len], absender);
                    }
                    Err(_) if abbruch.is_cancelled() => break,
                    Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                        // ICMP port unreachable eines frueheren Sendeversuchs (Windows)
                        tracing::debug!(fehler = %e, "Peer nicht erreichbar");
                    }
                    Err(e) => {
                        tracing::warn!(fehler = %e, "UDP-Empfangsfehler");
                        // Kurze Pause um Busy-Loop bei persistentem Fehler zu vermeiden
                        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
