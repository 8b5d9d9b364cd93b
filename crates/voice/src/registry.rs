//! Relay-Registry – Anwesenheitstabelle und Fan-out des Relay-Servers
//!
//! Fuehrt pro Client-Endpunkt den Zeitpunkt des letzten empfangenen Pakets
//! und leitet Voice-Pakete unveraendert an alle anderen Clients weiter.
//!
//! ## Zustaende pro Endpunkt
//!
//! ```text
//! Unbekannt --(erstes Paket)--> Aktiv --(jedes Paket)--> Aktiv
//!                                 |
//!                                 +--(Disconnect | Sendefehler)--> Entfernt
//! ```
//!
//! Ein entfernter Endpunkt, der wieder sendet, wird neu aufgenommen.
//!
//! Thread-safe durch DashMap: Empfangs-Loop und Sweep-Task aendern die
//! Tabelle gleichzeitig, jede Einzelaenderung ist atomar.

use crate::error::VoiceError;
use crate::udp::PaketSender;
use dashmap::DashMap;
use sprechfunk_core::ClientEndpoint;
use sprechfunk_protocol::voice::{PacketTag, VoicePacket, VoicePacketRef};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Ab diesem Alter des letzten Pakets bekommt ein Client ein Keepalive
pub const VERALTET_NACH: Duration = Duration::from_secs(15);

/// Konfiguration der Relay-Registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Clients ohne Paket seit dieser Dauer werden beim Sweep angepingt
    pub veraltet_nach: Duration,
    /// Clients ohne Paket seit dieser Dauer werden beim Sweep entfernt
    ///
    /// `None`: Entfernung nur bei Sendefehlern, nie allein wegen Stille.
    pub stille_entfernen_nach: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            veraltet_nach: VERALTET_NACH,
            stille_entfernen_nach: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Ergebnisse
// ---------------------------------------------------------------------------

/// Was die Registry mit einem empfangenen Paket gemacht hat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verarbeitung {
    /// Voice-Paket an `empfaenger` Peers weitergeleitet, `entfernt` Peers verloren
    Weitergeleitet { empfaenger: usize, entfernt: usize },
    /// Absender hat sich abgemeldet
    Getrennt,
    /// Nur der Zeitstempel des Absenders wurde aufgefrischt
    Aufgefrischt,
}

/// Ergebnis eines Sweep-Durchlaufs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepErgebnis {
    /// Endpunkte, die ein Keepalive erhalten haben
    pub angepingt: Vec<ClientEndpoint>,
    /// Endpunkte, die wegen eines Sendefehlers entfernt wurden
    pub entfernt_sendefehler: Vec<ClientEndpoint>,
    /// Endpunkte, die wegen Stille entfernt wurden
    pub entfernt_stille: Vec<ClientEndpoint>,
}

// ---------------------------------------------------------------------------
// RelayRegistry
// ---------------------------------------------------------------------------

/// Zentrale Anwesenheitstabelle des Relays
///
/// Thread-safe und `Clone`-faehig (innerer Arc).
#[derive(Clone)]
pub struct RelayRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Letzter Paket-Zeitpunkt pro Endpunkt
    clients: DashMap<ClientEndpoint, Instant>,
    config: RegistryConfig,
}

impl RelayRegistry {
    /// Erstellt eine leere Registry
    pub fn neu(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                clients: DashMap::new(),
                config,
            }),
        }
    }

    /// Verarbeitet ein empfangenes Datagramm
    ///
    /// Der Absender wird zuerst aufgefrischt (auch bei unbekanntem Tag),
    /// danach wird nach Tag verzweigt.
    ///
    /// # Fehler
    /// - `MalformedPacket` bei leerem Datagramm (Absender wird nicht aufgefrischt)
    pub fn paket_empfangen(
        &self,
        daten: &[u8],
        absender: SocketAddr,
        sender: &dyn PaketSender,
    ) -> Result<Verarbeitung, VoiceError> {
        self.paket_empfangen_zu(daten, absender, sender, Instant::now())
    }

    /// Wie `paket_empfangen`, mit explizitem Empfangszeitpunkt
    pub fn paket_empfangen_zu(
        &self,
        daten: &[u8],
        absender: SocketAddr,
        sender: &dyn PaketSender,
        jetzt: Instant,
    ) -> Result<Verarbeitung, VoiceError> {
        let paket = VoicePacketRef::decode(daten)?;
        let absender = ClientEndpoint::from(absender);

        self.auffrischen(absender, jetzt);

        match paket.tag {
            PacketTag::Voice => {
                let (empfaenger, entfernt) = self.weiterleiten(daten, absender, sender);
                tracing::trace!(
                    absender = %absender,
                    bytes = daten.len(),
                    empfaenger,
                    "Voice-Paket weitergeleitet"
                );
                Ok(Verarbeitung::Weitergeleitet {
                    empfaenger,
                    entfernt,
                })
            }
            PacketTag::Disconnect => {
                if self.inner.clients.remove(&absender).is_some() {
                    tracing::info!(client = %absender, "Client getrennt");
                }
                Ok(Verarbeitung::Getrennt)
            }
            PacketTag::Keepalive | PacketTag::Unknown(_) => Ok(Verarbeitung::Aufgefrischt),
        }
    }

    /// Pingt alle veralteten Clients einmal an
    pub fn sweep_einmal(&self, sender: &dyn PaketSender) -> SweepErgebnis {
        self.sweep_zu(sender, Instant::now())
    }

    /// Wie `sweep_einmal`, mit explizitem Zeitpunkt
    pub fn sweep_zu(&self, sender: &dyn PaketSender, jetzt: Instant) -> SweepErgebnis {
        let mut ergebnis = SweepErgebnis::default();

        // Prozess juenger als die Schwelle: noch niemand kann veraltet sein
        let Some(grenze) = jetzt.checked_sub(self.inner.config.veraltet_nach) else {
            return ergebnis;
        };
        let stille_grenze = self
            .inner
            .config
            .stille_entfernen_nach
            .and_then(|d| jetzt.checked_sub(d));

        let veraltet: Vec<(ClientEndpoint, Instant)> = self
            .inner
            .clients
            .iter()
            .filter(|e| *e.value() < grenze)
            .map(|e| (*e.key(), *e.value()))
            .collect();

        let keepalive = VoicePacket::keepalive().encode();

        for (client, zuletzt) in veraltet {
            if let Some(stille_grenze) = stille_grenze {
                if zuletzt < stille_grenze {
                    // Nur entfernen wenn seitdem kein neues Paket kam
                    if self
                        .inner
                        .clients
                        .remove_if(&client, |_, t| *t < stille_grenze)
                        .is_some()
                    {
                        tracing::info!(client = %client, "Client wegen Stille entfernt");
                        ergebnis.entfernt_stille.push(client);
                    }
                    continue;
                }
            }

            match sender.senden(&keepalive, client.addr()) {
                Ok(()) => ergebnis.angepingt.push(client),
                Err(e) if e.ist_peer_fehler() => {
                    self.inner.clients.remove(&client);
                    tracing::info!(client = %client, fehler = %e, "Client wegen Inaktivitaet entfernt");
                    ergebnis.entfernt_sendefehler.push(client);
                }
                Err(e) => {
                    tracing::debug!(client = %client, fehler = %e, "Keepalive verworfen");
                }
            }
        }

        let aktive = self.aktive_clients();
        tracing::info!(aktive = aktive.len(), "Aktive Clients");
        tracing::debug!(clients = ?aktive, "Aktive Endpunkte");
        ergebnis
    }

    /// Gibt true zurueck wenn der Endpunkt aktiv ist
    pub fn ist_aktiv(&self, endpunkt: &ClientEndpoint) -> bool {
        self.inner.clients.contains_key(endpunkt)
    }

    /// Gibt alle aktiven Endpunkte zurueck
    pub fn aktive_clients(&self) -> Vec<ClientEndpoint> {
        self.inner.clients.iter().map(|e| *e.key()).collect()
    }

    /// Anzahl der aktiven Clients
    pub fn anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsfunktionen
    // -----------------------------------------------------------------------

    fn auffrischen(&self, client: ClientEndpoint, jetzt: Instant) {
        if self.inner.clients.insert(client, jetzt).is_none() {
            tracing::info!(client = %client, "Neuer Client");
        }
    }

    /// Sendet das Original-Datagramm an alle ausser dem Absender
    ///
    /// Gibt (erfolgreiche Weiterleitungen, entfernte Peers) zurueck.
    fn weiterleiten(
        &self,
        daten: &[u8],
        absender: ClientEndpoint,
        sender: &dyn PaketSender,
    ) -> (usize, usize) {
        // Schnappschuss der Schluessel: kein Shard-Lock waehrend des Sendens
        let ziele: Vec<ClientEndpoint> = self
            .inner
            .clients
            .iter()
            .map(|e| *e.key())
            .filter(|k| *k != absender)
            .collect();

        let mut weitergeleitet = 0usize;
        let mut entfernt = 0usize;

        for ziel in ziele {
            // Kann seit dem Schnappschuss entfernt worden sein
            if !self.inner.clients.contains_key(&ziel) {
                continue;
            }

            match sender.senden(daten, ziel.addr()) {
                Ok(()) => weitergeleitet += 1,
                Err(e) if e.ist_peer_fehler() => {
                    self.inner.clients.remove(&ziel);
                    entfernt += 1;
                    tracing::warn!(ziel = %ziel, fehler = %e, "Weiterleitung fehlgeschlagen, Client entfernt");
                }
                Err(e) => {
                    tracing::debug!(ziel = %ziel, fehler = %e, "Paket verworfen");
                }
            }
        }

        (weitergeleitet, entfernt)
    }
}

impl Default for RelayRegistry {
    fn default() -> Self {
        Self::neu(RegistryConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::net::{IpAddr, Ipv4Addr};

    fn endpunkt(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    /// Zeichnet gesendete Datagramme auf, statt sie zu versenden
    #[derive(Default)]
    struct Rekorder {
        gesendet: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
        defekt: Mutex<HashSet<SocketAddr>>,
    }

    impl Rekorder {
        fn defekt_setzen(&self, ziel: SocketAddr) {
            self.defekt.lock().insert(ziel);
        }

        fn an(&self, ziel: SocketAddr) -> Vec<Vec<u8>> {
            self.gesendet
                .lock()
                .iter()
                .filter(|(_, z)| *z == ziel)
                .map(|(d, _)| d.clone())
                .collect()
        }
    }

    impl PaketSender for Rekorder {
        fn senden(&self, daten: &[u8], ziel: SocketAddr) -> Result<(), VoiceError> {
            if self.defekt.lock().contains(&ziel) {
                return Err(VoiceError::Senden {
                    ziel,
                    quelle: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                });
            }
            self.gesendet.lock().push((daten.to_vec(), ziel));
            Ok(())
        }
    }

    #[test]
    fn erstes_voice_paket_macht_client_aktiv() {
        let registry = RelayRegistry::default();
        let rekorder = Rekorder::default();
        let e = endpunkt(30001);

        let v = registry.paket_empfangen(&[0x02, 1], e, &rekorder).unwrap();
        assert!(registry.ist_aktiv(&e.into()));
        assert_eq!(registry.aktive_clients(), vec![ClientEndpoint::from(e)]);
        assert_eq!(
            v,
            Verarbeitung::Weitergeleitet {
                empfaenger: 0,
                entfernt: 0
            }
        );

        registry.paket_empfangen(&[0x01], e, &rekorder).unwrap();
        assert!(!registry.ist_aktiv(&e.into()), "Disconnect muss entfernen");
    }

    #[test]
    fn voice_wird_wortgetreu_an_alle_anderen_weitergeleitet() {
        let registry = RelayRegistry::default();
        let rekorder = Rekorder::default();
        let (a, b, c) = (endpunkt(30011), endpunkt(30012), endpunkt(30013));

        registry.paket_empfangen(&[0x03], b, &rekorder).unwrap();
        registry.paket_empfangen(&[0x03], c, &rekorder).unwrap();

        let paket = [0x02, b'a', b'b', b'c'];
        let v = registry.paket_empfangen(&paket, a, &rekorder).unwrap();

        assert_eq!(
            v,
            Verarbeitung::Weitergeleitet {
                empfaenger: 2,
                entfernt: 0
            }
        );
        assert_eq!(rekorder.an(b), vec![paket.to_vec()]);
        assert_eq!(rekorder.an(c), vec![paket.to_vec()]);
        assert!(rekorder.an(a).is_empty(), "Absender darf kein Echo empfangen");
    }

    #[test]
    fn sendefehler_entfernt_nur_den_betroffenen_peer() {
        let registry = RelayRegistry::default();
        let rekorder = Rekorder::default();
        let (a, b, c) = (endpunkt(30021), endpunkt(30022), endpunkt(30023));

        for e in [b, c] {
            registry.paket_empfangen(&[0x03], e, &rekorder).unwrap();
        }
        rekorder.defekt_setzen(b);

        let v = registry.paket_empfangen(&[0x02, 7], a, &rekorder).unwrap();
        assert_eq!(
            v,
            Verarbeitung::Weitergeleitet {
                empfaenger: 1,
                entfernt: 1
            }
        );
        assert!(!registry.ist_aktiv(&b.into()));
        assert!(registry.ist_aktiv(&c.into()));
        assert_eq!(rekorder.an(c), vec![vec![0x02, 7]]);
    }

    #[test]
    fn unbekanntes_tag_frischt_nur_auf() {
        let registry = RelayRegistry::default();
        let rekorder = Rekorder::default();
        let (a, b) = (endpunkt(30031), endpunkt(30032));

        registry.paket_empfangen(&[0x03], b, &rekorder).unwrap();
        let v = registry.paket_empfangen(b"127.0.0.1:30031", a, &rekorder).unwrap();

        assert_eq!(v, Verarbeitung::Aufgefrischt);
        assert!(registry.ist_aktiv(&a.into()));
        assert!(rekorder.an(b).is_empty(), "Nur Voice wird weitergeleitet");
    }

    #[test]
    fn leeres_datagramm_wird_ignoriert() {
        let registry = RelayRegistry::default();
        let rekorder = Rekorder::default();
        let e = endpunkt(30041);

        let result = registry.paket_empfangen(&[], e, &rekorder);
        assert!(result.is_err());
        assert_eq!(registry.anzahl(), 0, "Leeres Datagramm registriert nicht");
    }

    #[test]
    fn entfernter_client_wird_wieder_aufgenommen() {
        let registry = RelayRegistry::default();
        let rekorder = Rekorder::default();
        let e = endpunkt(30051);

        registry.paket_empfangen(&[0x03], e, &rekorder).unwrap();
        registry.paket_empfangen(&[0x01], e, &rekorder).unwrap();
        assert!(!registry.ist_aktiv(&e.into()));

        registry.paket_empfangen(&[0x02, 1], e, &rekorder).unwrap();
        assert!(registry.ist_aktiv(&e.into()));
    }

    #[test]
    fn sweep_pingt_nur_veraltete_clients() {
        let registry = RelayRegistry::default();
        let rekorder = Rekorder::default();
        let (d, e) = (endpunkt(30061), endpunkt(30062));
        let t0 = Instant::now();

        // D zuletzt vor 20 s gesehen, E vor 5 s
        registry.paket_empfangen_zu(&[0x03], d, &rekorder, t0).unwrap();
        registry
            .paket_empfangen_zu(&[0x03], e, &rekorder, t0 + Duration::from_secs(15))
            .unwrap();

        let ergebnis = registry.sweep_zu(&rekorder, t0 + Duration::from_secs(20));

        assert_eq!(ergebnis.angepingt, vec![ClientEndpoint::from(d)]);
        assert_eq!(rekorder.an(d), vec![vec![0x03]]);
        assert!(rekorder.an(e).is_empty());
        // Stille allein entfernt nicht
        assert!(registry.ist_aktiv(&d.into()));
    }

    #[test]
    fn sweep_entfernt_bei_sendefehler() {
        let registry = RelayRegistry::default();
        let rekorder = Rekorder::default();
        let d = endpunkt(30071);
        let t0 = Instant::now();

        registry.paket_empfangen_zu(&[0x03], d, &rekorder, t0).unwrap();
        rekorder.defekt_setzen(d);

        let ergebnis = registry.sweep_zu(&rekorder, t0 + Duration::from_secs(20));
        assert_eq!(ergebnis.entfernt_sendefehler, vec![ClientEndpoint::from(d)]);
        assert_eq!(registry.anzahl(), 0);
    }

    #[test]
    fn sweep_mit_stille_entfernung() {
        let registry = RelayRegistry::neu(RegistryConfig {
            veraltet_nach: Duration::from_secs(15),
            stille_entfernen_nach: Some(Duration::from_secs(60)),
        });
        let rekorder = Rekorder::default();
        let (alt, veraltet) = (endpunkt(30081), endpunkt(30082));
        let t0 = Instant::now();

        registry.paket_empfangen_zu(&[0x03], alt, &rekorder, t0).unwrap();
        registry
            .paket_empfangen_zu(&[0x03], veraltet, &rekorder, t0 + Duration::from_secs(50))
            .unwrap();

        let ergebnis = registry.sweep_zu(&rekorder, t0 + Duration::from_secs(70));

        assert_eq!(ergebnis.entfernt_stille, vec![ClientEndpoint::from(alt)]);
        assert_eq!(ergebnis.angepingt, vec![ClientEndpoint::from(veraltet)]);
        assert!(rekorder.an(alt).is_empty());
    }

    #[test]
    fn clone_teilt_zustand() {
        let registry1 = RelayRegistry::default();
        let registry2 = registry1.clone();
        let rekorder = Rekorder::default();

        registry1
            .paket_empfangen(&[0x03], endpunkt(30091), &rekorder)
            .unwrap();
        assert_eq!(registry2.anzahl(), 1);
    }
}
