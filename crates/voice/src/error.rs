//! Fehlertypen fuer Transport und Relay

use sprechfunk_core::SprechfunkError;
use std::net::SocketAddr;
use thiserror::Error;

/// Fehler des UDP-Transports und der Relay-Registry
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("UDP-Socket konnte nicht gebunden werden ({adresse}): {quelle}")]
    Bind {
        adresse: SocketAddr,
        #[source]
        quelle: std::io::Error,
    },

    #[error("Senden an {ziel} fehlgeschlagen: {quelle}")]
    Senden {
        ziel: SocketAddr,
        #[source]
        quelle: std::io::Error,
    },

    #[error("Sendepuffer voll, Paket an {ziel} verworfen")]
    Ueberlastet { ziel: SocketAddr },

    #[error("Kanal geschlossen")]
    Geschlossen,

    #[error("Empfangs-Loop laeuft bereits")]
    EmpfangLaeuftBereits,

    #[error("Keine Tokio-Laufzeit verfuegbar")]
    KeineLaufzeit,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protokoll(#[from] SprechfunkError),
}

impl VoiceError {
    /// Gibt true zurueck wenn der Fehler den Ziel-Peer betrifft
    ///
    /// Nur solche Fehler fuehren im Relay zur Entfernung des Peers. Ein voller
    /// lokaler Sendepuffer oder ein geschlossener Kanal sagt nichts ueber den
    /// Peer aus.
    pub fn ist_peer_fehler(&self) -> bool {
        matches!(self, Self::Senden { .. })
    }
}

impl From<VoiceError> for SprechfunkError {
    fn from(e: VoiceError) -> Self {
        match e {
            VoiceError::Bind { adresse, quelle } => SprechfunkError::Bind { adresse, quelle },
            VoiceError::Senden { ziel, quelle } => SprechfunkError::Senden {
                ziel,
                grund: quelle.to_string(),
            },
            VoiceError::Ueberlastet { ziel } => SprechfunkError::Senden {
                ziel,
                grund: "Sendepuffer voll".into(),
            },
            VoiceError::Geschlossen => SprechfunkError::Geschlossen,
            VoiceError::Protokoll(inner) => inner,
            andere => SprechfunkError::Anyhow(anyhow::Error::new(andere)),
        }
    }
}
