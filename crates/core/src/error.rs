//! Fehlertypen fuer Sprechfunk
//!
//! Zentraler Fehler-Enum der Echtzeit-Pipeline. Untercrates definieren eigene
//! Fehler (`VoiceError`, `AudioError`) und konvertieren via `From` hierher.
//!
//! Nur `Bind` und `Audio` sind beim Start fatal. Alle anderen Varianten
//! betreffen genau ein Paket oder einen Frame, der verworfen wird.

use std::net::SocketAddr;
use thiserror::Error;

/// Globaler Result-Alias fuer Sprechfunk
pub type Result<T> = std::result::Result<T, SprechfunkError>;

/// Alle moeglichen Fehler im Sprechfunk-System
#[derive(Debug, Error)]
pub enum SprechfunkError {
    // --- Ressourcen (fatal beim Start) ---
    #[error("UDP-Socket konnte nicht gebunden werden ({adresse}): {quelle}")]
    Bind {
        adresse: SocketAddr,
        #[source]
        quelle: std::io::Error,
    },

    #[error("Audiofehler: {0}")]
    Audio(String),

    // --- Pro Paket / pro Frame ---
    #[error("Ungueltiges Paket: {0}")]
    MalformedPacket(String),

    #[error("Codec-Fehler: {0}")]
    Codec(String),

    #[error("Ungueltige Frame-Groesse: {erhalten} Bytes (erwartet {erwartet})")]
    InvalidFrameSize { erwartet: usize, erhalten: usize },

    #[error("Senden an {ziel} fehlgeschlagen: {grund}")]
    Senden { ziel: SocketAddr, grund: String },

    // --- Lebenszyklus ---
    #[error("Kanal geschlossen")]
    Geschlossen,

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl SprechfunkError {
    /// Gibt true zurueck wenn der Fehler nur ein einzelnes Paket oder einen
    /// Frame betrifft und die Pipeline weiterlaufen soll
    pub fn ist_transient(&self) -> bool {
        matches!(
            self,
            Self::MalformedPacket(_)
                | Self::Codec(_)
                | Self::InvalidFrameSize { .. }
                | Self::Senden { .. }
        )
    }
}
