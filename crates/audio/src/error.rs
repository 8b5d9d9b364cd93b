//! Fehlertypen fuer Audio-Geraete, Codec und Jitter Buffer

use sprechfunk_core::SprechfunkError;
use thiserror::Error;

/// Alle moeglichen Fehler des Audio-Crates
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Ungueltige Frame-Groesse: erwartet {erwartet} Bytes, erhalten {erhalten}")]
    UngueltigeFrameGroesse { erwartet: usize, erhalten: usize },

    #[error("Audio-Thread nicht mehr erreichbar")]
    ThreadBeendet,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;

impl From<AudioError> for SprechfunkError {
    fn from(e: AudioError) -> Self {
        match e {
            AudioError::CodecFehler(grund) => SprechfunkError::Codec(grund),
            AudioError::UngueltigeFrameGroesse { erwartet, erhalten } => {
                SprechfunkError::InvalidFrameSize { erwartet, erhalten }
            }
            AudioError::Anyhow(inner) => SprechfunkError::Anyhow(inner),
            andere => SprechfunkError::Audio(andere.to_string()),
        }
    }
}
