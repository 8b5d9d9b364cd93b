//! sprechfunk-core – Gemeinsame Typen, Konstanten und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Relay-Server und Client
//! gemeinsam nutzen: das Frame-Format, die Endpunkt-Identitaet und die
//! Fehler-Taxonomie der Pipeline.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, SprechfunkError};
pub use types::{ClientEndpoint, BYTES_PRO_MS, FRAME_BYTES, FRAME_SAMPLES, SAMPLE_RATE};
