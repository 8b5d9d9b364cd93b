//! Gemeinsame Typen und Audio-Konstanten
//!
//! Das Frame-Format ist fest: 20 ms Mono-PCM (16 Bit, little-endian) bei
//! 48 kHz. Jeder Puffer anderer Laenge wird von der Pipeline verworfen.

use std::fmt;
use std::net::SocketAddr;

/// Abtastrate in Hz
pub const SAMPLE_RATE: u32 = 48_000;

/// Samples pro Frame (20 ms bei 48 kHz)
pub const FRAME_SAMPLES: usize = 960;

/// Bytes pro Frame (16 Bit Mono)
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

/// Bytes pro Millisekunde Audio (48 Samples * 2 Bytes)
pub const BYTES_PRO_MS: usize = (SAMPLE_RATE as usize / 1000) * 2;

/// Eindeutige Identitaet eines Session-Peers (IP + Port)
///
/// Gleichheit gilt ueber Adresse und Port, wie bei `SocketAddr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientEndpoint(pub SocketAddr);

impl ClientEndpoint {
    /// Gibt die Socket-Adresse zurueck
    pub fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for ClientEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl fmt::Display for ClientEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
