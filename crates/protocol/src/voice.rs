//! Voice-Protokoll (UDP)
//!
//! Definiert die binaere Paketstruktur zwischen Client und Relay. Ein
//! UDP-Datagramm ist genau ein Paket: es gibt keinen Laengen-Prefix, keine
//! Sequenznummer und keine Pruefsumme ausser der von UDP selbst.
//!
//! ## Paketformat
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   Tag (0x01 = Disconnect, 0x02 = Voice, 0x03 = Keepalive)
//!  1+      N   Nutzdaten (nur bei Voice: Opus-Bytes, sonst leer)
//! ```

use sprechfunk_core::{Result, SprechfunkError};

/// Groesse des Empfangspuffers: das groesste UDP-Datagramm passt vollstaendig
pub const MAX_DATAGRAM_GROESSE: usize = 65_535;

// ---------------------------------------------------------------------------
// PacketTag
// ---------------------------------------------------------------------------

/// Art des Paketes (erstes Byte des Datagramms)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketTag {
    /// Client verlaesst die Session (leere Nutzdaten)
    Disconnect,
    /// Opus-kodierter Audio-Frame
    Voice,
    /// Lebenszeichen-Anfrage (leere Nutzdaten)
    Keepalive,
    /// Unbekanntes Tag – wird von allen Empfaengern ignoriert
    Unknown(u8),
}

impl PacketTag {
    pub const DISCONNECT: u8 = 0x01;
    pub const VOICE: u8 = 0x02;
    pub const KEEPALIVE: u8 = 0x03;

    /// Konvertiert ein Byte in ein `PacketTag`.
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            Self::DISCONNECT => Self::Disconnect,
            Self::VOICE => Self::Voice,
            Self::KEEPALIVE => Self::Keepalive,
            anderes => Self::Unknown(anderes),
        }
    }

    /// Gibt das Wire-Byte zurueck
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Disconnect => Self::DISCONNECT,
            Self::Voice => Self::VOICE,
            Self::Keepalive => Self::KEEPALIVE,
            Self::Unknown(byte) => byte,
        }
    }
}

// ---------------------------------------------------------------------------
// VoicePacketRef
// ---------------------------------------------------------------------------

/// Geliehene Sicht auf ein empfangenes Datagramm (kein Kopieren im Hot Path)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoicePacketRef<'a> {
    pub tag: PacketTag,
    pub payload: &'a [u8],
}

impl<'a> VoicePacketRef<'a> {
    /// Zerlegt ein Datagramm in Tag und Nutzdaten
    ///
    /// # Fehler
    /// - `MalformedPacket` wenn das Datagramm leer ist
    pub fn decode(buf: &'a [u8]) -> Result<Self> {
        let (&tag, payload) = buf
            .split_first()
            .ok_or_else(|| SprechfunkError::MalformedPacket("leeres Datagramm".into()))?;

        Ok(Self {
            tag: PacketTag::from_u8(tag),
            payload,
        })
    }

    /// Kopiert die Nutzdaten in ein eigenstaendiges Paket
    pub fn zu_paket(&self) -> VoicePacket {
        VoicePacket {
            tag: self.tag,
            payload: self.payload.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// VoicePacket
// ---------------------------------------------------------------------------

/// Vollstaendiges Paket (Tag + Nutzdaten)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePacket {
    pub tag: PacketTag,
    pub payload: Vec<u8>,
}

impl VoicePacket {
    /// Erstellt ein Voice-Paket mit Opus-Nutzdaten
    pub fn voice(payload: Vec<u8>) -> Self {
        Self {
            tag: PacketTag::Voice,
            payload,
        }
    }

    /// Erstellt ein Disconnect-Paket
    pub fn disconnect() -> Self {
        Self {
            tag: PacketTag::Disconnect,
            payload: Vec::new(),
        }
    }

    /// Erstellt ein Keepalive-Paket
    pub fn keepalive() -> Self {
        Self {
            tag: PacketTag::Keepalive,
            payload: Vec::new(),
        }
    }

    /// Serialisiert Tag und Nutzdaten in ein Datagramm
    pub fn encode_teile(tag: PacketTag, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + payload.len());
        buf.push(tag.as_u8());
        buf.extend_from_slice(payload);
        buf
    }

    /// Serialisiert das gesamte Paket in einen Byte-Vec
    pub fn encode(&self) -> Vec<u8> {
        Self::encode_teile(self.tag, &self.payload)
    }

    /// Deserialisiert ein Paket aus einem Datagramm
    ///
    /// # Fehler
    /// - `MalformedPacket` wenn das Datagramm leer ist
    pub fn decode(buf: &[u8]) -> Result<Self> {
        VoicePacketRef::decode(buf).map(|p| p.zu_paket())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
