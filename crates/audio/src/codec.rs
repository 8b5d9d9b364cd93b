//! Opus Encoder/Decoder hinter schmalen Frame-Traits
//!
//! Die Session kennt nur `FrameEncoder`/`FrameDecoder` und arbeitet auf
//! rohen PCM-Bytes (i16 little-endian, Mono). Die Opus-Implementierung
//! kapselt audiopus mit fester Konfiguration: 48 kHz, Mono, 20 ms, VOIP.

use audiopus::{
    coder::{Decoder, Encoder},
    Application, Channels, SampleRate,
};
use sprechfunk_core::{FRAME_BYTES, FRAME_SAMPLES};
use tracing::debug;

use crate::error::{AudioError, AudioResult};

/// Obergrenze fuer ein kodiertes Opus-Paket
pub const MAX_OPUS_PAKET: usize = 4000;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Kodiert genau einen PCM-Frame zu einem komprimierten Paket
pub trait FrameEncoder: Send {
    fn encode(&mut self, pcm: &[u8]) -> AudioResult<Vec<u8>>;
}

/// Dekodiert ein komprimiertes Paket zu PCM-Bytes
///
/// Die Laenge des Ergebnisses ist nicht garantiert; der Aufrufer prueft sie.
pub trait FrameDecoder: Send {
    fn decode(&mut self, paket: &[u8]) -> AudioResult<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// OpusEncoder
// ---------------------------------------------------------------------------

/// Opus-Encoder: kodiert i16-PCM-Frames zu Opus-Bytes
pub struct OpusEncoder {
    encoder: Encoder,
    samples: Vec<i16>,
}

impl OpusEncoder {
    /// Erstellt einen Encoder fuer 48 kHz Mono Sprache
    pub fn neu() -> AudioResult<Self> {
        let encoder = Encoder::new(SampleRate::Hz48000, Channels::Mono, Application::Voip)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        debug!(frame_samples = FRAME_SAMPLES, "OpusEncoder erstellt");

        Ok(Self {
            encoder,
            samples: Vec::with_capacity(FRAME_SAMPLES),
        })
    }
}

impl FrameEncoder for OpusEncoder {
    /// Die Eingabe muss exakt `FRAME_BYTES` lang sein
    fn encode(&mut self, pcm: &[u8]) -> AudioResult<Vec<u8>> {
        if pcm.len() != FRAME_BYTES {
            return Err(AudioError::UngueltigeFrameGroesse {
                erwartet: FRAME_BYTES,
                erhalten: pcm.len(),
            });
        }

        self.samples.clear();
        self.samples.extend(
            pcm.chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]])),
        );

        let mut output = vec![0u8; MAX_OPUS_PAKET];
        let geschrieben = self
            .encoder
            .encode(&self.samples, &mut output)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        output.truncate(geschrieben);
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// OpusDecoder
// ---------------------------------------------------------------------------

/// Opus-Decoder: dekodiert Opus-Bytes zu i16-PCM-Bytes
pub struct OpusDecoder {
    decoder: Decoder,
    samples: Vec<i16>,
}

impl OpusDecoder {
    pub fn neu() -> AudioResult<Self> {
        let decoder = Decoder::new(SampleRate::Hz48000, Channels::Mono)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        debug!(frame_samples = FRAME_SAMPLES, "OpusDecoder erstellt");

        Ok(Self {
            decoder,
            samples: vec![0i16; FRAME_SAMPLES],
        })
    }
}

impl FrameDecoder for OpusDecoder {
    fn decode(&mut self, paket: &[u8]) -> AudioResult<Vec<u8>> {
        if paket.is_empty() {
            return Err(AudioError::CodecFehler("leeres Opus-Paket".into()));
        }

        self.samples.resize(FRAME_SAMPLES, 0);
        let dekodiert = self
            .decoder
            .decode(Some(paket), &mut self.samples, false)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        Ok(self.samples[..dekodiert]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect())
    }
}
