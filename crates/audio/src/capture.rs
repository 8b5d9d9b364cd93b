//! Mikrofon-Capture via cpal
//!
//! Der cpal-Callback liefert Puffer beliebiger Groesse. Der `FrameAssembler`
//! schneidet daraus 20-ms-Frames (960 Samples, i16 little-endian) und
//! uebergibt jeden vollstaendigen Frame an die registrierte Senke. Die
//! Senke laeuft im Geraete-Thread und darf nicht blockieren.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use sprechfunk_core::{FRAME_BYTES, SAMPLE_RATE};
use tracing::{debug, error};

use crate::error::{AudioError, AudioResult};

/// Empfaenger fertiger Frames (laeuft im cpal-Callback-Thread)
pub type FrameSenke = Box<dyn FnMut(&[u8]) + Send + 'static>;

// ---------------------------------------------------------------------------
// FrameAssembler
// ---------------------------------------------------------------------------

/// Sammelt Geraete-Samples und gibt exakt `FRAME_BYTES` grosse Frames aus
///
/// Mehrkanal-Eingaben werden auf Mono gemittelt.
pub struct FrameAssembler {
    kanaele: usize,
    frame: Vec<u8>,
}

impl FrameAssembler {
    pub fn neu(kanaele: u16) -> Self {
        Self {
            kanaele: usize::from(kanaele.max(1)),
            frame: Vec::with_capacity(FRAME_BYTES),
        }
    }

    /// Verarbeitet i16-Samples (interleaved)
    pub fn i16_samples(&mut self, daten: &[i16], senke: &mut dyn FnMut(&[u8])) {
        let kanaele = self.kanaele;
        for block in daten.chunks_exact(kanaele) {
            let summe: i32 = block.iter().map(|&s| i32::from(s)).sum();
            self.sample(
                (summe / kanaele as i32) as i16,
                senke,
            );
        }
    }

    /// Verarbeitet f32-Samples (interleaved, -1.0..1.0)
    pub fn f32_samples(&mut self, daten: &[f32], senke: &mut dyn FnMut(&[u8])) {
        let kanaele = self.kanaele;
        for block in daten.chunks_exact(kanaele) {
            let mittel = block.iter().sum::<f32>() / kanaele as f32;
            let s = (mittel * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            self.sample(s, senke);
        }
    }

    /// Bytes des angefangenen Frames
    pub fn ausstehend(&self) -> usize {
        self.frame.len()
    }

    fn sample(&mut self, s: i16, senke: &mut dyn FnMut(&[u8])) {
        self.frame.extend_from_slice(&s.to_le_bytes());
        if self.frame.len() == FRAME_BYTES {
            senke(&self.frame);
            self.frame.clear();
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureStream
// ---------------------------------------------------------------------------

/// Audio-Capture-Stream
///
/// Haelt den cpal-Stream am Leben. Wird der CaptureStream gedroppt,
/// stoppt die Aufnahme automatisch.
pub struct CaptureStream {
    _stream: Stream,
    kanaele: u16,
}

impl CaptureStream {
    pub fn kanaele(&self) -> u16 {
        self.kanaele
    }
}

/// Oeffnet einen Capture-Stream mit 48 kHz auf dem gegebenen Geraet
///
/// Jeder vollstaendige Frame geht an `senke`.
pub fn open_capture_stream(device: &Device, mut senke: FrameSenke) -> AudioResult<CaptureStream> {
    // Mono bevorzugen, sonst das kleinste unterstuetzte Kanal-Layout
    let supported = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .filter(|c| {
            c.min_sample_rate().0 <= SAMPLE_RATE && c.max_sample_rate().0 >= SAMPLE_RATE
        })
        .min_by_key(|c| c.channels());

    let (kanaele, sample_format) = supported
        .map(|c| (c.channels(), c.sample_format()))
        .unwrap_or((1, SampleFormat::F32));

    let stream_config = StreamConfig {
        channels: kanaele,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = |err| error!("Capture-Fehler: {}", err);
    let mut assembler = FrameAssembler::neu(kanaele);

    let stream = match sample_format {
        SampleFormat::F32 => device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _| assembler.f32_samples(data, &mut senke),
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::I16 => device
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _| assembler.i16_samples(data, &mut senke),
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        _ => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {:?}",
                sample_format
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(
        "Capture-Stream geoeffnet: {}Hz {}ch {:?}",
        SAMPLE_RATE, kanaele, sample_format
    );

    Ok(CaptureStream {
        _stream: stream,
        kanaele,
    })
}
