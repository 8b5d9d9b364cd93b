//! Audio-Playback via cpal
//!
//! Der Output-Callback zieht PCM-Bytes im eigenen Takt aus dem
//! `JitterBuffer`. Fehlende Samples werden mit Stille aufgefuellt.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use sprechfunk_core::SAMPLE_RATE;
use std::sync::Arc;
use tracing::{debug, error, trace};

use crate::error::{AudioError, AudioResult};
use crate::jitter_buffer::JitterBuffer;

/// Liest Mono-Samples aus dem Jitter Buffer und verteilt sie auf alle Kanaele
struct PufferLeser {
    puffer: Arc<JitterBuffer>,
    kanaele: usize,
    bytes: Vec<u8>,
}

impl PufferLeser {
    fn neu(puffer: Arc<JitterBuffer>, kanaele: u16) -> Self {
        Self {
            puffer,
            kanaele: usize::from(kanaele.max(1)),
            bytes: Vec::new(),
        }
    }

    /// Fuellt `data` (interleaved), gibt gelesene Mono-Samples zurueck
    fn lesen<T: Copy>(&mut self, data: &mut [T], stille: T, umwandeln: impl Fn(i16) -> T) -> usize {
        let frames = data.len() / self.kanaele;
        self.bytes.resize(frames * 2, 0);
        let gelesen = self.puffer.pull(&mut self.bytes) / 2;

        for (i, block) in data.chunks_mut(self.kanaele).enumerate() {
            let wert = if i < gelesen {
                umwandeln(i16::from_le_bytes([self.bytes[2 * i], self.bytes[2 * i + 1]]))
            } else {
                stille
            };
            block.fill(wert);
        }

        if gelesen < frames {
            trace!("Playback Underrun: {} Samples fehlen", frames - gelesen);
        }
        gelesen
    }
}

/// Audio-Playback-Stream
pub struct PlaybackStream {
    _stream: Stream,
    kanaele: u16,
}

impl PlaybackStream {
    pub fn kanaele(&self) -> u16 {
        self.kanaele
    }
}

/// Oeffnet einen Playback-Stream mit 48 kHz, der aus `puffer` liest
pub fn open_playback_stream(device: &Device, puffer: Arc<JitterBuffer>) -> AudioResult<PlaybackStream> {
    let supported = device
        .supported_output_configs()
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

    let err_fn = |err| error!("Playback-Fehler: {}", err);
    let mut leser = PufferLeser::neu(puffer, kanaele);

    let stream = match sample_format {
        SampleFormat::F32 => device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| {
                    leser.lesen(data, 0.0, |s| s as f32 / i16::MAX as f32);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::I16 => device
            .build_output_stream(
                &stream_config,
                move |data: &mut [i16], _| {
                    leser.lesen(data, 0, |s| s);
                },
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
        "Playback-Stream geoeffnet: {}Hz {}ch {:?}",
        SAMPLE_RATE, kanaele, sample_format
    );

    Ok(PlaybackStream {
        _stream: stream,
        kanaele,
    })
}
