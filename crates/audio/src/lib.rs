//! sprechfunk-audio – Audio-Seite des Clients
//!
//! - Mikrofon-Capture via cpal, zerlegt in feste 20-ms-Frames
//! - Lautsprecher-Playback via cpal aus dem Jitter Buffer
//! - Opus Encoding/Decoding hinter `FrameEncoder`/`FrameDecoder`
//! - Jitter Buffer mit begrenzter Latenz

pub mod capture;
pub mod codec;
pub mod device;
pub mod engine;
pub mod error;
pub mod jitter_buffer;
pub mod playback;

// Bequeme Re-Exporte der wichtigsten Typen
pub use capture::{FrameAssembler, FrameSenke};
pub use codec::{FrameDecoder, FrameEncoder, OpusDecoder, OpusEncoder};
pub use engine::{AudioEngine, AudioEngineConfig};
pub use error::{AudioError, AudioResult};
pub use jitter_buffer::{JitterBuffer, JitterStatistik, PushErgebnis};
