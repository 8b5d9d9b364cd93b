//! sprechfunk-client – Client-Pipeline
//!
//! Die [`session::ClientSession`] verbindet den Capture-Callback mit dem
//! Opus-Encoder und dem UDP-Kanal sowie den Empfangs-Task mit Decoder und
//! Jitter Buffer. Audio-Geraete werden vom Aufrufer geoeffnet und ueber
//! `frame_senden` bzw. den Jitter Buffer angebunden.

pub mod session;

pub use session::{CaptureStopp, ClientSession, Empfang, SessionStatistik, Transport};
