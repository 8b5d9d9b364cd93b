//! sprechfunk-voice – UDP-Transport und Relay
//!
//! Der Relay leitet Voice-Pakete ohne sie zu dekodieren an alle anderen
//! bekannten Clients weiter (kein Mixing, keine Raeume).
//!
//! ## Module
//! - [`udp`] – UDP-Kanal mit Empfangs-Task und nicht-blockierendem Senden
//! - [`registry`] – Anwesenheitstabelle, Fan-out und Keepalive-Sweep
//! - [`relay`] – Relay-Server: Kanal + Registry + periodischer Sweep
//! - [`error`] – Fehlertypen

pub mod error;
pub mod registry;
pub mod relay;
pub mod udp;

pub use error::VoiceError;
pub use registry::{RegistryConfig, RelayRegistry, SweepErgebnis, Verarbeitung};
pub use relay::{RelayConfig, RelayServer};
pub use udp::{PaketSender, UdpKanal};
