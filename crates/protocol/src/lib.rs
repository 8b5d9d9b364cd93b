//! sprechfunk-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert das Paketformat, das zwischen Client und
//! Relay-Server per UDP ausgetauscht wird.

pub mod voice;

pub use voice::{PacketTag, VoicePacket, VoicePacketRef, MAX_DATAGRAM_GROESSE};
