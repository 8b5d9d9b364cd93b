//! Kommandozeilen-Argumente

use clap::{Args, Parser, Subcommand};

/// Sprechfunk – Voice-Chat ueber einen UDP-Relay
///
/// Ohne Unterkommando wird der Modus interaktiv abgefragt.
#[derive(Parser, Debug)]
#[command(name = "sprechfunk", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub modus: Option<Modus>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Modus {
    /// Relay-Server starten
    Host(HostArgs),
    /// Mit einem Relay verbinden
    Connect(ConnectArgs),
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct HostArgs {
    /// UDP-Port (ueberschreibt netzwerk.relay_port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectArgs {
    /// Anzeigename (wird sonst abgefragt)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Relay-Adresse: IP, IP:Port oder Hostname (wird sonst abgefragt)
    #[arg(short, long)]
    pub server: Option<String>,
}
