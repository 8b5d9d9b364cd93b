//! Sprechfunk – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet Relay
//! oder Client.

use anyhow::Result;
use clap::Parser;
use sprechfunk::{
    args::Cli,
    config::{LoggingEinstellungen, SprechfunkConfig},
    eingabe::modus_abfragen,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad =
        std::env::var("SPRECHFUNK_CONFIG").unwrap_or_else(|_| "sprechfunk.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = SprechfunkConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Sprechfunk wird initialisiert"
    );

    let modus = match cli.modus {
        Some(modus) => modus,
        None => modus_abfragen(&mut std::io::stdin().lock(), &mut std::io::stdout())?,
    };

    sprechfunk::ausfuehren(config, modus).await
}

/// Initialisiert tracing-subscriber; `RUST_LOG` hat Vorrang vor der Datei
///
/// Thread-Namen sind immer an, damit Meldungen aus dem Audio-Thread und den
/// cpal-Callbacks von denen der Tokio-Worker unterscheidbar bleiben.
fn logging_initialisieren(logging: &LoggingEinstellungen) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true);

    if logging.format == "json" {
        builder
            .json()
            .with_current_span(false)
            .init();
    } else {
        builder
            .compact()
            .init();
    }
}
