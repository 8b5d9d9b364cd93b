//! sprechfunk – Bibliotheks-Root
//!
//! Deklariert die Module des Binaries und stellt den Einstiegspunkt fuer
//! beide Betriebsmodi bereit.

pub mod args;
pub mod config;
pub mod connect;
pub mod eingabe;
pub mod host;

use anyhow::Result;
use args::Modus;
use config::SprechfunkConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Fuehrt den gewaehlten Modus bis zum Shutdown aus
pub async fn ausfuehren(config: SprechfunkConfig, modus: Modus) -> Result<()> {
    match modus {
        Modus::Host(args) => host::starten(config, args).await,
        Modus::Connect(args) => connect::starten(config, args).await,
    }
}

/// Wartet auf Ctrl-C oder eine Zeile auf stdin
///
/// Ist stdin geschlossen (z. B. als Dienst), zaehlt nur noch Ctrl-C.
pub async fn auf_beenden_warten() -> Result<()> {
    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
    let enter = async {
        match zeilen.next_line().await {
            Ok(Some(_)) => {}
            _ => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutdown-Signal empfangen");
        }
        _ = enter => {
            tracing::info!("Enter gedrueckt, wird beendet");
        }
    }
    Ok(())
}
