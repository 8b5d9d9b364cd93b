//! Host-Modus: Relay-Server

use crate::args::HostArgs;
use crate::config::SprechfunkConfig;
use anyhow::Result;
use sprechfunk_voice::RelayServer;

/// Startet den Relay und laeuft bis Ctrl-C oder Enter
///
/// Reihenfolge:
/// 1. UDP-Socket binden (Fehler ist fatal)
/// 2. Empfangs-Loop und Sweep-Task starten
/// 3. Auf Shutdown warten, dann Relay beenden
pub async fn starten(config: SprechfunkConfig, args: HostArgs) -> Result<()> {
    let port = args.port.unwrap_or(config.netzwerk.relay_port);
    let bind_addr = config.relay_bind_adresse(port)?;

    let relay = RelayServer::binden(config.relay_config(bind_addr))?;
    relay.starten()?;

    tracing::info!(
        adresse = %relay.lokale_adresse(),
        sweep_intervall_s = config.relay.sweep_intervall_s,
        veraltet_nach_s = config.relay.veraltet_nach_s,
        "Relay laeuft. Enter oder Ctrl-C beendet."
    );

    crate::auf_beenden_warten().await?;

    relay.beenden();
    relay.abwarten().await;
    Ok(())
}
