//! Connect-Modus: Client mit Mikrofon und Lautsprecher

use crate::args::ConnectArgs;
use crate::config::SprechfunkConfig;
use crate::eingabe::{pflichtwert, server_adresse_aufloesen};
use anyhow::Result;
use sprechfunk_audio::{AudioEngine, FrameSenke, JitterBuffer, OpusDecoder, OpusEncoder};
use sprechfunk_client::{ClientSession, Transport};
use sprechfunk_voice::UdpKanal;
use std::sync::Arc;

/// Verbindet sich mit dem Relay und laeuft bis Ctrl-C oder Enter
///
/// Socket, Codecs und Audio-Geraete werden vollstaendig geoeffnet, bevor
/// das erste Paket das Netz verlaesst.
pub async fn starten(config: SprechfunkConfig, args: ConnectArgs) -> Result<()> {
    let (username, server_text) = {
        let stdin = std::io::stdin();
        let mut eingabe = stdin.lock();
        let mut ausgabe = std::io::stdout();
        let username = pflichtwert(
            args.username,
            "Benutzername: ",
            "Benutzername",
            &mut eingabe,
            &mut ausgabe,
        )?;
        let server = pflichtwert(
            args.server,
            "Server-Adresse: ",
            "Server-Adresse",
            &mut eingabe,
            &mut ausgabe,
        )?;
        (username, server)
    };

    let server = server_adresse_aufloesen(&server_text, config.netzwerk.relay_port)?;

    let kanal = Arc::new(UdpKanal::oeffnen(SprechfunkConfig::client_bind_adresse(server))?);
    let jitter = Arc::new(JitterBuffer::mit_dauer(config.jitter_dauer()));

    let session = Arc::new(ClientSession::neu(
        server,
        Arc::clone(&kanal) as Arc<dyn Transport>,
        Box::new(OpusEncoder::neu()?),
        Box::new(OpusDecoder::neu()?),
        Arc::clone(&jitter),
    ));

    // Capture-Callback haelt die Session nur schwach
    let schwach = Arc::downgrade(&session);
    let senke: FrameSenke = Box::new(move |frame| {
        if let Some(session) = schwach.upgrade() {
            match session.frame_senden(frame) {
                Ok(()) => {}
                Err(e) if e.ist_transient() => {
                    tracing::trace!(fehler = %e, "Frame verworfen");
                }
                // Nach dem Beenden liefert die Aufnahme noch Frames nach
                Err(e) => tracing::debug!(fehler = %e, "Frame nicht gesendet"),
            }
        }
    });

    let engine = AudioEngine::starten(config.audio_engine_config(), senke, jitter)?;
    session.capture_stopp_registrieren(Box::new(engine.capture_stopper()));

    session.empfang_starten(&kanal)?;

    tracing::info!(
        username = %username,
        server = %server,
        lokal = %kanal.lokale_adresse(),
        "Verbunden. Enter oder Ctrl-C beendet."
    );

    crate::auf_beenden_warten().await?;

    session.beenden();
    engine.beenden();
    kanal.empfang_abwarten().await;

    let j = session.jitter_buffer().statistik();
    tracing::info!(
        geleert = j.geleert,
        verworfen = j.verworfen,
        unterlauf_bytes = j.unterlauf_bytes,
        "Jitter Buffer"
    );
    Ok(())
}
