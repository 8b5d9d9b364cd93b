//! AudioEngine – Besitzt Capture- und Playback-Stream auf eigenem Thread
//!
//! cpal-Streams sind nicht `Send`. Sie werden deshalb auf einem dedizierten
//! Thread geoeffnet und leben dort, bis ein Kommando ueber crossbeam-channel
//! sie freigibt. Die Audio-Callbacks selbst laufen auf den Geraete-Threads
//! von cpal.

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info};

use crate::capture::{open_capture_stream, FrameSenke};
use crate::device::{ausgabegeraet_laden, eingabegeraet_laden};
use crate::error::{AudioError, AudioResult};
use crate::jitter_buffer::JitterBuffer;
use crate::playback::open_playback_stream;

/// Konfiguration der Audio-Engine
#[derive(Debug, Clone, Default)]
pub struct AudioEngineConfig {
    /// Name des Eingabegeraets (None = Standard)
    pub eingabegeraet: Option<String>,
    /// Name des Ausgabegeraets (None = Standard)
    pub ausgabegeraet: Option<String>,
}

/// Kommandos an den Audio-Thread
#[derive(Debug)]
pub enum AudioCommand {
    /// Capture-Stream freigeben, Playback laeuft weiter
    StopCapture,
    Shutdown,
}

/// Audio-Engine
///
/// Die Engine selbst ist kein async-Typ. Nach `starten()` laufen Capture
/// und Playback, bis `beenden()` aufgerufen oder die Engine gedroppt wird.
pub struct AudioEngine {
    cmd_tx: Sender<AudioCommand>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AudioEngine {
    /// Oeffnet beide Streams auf den konfigurierten Geraeten
    ///
    /// Jeder erfasste Frame geht an `senke`, der Playback liest aus `puffer`.
    /// Kehrt erst zurueck, wenn beide Streams laufen oder das Oeffnen
    /// fehlgeschlagen ist.
    pub fn starten(
        config: AudioEngineConfig,
        senke: FrameSenke,
        puffer: Arc<JitterBuffer>,
    ) -> AudioResult<Self> {
        Self::starten_mit(move || {
            let eingabe = eingabegeraet_laden(config.eingabegeraet.as_deref())?;
            let ausgabe = ausgabegeraet_laden(config.ausgabegeraet.as_deref())?;
            let capture = open_capture_stream(&eingabe, senke)?;
            let playback = open_playback_stream(&ausgabe, puffer)?;
            Ok((capture, playback))
        })
    }

    /// Startet den Audio-Thread mit beliebigem Stream-Oeffner
    ///
    /// Der Oeffner laeuft auf dem Audio-Thread; dort leben auch die
    /// zurueckgegebenen Streams.
    pub fn starten_mit<O, C, P>(oeffnen: O) -> AudioResult<Self>
    where
        O: FnOnce() -> AudioResult<(C, P)> + Send + 'static,
        C: 'static,
        P: 'static,
    {
        let (cmd_tx, cmd_rx) = bounded::<AudioCommand>(8);
        let (bereit_tx, bereit_rx) = bounded::<AudioResult<()>>(1);

        let thread = std::thread::Builder::new()
            .name("sprechfunk-audio".to_string())
            .spawn(move || match oeffnen() {
                Ok((capture, playback)) => {
                    let _ = bereit_tx.send(Ok(()));
                    audio_thread(cmd_rx, capture, playback);
                }
                Err(e) => {
                    let _ = bereit_tx.send(Err(e));
                }
            })?;

        match bereit_rx.recv() {
            Ok(Ok(())) => {
                info!("AudioEngine gestartet");
                Ok(Self {
                    cmd_tx,
                    thread: Mutex::new(Some(thread)),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::ThreadBeendet)
            }
        }
    }

    /// Gibt den Capture-Stream frei; es kommen keine Frames mehr
    pub fn capture_stoppen(&self) -> AudioResult<()> {
        self.send_cmd(AudioCommand::StopCapture)
    }

    /// Liefert eine Funktion, die den Capture-Stream aus jedem Thread stoppt
    pub fn capture_stopper(&self) -> impl Fn() + Send + Sync + 'static {
        let tx = self.cmd_tx.clone();
        move || {
            let _ = tx.send(AudioCommand::StopCapture);
        }
    }

    /// Stoppt beide Streams und wartet auf den Audio-Thread (idempotent)
    pub fn beenden(&self) {
        let thread = self.thread.lock().take();
        if let Some(thread) = thread {
            let _ = self.cmd_tx.send(AudioCommand::Shutdown);
            if thread.join().is_err() {
                error!("Audio-Thread ist abgestuerzt");
            }
            debug!("AudioEngine gestoppt");
        }
    }

    fn send_cmd(&self, cmd: AudioCommand) -> AudioResult<()> {
        self.cmd_tx.send(cmd).map_err(|_| AudioError::ThreadBeendet)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.beenden();
    }
}

/// Hintergrund-Thread: haelt die Streams bis zum Shutdown
fn audio_thread<C, P>(cmd_rx: Receiver<AudioCommand>, capture: C, playback: P) {
    let mut capture = Some(capture);
    debug!("Audio-Thread gestartet");

    loop {
        match cmd_rx.recv() {
            Ok(AudioCommand::StopCapture) => {
                if capture.take().is_some() {
                    info!("Capture gestoppt");
                }
            }
            Ok(AudioCommand::Shutdown) => break,
            Err(e) => {
                error!("Audio-Thread Kanal-Fehler: {}", e);
                break;
            }
        }
    }

    drop(capture);
    drop(playback);
    info!("Audio-Thread beendet");
}
