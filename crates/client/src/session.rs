//! Client-Session – verbindet Capture, Codec, Transport und Jitter Buffer
//!
//! ## Sendepfad
//!
//! ```text
//! Capture-Frame (1920 Bytes) -> FrameEncoder -> [0x02 | Opus] -> Transport -> Relay
//! ```
//!
//! ## Empfangspfad
//!
//! ```text
//! Relay -> Transport -> Tag
//!            0x02 -> FrameDecoder -> 1920 Bytes? -> JitterBuffer -> Playback
//!            0x03 -> Keepalive zurueck an den Relay
//!            sonst -> ignoriert
//! ```
//!
//! Beide Pfade laufen auf fremden Threads (cpal-Callback bzw. Empfangs-Task)
//! und teilen sich nur die Session, die deshalb `Sync` ist.

use parking_lot::{Mutex, RwLock};
use sprechfunk_audio::{FrameDecoder, FrameEncoder, JitterBuffer, PushErgebnis};
use sprechfunk_core::{Result, SprechfunkError, FRAME_BYTES};
use sprechfunk_protocol::voice::{PacketTag, VoicePacket, VoicePacketRef};
use sprechfunk_voice::{PaketSender, UdpKanal};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Sende- und Schliess-Seite des Kanals, wie die Session sie braucht
pub trait Transport: PaketSender {
    fn schliessen(&self);
}

impl Transport for UdpKanal {
    fn schliessen(&self) {
        UdpKanal::schliessen(self)
    }
}

/// Wird beim Beenden genau einmal aufgerufen, um die Aufnahme zu stoppen
pub type CaptureStopp = Box<dyn FnOnce() + Send + 'static>;

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Zaehler {
    frames_gesendet: AtomicU64,
    frames_verworfen: AtomicU64,
    pakete_gepuffert: AtomicU64,
    pakete_verworfen: AtomicU64,
}

/// Zaehlerstand der Session (Snapshot)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatistik {
    pub frames_gesendet: u64,
    pub frames_verworfen: u64,
    pub pakete_gepuffert: u64,
    pub pakete_verworfen: u64,
}

/// Was mit einem empfangenen Datagramm passiert ist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Empfang {
    /// Voice dekodiert und dem Jitter Buffer uebergeben
    Gepuffert(PushErgebnis),
    /// Keepalive des Relays beantwortet
    KeepaliveBeantwortet,
    /// Anderes Tag oder Session bereits beendet
    Ignoriert,
}

// ---------------------------------------------------------------------------
// ClientSession
// ---------------------------------------------------------------------------

/// Eine laufende Verbindung zu genau einem Relay
pub struct ClientSession {
    server: SocketAddr,
    transport: Arc<dyn Transport>,
    encoder: Mutex<Option<Box<dyn FrameEncoder>>>,
    decoder: Mutex<Option<Box<dyn FrameDecoder>>>,
    jitter: Arc<JitterBuffer>,
    capture_stopp: Mutex<Option<CaptureStopp>>,
    /// Lesend von jedem Sendevorgang gehalten, schreibend von `beenden`.
    /// `false` heisst: Disconnect ist raus, nichts mehr senden.
    sende_tor: RwLock<bool>,
    beendet: AtomicBool,
    zaehler: Zaehler,
}

impl ClientSession {
    pub fn neu(
        server: SocketAddr,
        transport: Arc<dyn Transport>,
        encoder: Box<dyn FrameEncoder>,
        decoder: Box<dyn FrameDecoder>,
        jitter: Arc<JitterBuffer>,
    ) -> Self {
        Self {
            server,
            transport,
            encoder: Mutex::new(Some(encoder)),
            decoder: Mutex::new(Some(decoder)),
            jitter,
            capture_stopp: Mutex::new(None),
            sende_tor: RwLock::new(true),
            beendet: AtomicBool::new(false),
            zaehler: Zaehler::default(),
        }
    }

    /// Registriert die Session als Empfaenger des Kanals und meldet sie an
    ///
    /// Die Anmeldung ist ein einzelnes Keepalive, damit der Relay den Client
    /// kennt, bevor er zum ersten Mal spricht.
    pub fn empfang_starten(self: &Arc<Self>, kanal: &UdpKanal) -> Result<()> {
        let session = Arc::clone(self);
        kanal.empfang_starten(move |daten, absender| {
            if let Err(e) = session.paket_empfangen(daten, absender) {
                if e.ist_transient() {
                    tracing::debug!(absender = %absender, fehler = %e, "Paket verworfen");
                } else {
                    tracing::warn!(absender = %absender, fehler = %e, "Empfang fehlgeschlagen");
                }
            }
        })?;
        self.anmelden()
    }

    /// Sendet die Anmeldung an den Relay
    pub fn anmelden(&self) -> Result<()> {
        self.senden(&VoicePacket::keepalive().encode())?;
        tracing::info!(server = %self.server, "Beim Relay angemeldet");
        Ok(())
    }

    /// Registriert den Hook, der beim Beenden die Aufnahme stoppt
    pub fn capture_stopp_registrieren(&self, stopp: CaptureStopp) {
        *self.capture_stopp.lock() = Some(stopp);
    }

    /// Kodiert und sendet einen erfassten Frame
    ///
    /// Jeder Fehler verwirft genau diesen Frame, es gibt kein Retry.
    ///
    /// # Fehler
    /// - `InvalidFrameSize` wenn `pcm` nicht `FRAME_BYTES` lang ist
    /// - `Codec` wenn der Encoder scheitert
    /// - `Senden` wenn der Transport scheitert
    /// - `Geschlossen` nach `beenden()`
    pub fn frame_senden(&self, pcm: &[u8]) -> Result<()> {
        match self.frame_senden_intern(pcm) {
            Ok(()) => {
                self.zaehler.frames_gesendet.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.zaehler.frames_verworfen.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn frame_senden_intern(&self, pcm: &[u8]) -> Result<()> {
        if pcm.len() != FRAME_BYTES {
            return Err(SprechfunkError::InvalidFrameSize {
                erwartet: FRAME_BYTES,
                erhalten: pcm.len(),
            });
        }

        let opus = {
            let mut encoder = self.encoder.lock();
            let encoder = encoder.as_mut().ok_or(SprechfunkError::Geschlossen)?;
            encoder.encode(pcm)?
        };

        let paket = VoicePacket::encode_teile(PacketTag::Voice, &opus);
        self.senden(&paket)
    }

    /// Sendet an den Relay, solange `beenden` den Disconnect noch nicht
    /// abgeschickt hat
    fn senden(&self, paket: &[u8]) -> Result<()> {
        let offen = self.sende_tor.read();
        if !*offen {
            return Err(SprechfunkError::Geschlossen);
        }
        self.transport.senden(paket, self.server)?;
        Ok(())
    }

    /// Verarbeitet ein Datagramm vom Kanal
    ///
    /// # Fehler
    /// - `MalformedPacket` bei leerem Datagramm
    /// - `Codec` wenn der Decoder scheitert
    /// - `InvalidFrameSize` wenn der Decoder keinen ganzen Frame liefert
    pub fn paket_empfangen(&self, daten: &[u8], absender: SocketAddr) -> Result<Empfang> {
        if self.ist_beendet() {
            return Ok(Empfang::Ignoriert);
        }

        let paket = VoicePacketRef::decode(daten)?;
        match paket.tag {
            PacketTag::Voice => match self.voice_puffern(paket.payload) {
                Ok(ergebnis) => {
                    self.zaehler.pakete_gepuffert.fetch_add(1, Ordering::Relaxed);
                    Ok(Empfang::Gepuffert(ergebnis))
                }
                Err(e) => {
                    self.zaehler.pakete_verworfen.fetch_add(1, Ordering::Relaxed);
                    Err(e)
                }
            },
            PacketTag::Keepalive if absender == self.server => {
                self.senden(&VoicePacket::keepalive().encode())?;
                tracing::trace!("Keepalive beantwortet");
                Ok(Empfang::KeepaliveBeantwortet)
            }
            _ => Ok(Empfang::Ignoriert),
        }
    }

    fn voice_puffern(&self, opus: &[u8]) -> Result<PushErgebnis> {
        let pcm = {
            let mut decoder = self.decoder.lock();
            let decoder = decoder.as_mut().ok_or(SprechfunkError::Geschlossen)?;
            decoder.decode(opus)?
        };

        if pcm.len() != FRAME_BYTES {
            return Err(SprechfunkError::InvalidFrameSize {
                erwartet: FRAME_BYTES,
                erhalten: pcm.len(),
            });
        }

        Ok(self.jitter.push(&pcm))
    }

    /// Beendet die Session
    ///
    /// Idempotent und aus jedem Thread aufrufbar, auch waehrend Frames
    /// gesendet oder Pakete empfangen werden. Reihenfolge: Disconnect
    /// senden, Aufnahme stoppen, Codecs freigeben, Kanal schliessen.
    /// Der Disconnect ist das letzte Paket, das die Session verschickt.
    pub fn beenden(&self) {
        if self.beendet.swap(true, Ordering::AcqRel) {
            return;
        }

        {
            // Wartet auf laufende Sendevorgaenge und sperrt alle weiteren
            let mut offen = self.sende_tor.write();
            *offen = false;
            if let Err(e) = self
                .transport
                .senden(&VoicePacket::disconnect().encode(), self.server)
            {
                tracing::debug!(fehler = %e, "Disconnect konnte nicht gesendet werden");
            }
        }

        let stopp = self.capture_stopp.lock().take();
        if let Some(stopp) = stopp {
            stopp();
        }

        self.encoder.lock().take();
        self.decoder.lock().take();
        self.transport.schliessen();

        let s = self.statistik();
        tracing::info!(
            server = %self.server,
            frames_gesendet = s.frames_gesendet,
            frames_verworfen = s.frames_verworfen,
            pakete_gepuffert = s.pakete_gepuffert,
            pakete_verworfen = s.pakete_verworfen,
            "Session beendet"
        );
    }

    pub fn ist_beendet(&self) -> bool {
        self.beendet.load(Ordering::Acquire)
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    pub fn jitter_buffer(&self) -> &Arc<JitterBuffer> {
        &self.jitter
    }

    pub fn statistik(&self) -> SessionStatistik {
        SessionStatistik {
            frames_gesendet: self.zaehler.frames_gesendet.load(Ordering::Relaxed),
            frames_verworfen: self.zaehler.frames_verworfen.load(Ordering::Relaxed),
            pakete_gepuffert: self.zaehler.pakete_gepuffert.load(Ordering::Relaxed),
            pakete_verworfen: self.zaehler.pakete_verworfen.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.beenden();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sprechfunk_audio::{AudioError, AudioResult};
    use sprechfunk_voice::VoiceError;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn server() -> SocketAddr {
        "127.0.0.1:12345".parse().unwrap()
    }

    #[derive(Default)]
    struct Rekorder {
        gesendet: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
        geschlossen: AtomicUsize,
        defekt: AtomicBool,
    }

    impl Rekorder {
        fn pakete(&self) -> Vec<Vec<u8>> {
            self.gesendet.lock().iter().map(|(d, _)| d.clone()).collect()
        }
    }

    impl PaketSender for Rekorder {
        fn senden(&self, daten: &[u8], ziel: SocketAddr) -> std::result::Result<(), VoiceError> {
            if self.defekt.load(Ordering::SeqCst) {
                return Err(VoiceError::Senden {
                    ziel,
                    quelle: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                });
            }
            self.gesendet.lock().push((daten.to_vec(), ziel));
            Ok(())
        }
    }

    impl Transport for Rekorder {
        fn schliessen(&self) {
            self.geschlossen.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Liefert feste Opus-Bytes und zaehlt Aufrufe
    struct ZaehlEncoder(Arc<AtomicUsize>);

    impl FrameEncoder for ZaehlEncoder {
        fn encode(&mut self, _pcm: &[u8]) -> AudioResult<Vec<u8>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(b"opus".to_vec())
        }
    }

    /// Liefert `laenge` Bytes PCM, bei Nutzdaten "kaputt" einen Fehler
    struct TestDecoder {
        laenge: usize,
    }

    impl FrameDecoder for TestDecoder {
        fn decode(&mut self, paket: &[u8]) -> AudioResult<Vec<u8>> {
            if paket == b"kaputt" {
                return Err(AudioError::CodecFehler("korrupt".into()));
            }
            Ok(vec![1u8; self.laenge])
        }
    }

    struct Aufbau {
        session: ClientSession,
        rekorder: Arc<Rekorder>,
        encodes: Arc<AtomicUsize>,
    }

    fn aufbau(decoder_laenge: usize) -> Aufbau {
        let rekorder = Arc::new(Rekorder::default());
        let encodes = Arc::new(AtomicUsize::new(0));
        let session = ClientSession::neu(
            server(),
            Arc::clone(&rekorder) as Arc<dyn Transport>,
            Box::new(ZaehlEncoder(Arc::clone(&encodes))),
            Box::new(TestDecoder {
                laenge: decoder_laenge,
            }),
            Arc::new(JitterBuffer::default()),
        );
        Aufbau {
            session,
            rekorder,
            encodes,
        }
    }

    #[test]
    fn frame_wird_kodiert_und_als_voice_gesendet() {
        let a = aufbau(FRAME_BYTES);
        a.session.frame_senden(&[0u8; FRAME_BYTES]).unwrap();

        let gesendet = a.rekorder.gesendet.lock().clone();
        assert_eq!(gesendet, vec![(b"\x02opus".to_vec(), server())]);
        assert_eq!(a.session.statistik().frames_gesendet, 1);
    }

    #[test]
    fn falsche_frame_groesse_ohne_encoder_aufruf() {
        let a = aufbau(FRAME_BYTES);
        for laenge in [0usize, 1, FRAME_BYTES - 1, FRAME_BYTES + 1, FRAME_BYTES * 2] {
            let result = a.session.frame_senden(&vec![0u8; laenge]);
            assert!(matches!(
                result,
                Err(SprechfunkError::InvalidFrameSize { erhalten, .. }) if erhalten == laenge
            ));
        }
        assert_eq!(a.encodes.load(Ordering::SeqCst), 0);
        assert!(a.rekorder.pakete().is_empty());
        assert_eq!(a.session.statistik().frames_verworfen, 5);
    }

    #[test]
    fn sendefehler_verwirft_frame() {
        let a = aufbau(FRAME_BYTES);
        a.rekorder.defekt.store(true, Ordering::SeqCst);

        let result = a.session.frame_senden(&[0u8; FRAME_BYTES]);
        assert!(matches!(result, Err(SprechfunkError::Senden { .. })));
        assert_eq!(a.session.statistik().frames_verworfen, 1);
    }

    #[test]
    fn voice_wird_dekodiert_und_gepuffert() {
        let a = aufbau(FRAME_BYTES);
        let e = a.session.paket_empfangen(b"\x02abc", server()).unwrap();

        assert_eq!(e, Empfang::Gepuffert(PushErgebnis::Angehaengt));
        assert_eq!(a.session.jitter_buffer().fuellstand(), FRAME_BYTES);
    }

    #[test]
    fn teilframe_vom_decoder_wird_verworfen() {
        let a = aufbau(FRAME_BYTES / 2);
        let result = a.session.paket_empfangen(b"\x02abc", server());

        assert!(matches!(result, Err(SprechfunkError::InvalidFrameSize { .. })));
        assert_eq!(a.session.jitter_buffer().fuellstand(), 0);
        assert_eq!(a.session.statistik().pakete_verworfen, 1);
    }

    #[test]
    fn codec_fehler_ist_nicht_fatal() {
        let a = aufbau(FRAME_BYTES);
        let result = a.session.paket_empfangen(b"\x02kaputt", server());
        assert!(matches!(result, Err(SprechfunkError::Codec(_))));

        // Naechstes Paket wird normal verarbeitet
        assert!(a.session.paket_empfangen(b"\x02ok", server()).is_ok());
        assert_eq!(a.session.jitter_buffer().fuellstand(), FRAME_BYTES);
    }

    #[test]
    fn leeres_datagramm_ist_malformed() {
        let a = aufbau(FRAME_BYTES);
        assert!(matches!(
            a.session.paket_empfangen(&[], server()),
            Err(SprechfunkError::MalformedPacket(_))
        ));
    }

    #[test]
    fn keepalive_vom_server_wird_beantwortet() {
        let a = aufbau(FRAME_BYTES);
        let fremd: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert_eq!(
            a.session.paket_empfangen(&[0x03], server()).unwrap(),
            Empfang::KeepaliveBeantwortet
        );
        assert_eq!(
            a.session.paket_empfangen(&[0x03], fremd).unwrap(),
            Empfang::Ignoriert
        );
        assert_eq!(a.rekorder.pakete(), vec![vec![0x03]]);
    }

    #[test]
    fn andere_tags_werden_ignoriert() {
        let a = aufbau(FRAME_BYTES);
        assert_eq!(
            a.session.paket_empfangen(&[0x01], server()).unwrap(),
            Empfang::Ignoriert
        );
        assert_eq!(
            a.session.paket_empfangen(&[0x7F, 1, 2], server()).unwrap(),
            Empfang::Ignoriert
        );
        assert!(a.rekorder.pakete().is_empty());
    }

    #[test]
    fn beenden_sendet_disconnect_und_stoppt_alles() {
        let a = aufbau(FRAME_BYTES);
        let gestoppt = Arc::new(AtomicUsize::new(0));
        let g = Arc::clone(&gestoppt);
        a.session
            .capture_stopp_registrieren(Box::new(move || {
                g.fetch_add(1, Ordering::SeqCst);
            }));

        a.session.beenden();
        a.session.beenden();

        assert_eq!(a.rekorder.pakete(), vec![vec![0x01]]);
        assert_eq!(gestoppt.load(Ordering::SeqCst), 1);
        assert_eq!(a.rekorder.geschlossen.load(Ordering::SeqCst), 1);

        // Nach dem Beenden wird nichts mehr kodiert oder gepuffert
        assert!(matches!(
            a.session.frame_senden(&[0u8; FRAME_BYTES]),
            Err(SprechfunkError::Geschlossen)
        ));
        assert_eq!(a.encodes.load(Ordering::SeqCst), 0);
        assert_eq!(
            a.session.paket_empfangen(b"\x02abc", server()).unwrap(),
            Empfang::Ignoriert
        );
    }

    #[test]
    fn beenden_ignoriert_sendefehler() {
        let a = aufbau(FRAME_BYTES);
        a.rekorder.defekt.store(true, Ordering::SeqCst);

        a.session.beenden();
        assert!(a.session.ist_beendet());
        assert_eq!(a.rekorder.geschlossen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn beenden_parallel_zum_senden() {
        let a = aufbau(FRAME_BYTES);
        let session = Arc::new(a.session);

        let sender: Vec<_> = (0..4)
            .map(|_| {
                let s = Arc::clone(&session);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let _ = s.frame_senden(&[0u8; FRAME_BYTES]);
                    }
                })
            })
            .collect();

        let beender: Vec<_> = (0..4)
            .map(|_| {
                let s = Arc::clone(&session);
                std::thread::spawn(move || s.beenden())
            })
            .collect();

        for t in sender.into_iter().chain(beender) {
            t.join().unwrap();
        }

        assert_eq!(a.rekorder.geschlossen.load(Ordering::SeqCst), 1);
        let disconnects = a
            .rekorder
            .pakete()
            .iter()
            .filter(|p| p.as_slice() == [0x01])
            .count();
        assert_eq!(disconnects, 1);
        assert_eq!(a.rekorder.pakete().last(), Some(&vec![0x01]));
    }

    /// Haelt jedes Voice-Paket an, bis der Test es freigibt
    struct Bremse {
        gesendet: Mutex<Vec<Vec<u8>>>,
        betreten: Mutex<std::sync::mpsc::Sender<()>>,
        freigabe: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl PaketSender for Bremse {
        fn senden(&self, daten: &[u8], _ziel: SocketAddr) -> std::result::Result<(), VoiceError> {
            if daten.first() == Some(&0x02) {
                let _ = self.betreten.lock().send(());
                let _ = self.freigabe.lock().recv_timeout(Duration::from_secs(2));
            }
            self.gesendet.lock().push(daten.to_vec());
            Ok(())
        }
    }

    impl Transport for Bremse {
        fn schliessen(&self) {}
    }

    #[test]
    fn disconnect_ist_letztes_paket_trotz_haengendem_frame() {
        let (betreten_tx, betreten_rx) = std::sync::mpsc::channel();
        let (freigabe_tx, freigabe_rx) = std::sync::mpsc::channel();
        let bremse = Arc::new(Bremse {
            gesendet: Mutex::new(Vec::new()),
            betreten: Mutex::new(betreten_tx),
            freigabe: Mutex::new(freigabe_rx),
        });
        let session = Arc::new(ClientSession::neu(
            server(),
            Arc::clone(&bremse) as Arc<dyn Transport>,
            Box::new(ZaehlEncoder(Arc::new(AtomicUsize::new(0)))),
            Box::new(TestDecoder {
                laenge: FRAME_BYTES,
            }),
            Arc::new(JitterBuffer::default()),
        ));

        let s = Arc::clone(&session);
        let capture = std::thread::spawn(move || s.frame_senden(&[0u8; FRAME_BYTES]));
        betreten_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("Frame muss im Transport angekommen sein");

        // Frame steckt im Transport, jetzt parallel beenden
        let s = Arc::clone(&session);
        let beender = std::thread::spawn(move || s.beenden());
        std::thread::sleep(Duration::from_millis(50));
        freigabe_tx.send(()).unwrap();

        capture.join().unwrap().unwrap();
        beender.join().unwrap();

        let pakete = bremse.gesendet.lock().clone();
        assert_eq!(pakete, vec![b"\x02opus".to_vec(), vec![0x01]]);

        // Nach dem Disconnect geht nichts mehr raus
        assert!(session.frame_senden(&[0u8; FRAME_BYTES]).is_err());
        assert!(session.anmelden().is_err());
        assert_eq!(bremse.gesendet.lock().len(), 2);
    }

    async fn empfangen(relay: &tokio::net::UdpSocket) -> (Vec<u8>, SocketAddr) {
        let mut buf = [0u8; 64];
        let (n, von) = tokio::time::timeout(Duration::from_secs(2), relay.recv_from(&mut buf))
            .await
            .expect("Timeout beim Empfangen")
            .unwrap();
        (buf[..n].to_vec(), von)
    }

    #[tokio::test]
    async fn anmeldung_und_keepalive_ueber_echten_kanal() {
        let relay = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay_addr = relay.local_addr().unwrap();

        let kanal = Arc::new(UdpKanal::oeffnen("127.0.0.1:0".parse().unwrap()).unwrap());
        let session = Arc::new(ClientSession::neu(
            relay_addr,
            Arc::clone(&kanal) as Arc<dyn Transport>,
            Box::new(ZaehlEncoder(Arc::new(AtomicUsize::new(0)))),
            Box::new(TestDecoder {
                laenge: FRAME_BYTES,
            }),
            Arc::new(JitterBuffer::default()),
        ));
        session.empfang_starten(&kanal).unwrap();

        // Anmeldung
        let (daten, client) = empfangen(&relay).await;
        assert_eq!(daten, vec![0x03]);
        assert_eq!(client, kanal.lokale_adresse());

        // Keepalive vom Relay wird beantwortet
        relay.send_to(&[0x03], client).await.unwrap();
        assert_eq!(empfangen(&relay).await.0, vec![0x03]);

        // Voice landet im Jitter Buffer
        relay.send_to(&[0x02, 9, 9], client).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while session.jitter_buffer().fuellstand() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Voice muss gepuffert werden");

        session.beenden();
        assert_eq!(empfangen(&relay).await.0, vec![0x01]);
        assert!(kanal.ist_geschlossen());
    }
}
