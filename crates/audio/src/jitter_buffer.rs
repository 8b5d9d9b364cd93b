//! Jitter Buffer fuer dekodiertes PCM
//!
//! Begrenzte FIFO-Byte-Queue zwischen Empfangspfad (Producer) und
//! Playback-Callback (Consumer). Es wird nicht sortiert und nicht
//! nachgefordert: Pakete werden in Empfangsreihenfolge abgespielt.
//!
//! ## Regel beim Einfuegen
//!
//! ```text
//! gepuffert > kapazitaet / 3   -> Puffer leeren
//! daten passen nicht mehr      -> daten verwerfen (Overflow)
//! sonst                        -> anhaengen
//! ```
//!
//! Die Latenz bleibt damit auch nach Netzwerk-Bursts begrenzt, auf Kosten
//! einzelner verlorener Frames.

use parking_lot::Mutex;
use sprechfunk_core::BYTES_PRO_MS;
use std::collections::VecDeque;
use std::time::Duration;

/// Standardkapazitaet: 500 ms Mono-PCM bei 48 kHz
pub const STANDARD_KAPAZITAET: usize = 500 * BYTES_PRO_MS;

// ---------------------------------------------------------------------------
// Ergebnis und Statistik
// ---------------------------------------------------------------------------

/// Ausgang eines `push`-Aufrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushErgebnis {
    /// Daten angehaengt
    Angehaengt,
    /// Puffer war ueber der Schwelle, wurde geleert, Daten angehaengt
    NachLeerenAngehaengt,
    /// Daten passen nicht in die Restkapazitaet und wurden verworfen
    Verworfen,
    /// Leere oder ungerade Eingabe (kein 16-Bit-PCM)
    Abgelehnt,
}

/// Statistiken des Jitter Buffers (Snapshot)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitterStatistik {
    /// Anzahl angehaengter Pakete
    pub angehaengt: u64,
    /// Anzahl Leerungen wegen Ueberschreitung der Schwelle
    pub geleert: u64,
    /// Anzahl wegen Overflow verworfener Pakete
    pub verworfen: u64,
    /// Anzahl abgelehnter Eingaben
    pub abgelehnt: u64,
    /// Bytes, die der Playback-Callback nicht bekommen hat (Underrun)
    pub unterlauf_bytes: u64,
}

// ---------------------------------------------------------------------------
// JitterBuffer
// ---------------------------------------------------------------------------

/// Thread-sicherer, begrenzter PCM-Puffer
pub struct JitterBuffer {
    kapazitaet: usize,
    inner: Mutex<Zustand>,
}

struct Zustand {
    bytes: VecDeque<u8>,
    statistik: JitterStatistik,
}

impl JitterBuffer {
    /// Erstellt einen Puffer mit gegebener Kapazitaet in Bytes
    pub fn neu(kapazitaet: usize) -> Self {
        Self {
            kapazitaet,
            inner: Mutex::new(Zustand {
                bytes: VecDeque::with_capacity(kapazitaet.min(STANDARD_KAPAZITAET)),
                statistik: JitterStatistik::default(),
            }),
        }
    }

    /// Erstellt einen Puffer, der `dauer` Audio aufnehmen kann
    ///
    /// Zu grosse Dauern saettigen bei `usize::MAX` Bytes.
    pub fn mit_dauer(dauer: Duration) -> Self {
        let millis = usize::try_from(dauer.as_millis()).unwrap_or(usize::MAX);
        Self::neu(millis.saturating_mul(BYTES_PRO_MS))
    }

    /// Fuegt dekodiertes PCM ein, ohne je zu blockieren
    pub fn push(&self, daten: &[u8]) -> PushErgebnis {
        let mut z = self.inner.lock();

        if daten.is_empty() || daten.len() % 2 != 0 {
            z.statistik.abgelehnt += 1;
            tracing::debug!(bytes = daten.len(), "Ungueltiges PCM verworfen");
            return PushErgebnis::Abgelehnt;
        }

        let mut geleert = false;
        if z.bytes.len() > self.schwelle() {
            tracing::trace!(gepuffert = z.bytes.len(), "Jitter Buffer geleert");
            z.bytes.clear();
            z.statistik.geleert += 1;
            geleert = true;
        }

        if daten.len() > self.kapazitaet - z.bytes.len() {
            z.statistik.verworfen += 1;
            tracing::debug!(
                bytes = daten.len(),
                gepuffert = z.bytes.len(),
                "Jitter Buffer voll, Paket verworfen"
            );
            return PushErgebnis::Verworfen;
        }

        z.bytes.extend(daten.iter().copied());
        z.statistik.angehaengt += 1;

        if geleert {
            PushErgebnis::NachLeerenAngehaengt
        } else {
            PushErgebnis::Angehaengt
        }
    }

    /// Kopiert bis zu `ziel.len()` Bytes in `ziel`
    ///
    /// Gibt die Anzahl kopierter Bytes zurueck. Der Rest von `ziel` bleibt
    /// unveraendert, der Aufrufer fuellt ihn mit Stille.
    pub fn pull(&self, ziel: &mut [u8]) -> usize {
        let mut z = self.inner.lock();
        let n = ziel.len().min(z.bytes.len());

        for (out, b) in ziel.iter_mut().zip(z.bytes.drain(..n)) {
            *out = b;
        }
        z.statistik.unterlauf_bytes += (ziel.len() - n) as u64;
        n
    }

    /// Aktuell gepufferte Bytes
    pub fn fuellstand(&self) -> usize {
        self.inner.lock().bytes.len()
    }

    pub fn kapazitaet(&self) -> usize {
        self.kapazitaet
    }

    /// Ab diesem Fuellstand wird beim naechsten `push` geleert
    pub fn schwelle(&self) -> usize {
        self.kapazitaet / 3
    }

    /// Verwirft alle gepufferten Bytes
    pub fn leeren(&self) {
        self.inner.lock().bytes.clear();
    }

    pub fn statistik(&self) -> JitterStatistik {
        self.inner.lock().statistik.clone()
    }
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::neu(STANDARD_KAPAZITAET)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
