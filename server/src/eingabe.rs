//! Interaktive Abfragen auf stdin und Aufloesung der Relay-Adresse

use crate::args::{ConnectArgs, HostArgs, Modus};
use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// Stellt eine Frage und liest eine Zeile (ohne Zeilenende)
pub fn nachfragen<R: BufRead, W: Write>(frage: &str, eingabe: &mut R, ausgabe: &mut W) -> Result<String> {
    write!(ausgabe, "{frage}")?;
    ausgabe.flush()?;

    let mut zeile = String::new();
    eingabe.read_line(&mut zeile)?;
    Ok(zeile.trim().to_string())
}

/// Fragt den Betriebsmodus ab
pub fn modus_abfragen<R: BufRead, W: Write>(eingabe: &mut R, ausgabe: &mut W) -> Result<Modus> {
    writeln!(ausgabe, "Modus waehlen:")?;
    writeln!(ausgabe, "1. Host (Server)")?;
    writeln!(ausgabe, "2. Connect (Client)")?;

    match nachfragen("> ", eingabe, ausgabe)?.as_str() {
        "1" => Ok(Modus::Host(HostArgs::default())),
        "2" => Ok(Modus::Connect(ConnectArgs::default())),
        andere => bail!("Ungueltige Auswahl '{andere}'"),
    }
}

/// Nimmt den Wert aus der Kommandozeile oder fragt ihn ab; leer ist ein Fehler
pub fn pflichtwert<R: BufRead, W: Write>(
    wert: Option<String>,
    frage: &str,
    bezeichnung: &str,
    eingabe: &mut R,
    ausgabe: &mut W,
) -> Result<String> {
    let wert = match wert {
        Some(w) => w.trim().to_string(),
        None => nachfragen(frage, eingabe, ausgabe)?,
    };
    if wert.is_empty() {
        bail!("{bezeichnung} darf nicht leer sein");
    }
    Ok(wert)
}

/// Loest die Relay-Adresse auf
///
/// Akzeptiert `IP`, `IP:Port`, `[IPv6]:Port`, `Host` und `Host:Port`.
/// Ohne Port wird `standard_port` verwendet.
pub fn server_adresse_aufloesen(text: &str, standard_port: u16) -> Result<SocketAddr> {
    let text = text.trim();

    if let Ok(addr) = text.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = text.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, standard_port));
    }

    let mut kandidaten = if text.contains(':') {
        text.to_socket_addrs()
    } else {
        (text, standard_port).to_socket_addrs()
    }
    .with_context(|| format!("Server-Adresse '{text}' nicht aufloesbar"))?;

    kandidaten
        .next()
        .with_context(|| format!("Server-Adresse '{text}' liefert keine Adresse"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn modus_auswahl() {
        let mut aus = Vec::new();
        let m = modus_abfragen(&mut Cursor::new("1\n"), &mut aus).unwrap();
        assert_eq!(m, Modus::Host(HostArgs::default()));

        let m = modus_abfragen(&mut Cursor::new("2\r\n"), &mut aus).unwrap();
        assert_eq!(m, Modus::Connect(ConnectArgs::default()));

        assert!(modus_abfragen(&mut Cursor::new("3\n"), &mut aus).is_err());
        assert!(String::from_utf8(aus).unwrap().contains("Host (Server)"));
    }

    #[test]
    fn pflichtwert_aus_argument_ohne_abfrage() {
        let mut aus = Vec::new();
        let w = pflichtwert(
            Some("hanna".into()),
            "Name: ",
            "Benutzername",
            &mut Cursor::new(""),
            &mut aus,
        )
        .unwrap();
        assert_eq!(w, "hanna");
        assert!(aus.is_empty(), "Keine Abfrage wenn der Wert gesetzt ist");
    }

    #[test]
    fn pflichtwert_leer_ist_fehler() {
        let mut aus = Vec::new();
        let result = pflichtwert(None, "Name: ", "Benutzername", &mut Cursor::new("  \n"), &mut aus);
        let fehler = result.unwrap_err().to_string();
        assert!(fehler.contains("Benutzername"));
    }

    #[test]
    fn adresse_mit_und_ohne_port() {
        assert_eq!(
            server_adresse_aufloesen("10.0.0.5", 12345).unwrap(),
            "10.0.0.5:12345".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            server_adresse_aufloesen(" 10.0.0.5:4000 ", 12345).unwrap(),
            "10.0.0.5:4000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            server_adresse_aufloesen("::1", 12345).unwrap(),
            "[::1]:12345".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn localhost_wird_aufgeloest() {
        let addr = server_adresse_aufloesen("localhost", 12345).unwrap();
        assert_eq!(addr.port(), 12345);
        assert!(addr.ip().is_loopback());
    }
}
