/*
 * config.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Segnalibro, a Nostr bookmarking client.
 *
 * Segnalibro is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Segnalibro is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Segnalibro.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Client configuration: relays and timeouts, read from ~/.segnalibro/config.xml.
//! All XML reading uses the quick_xml pull parser; no regex or hand parsing.
//!
//! ```xml
//! <segnalibro>
//!   <relays>
//!     <bootstrap>wss://purplepag.es</bootstrap>
//!     <relay read="true" write="false">wss://relay.damus.io</relay>
//!   </relays>
//!   <timeouts subscribe="10" publish="10" connect="5" connectivity="3"/>
//!   <limits probe="10" cache="5"/>
//! </segnalibro>
//! ```
//!
//! Timeouts are in seconds. Anything missing keeps its default; unknown elements are ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;
use tracing::warn;

use crate::protocol::nostr::RelayConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] io::Error),
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Queried for relay lists before the user's own relays are known.
    pub bootstrap_relays: Vec<RelayConfig>,
    /// Used until a relay list has been cached.
    pub default_relays: Vec<RelayConfig>,
    pub subscribe_timeout: Duration,
    pub publish_timeout: Duration,
    pub connect_timeout: Duration,
    /// Short timeout for connectivity probes.
    pub connectivity_timeout: Duration,
    pub max_probed_relays: usize,
    pub max_cached_relays: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bootstrap_relays: vec![
                RelayConfig::read_write("wss://purplepag.es"),
                RelayConfig::read_write("wss://relay.damus.io"),
                RelayConfig::read_write("wss://nos.lol"),
            ],
            default_relays: vec![
                RelayConfig::read_write("wss://relay.damus.io"),
                RelayConfig::read_write("wss://nos.lol"),
                RelayConfig::read_write("wss://relay.primal.net"),
            ],
            subscribe_timeout: Duration::from_secs(10),
            publish_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            connectivity_timeout: Duration::from_secs(3),
            max_probed_relays: 10,
            max_cached_relays: 5,
        }
    }
}

/// Default config directory: ~/.segnalibro.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|h| h.join(".segnalibro"))
}

pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|d| d.join("config.xml"))
}

/// Load config from `path`. A missing file gives the defaults.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => parse_config_xml(&content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(e.into()),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum RelayElement {
    Bootstrap,
    Relay { read: bool, write: bool },
}

pub fn parse_config_xml(content: &str) -> Result<ClientConfig, ConfigError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut config = ClientConfig::default();
    let mut bootstrap = Vec::new();
    let mut relays = Vec::new();
    let mut in_relays = false;
    let mut current: Option<RelayElement> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(ConfigError::Xml(e.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"relays" => in_relays = true,
                b"bootstrap" if in_relays => current = Some(RelayElement::Bootstrap),
                b"relay" if in_relays => {
                    current = Some(RelayElement::Relay {
                        read: bool_attr(&e, "read")?.unwrap_or(true),
                        write: bool_attr(&e, "write")?.unwrap_or(true),
                    })
                }
                _ => apply_settings(&e, &mut config)?,
            },
            Ok(Event::Empty(e)) => apply_settings(&e, &mut config)?,
            Ok(Event::Text(e)) => {
                let Some(element) = current else {
                    continue;
                };
                let url = e
                    .unescape()
                    .map_err(|e| ConfigError::Xml(e.to_string()))?
                    .trim()
                    .to_string();
                if !url.starts_with("wss://") {
                    warn!(%url, "ignoring relay without wss:// scheme");
                    continue;
                }
                match element {
                    RelayElement::Bootstrap => bootstrap.push(RelayConfig::read_write(url)),
                    RelayElement::Relay { read, write } => {
                        relays.push(RelayConfig::new(url, read, write))
                    }
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"relays" => in_relays = false,
                b"bootstrap" | b"relay" => current = None,
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    if !bootstrap.is_empty() {
        config.bootstrap_relays = bootstrap;
    }
    if !relays.is_empty() {
        config.default_relays = relays;
    }
    Ok(config)
}

/// `<timeouts .../>` and `<limits .../>`; other elements are ignored.
fn apply_settings(e: &BytesStart<'_>, config: &mut ClientConfig) -> Result<(), ConfigError> {
    match e.name().as_ref() {
        b"timeouts" => {
            if let Some(d) = seconds_attr(e, "subscribe")? {
                config.subscribe_timeout = d;
            }
            if let Some(d) = seconds_attr(e, "publish")? {
                config.publish_timeout = d;
            }
            if let Some(d) = seconds_attr(e, "connect")? {
                config.connect_timeout = d;
            }
            if let Some(d) = seconds_attr(e, "connectivity")? {
                config.connectivity_timeout = d;
            }
        }
        b"limits" => {
            if let Some(n) = count_attr(e, "probe")? {
                config.max_probed_relays = n;
            }
            if let Some(n) = count_attr(e, "cache")? {
                config.max_cached_relays = n;
            }
        }
        _ => {}
    }
    Ok(())
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, ConfigError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ConfigError::Xml(e.to_string()))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| ConfigError::Xml(e.to_string()))?;
            return Ok(Some(value.trim().to_string()));
        }
    }
    Ok(None)
}

fn invalid(name: &str, value: String) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value,
    }
}

fn bool_attr(e: &BytesStart<'_>, name: &str) -> Result<Option<bool>, ConfigError> {
    match attr(e, name)? {
        None => Ok(None),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(invalid(name, v)),
        },
    }
}

fn seconds_attr(e: &BytesStart<'_>, name: &str) -> Result<Option<Duration>, ConfigError> {
    match attr(e, name)? {
        None => Ok(None),
        Some(v) => match v.parse::<f64>().map(Duration::try_from_secs_f64) {
            Ok(Ok(d)) if !d.is_zero() => Ok(Some(d)),
            _ => Err(invalid(name, v)),
        },
    }
}

fn count_attr(e: &BytesStart<'_>, name: &str) -> Result<Option<usize>, ConfigError> {
    match attr(e, name)? {
        None => Ok(None),
        Some(v) => match v.parse::<usize>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(invalid(name, v)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("config.xml")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.max_cached_relays, 5);
        assert_eq!(config.max_probed_relays, 10);
    }

    #[test]
    fn parses_relays_and_timeouts() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<segnalibro>
  <relays>
    <bootstrap>wss://purplepag.es</bootstrap>
    <bootstrap>ws://insecure.example</bootstrap>
    <relay read="true" write="false">wss://relay.damus.io</relay>
    <relay>wss://nos.lol</relay>
  </relays>
  <timeouts subscribe="8" publish="12" connectivity="1.5"/>
  <limits cache="3"/>
  <theme>dark</theme>
</segnalibro>"#;
        let config = parse_config_xml(xml).unwrap();
        assert_eq!(config.bootstrap_relays, vec![RelayConfig::read_write("wss://purplepag.es")]);
        assert_eq!(
            config.default_relays,
            vec![
                RelayConfig::new("wss://relay.damus.io", true, false),
                RelayConfig::read_write("wss://nos.lol"),
            ]
        );
        assert_eq!(config.subscribe_timeout, Duration::from_secs(8));
        assert_eq!(config.publish_timeout, Duration::from_secs(12));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.connectivity_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_cached_relays, 3);
        assert_eq!(config.max_probed_relays, 10);
    }

    #[test]
    fn rejects_bad_values() {
        let xml = r#"<segnalibro><timeouts subscribe="soon"/></segnalibro>"#;
        assert!(matches!(
            parse_config_xml(xml),
            Err(ConfigError::InvalidValue { ref name, .. }) if name == "subscribe"
        ));
        for value in ["1e30", "-1", "0", "NaN", "inf"] {
            let xml = format!(r#"<segnalibro><timeouts publish="{}"/></segnalibro>"#, value);
            assert!(matches!(
                parse_config_xml(&xml),
                Err(ConfigError::InvalidValue { ref name, .. }) if name == "publish"
            ));
        }
        let xml = r#"<segnalibro><relays><relay write="maybe">wss://a</relay></relays></segnalibro>"#;
        assert!(matches!(parse_config_xml(xml), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            parse_config_xml("<segnalibro><relays></segnalibro>"),
            Err(ConfigError::Xml(_))
        ));
    }
}
