/*
 * cache.rs
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

//! Local relay list cache: one JSON file at `<config_dir>/nostr/relays.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::error::NostrError;
use super::types::{retain_secure, RelayConfig};

/// Where the repository keeps the user's filtered relay list.
pub trait RelayListStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet. Only `wss://` relays are returned.
    fn relay_list(&self) -> Result<Option<Vec<RelayConfig>>, NostrError>;

    fn save_relay_list(&self, relays: &[RelayConfig]) -> Result<(), NostrError>;
}

pub struct FileRelayListStore {
    path: PathBuf,
    /// Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl FileRelayListStore {
    pub fn new(config_dir: &Path) -> Self {
        Self::at(config_dir.join("nostr").join("relays.json"))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RelayListStore for FileRelayListStore {
    fn relay_list(&self) -> Result<Option<Vec<RelayConfig>>, NostrError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let relays: Vec<RelayConfig> = serde_json::from_slice(&data)?;
        Ok(Some(retain_secure(relays)))
    }

    /// Write to a sibling temp file, then rename over the old list.
    fn save_relay_list(&self, relays: &[RelayConfig]) -> Result<(), NostrError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(relays)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
