/*
 * lib.rs
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

//! C FFI for segnalibro core: relay list discovery and cache, relay pool subscribe and publish,
//! NIP-55 signer replies.
//! Structured values cross the boundary as UTF-8 JSON strings; returned strings are owned by
//! the caller (free with segnalibro_free_string). All string parameters are UTF-8 NUL-terminated.
//! Network calls block the calling thread on the shared runtime; do not call them from the UI
//! thread or from inside a tokio runtime.

use libc::{c_char, c_int, c_uint};
use std::ffi::{CStr, CString};
use std::fmt::Display;
use std::path::PathBuf;
use std::ptr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use segnalibro_core::config::{default_config_dir, load_config};
use segnalibro_core::protocol::nostr::nip55::{
    parse_public_key_response, parse_sign_event_response, SignerResponse,
};
use segnalibro_core::protocol::nostr::{
    retain_secure, FileRelayListStore, Filter, RelayConfig, RelayListRepository, RelayPool,
};

/// Hosts the shared tokio runtime and the repository created by segnalibro_init.
struct Registry {
    runtime: tokio::runtime::Runtime,
    repository: RwLock<Option<Arc<RelayListRepository>>>,
}

fn registry() -> Result<&'static Registry, String> {
    static REGISTRY: once_cell::sync::OnceCell<Registry> = once_cell::sync::OnceCell::new();
    REGISTRY
        .get_or_try_init(|| {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()?;
            Ok::<_, std::io::Error>(Registry {
                runtime,
                repository: RwLock::new(None),
            })
        })
        .map_err(|e| format!("failed to create tokio runtime: {}", e))
}

fn repository() -> Result<(&'static Registry, Arc<RelayListRepository>), String> {
    let registry = registry()?;
    let repository = registry
        .repository
        .read()
        .ok()
        .and_then(|g| g.clone())
        .ok_or_else(|| "not initialized (call segnalibro_init)".to_string())?;
    Ok((registry, repository))
}

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = std::cell::RefCell::new(None);
}

fn set_last_error(err: impl Display) {
    let msg = CString::new(err.to_string().replace('\0', " ")).ok();
    LAST_ERROR.with(|e| *e.borrow_mut() = msg);
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn ptr_to_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

fn required(ptr: *const c_char, name: &str) -> Result<String, String> {
    ptr_to_str(ptr).ok_or_else(|| format!("{} is NULL or not UTF-8", name))
}

/// Hand a string to the caller, or NULL with last error set.
fn into_c_string(result: Result<String, String>) -> *mut c_char {
    match result.and_then(|s| CString::new(s).map_err(|e| e.to_string())) {
        Ok(s) => {
            clear_last_error();
            s.into_raw()
        }
        Err(e) => {
            set_last_error(e);
            ptr::null_mut()
        }
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

fn timeout_or(ms: c_uint, default: Duration) -> Duration {
    if ms == 0 {
        default
    } else {
        Duration::from_millis(u64::from(ms))
    }
}

/// Relays from a JSON array (non-`wss://` entries dropped), or the cached relays (defaults if
/// none) when NULL.
fn relays_arg(
    relays_json: *const c_char,
    repository: &RelayListRepository,
) -> Result<Vec<RelayConfig>, String> {
    match ptr_to_str(relays_json) {
        Some(json) => parse_relays(&json),
        None => repository.relays().map_err(|e| e.to_string()),
    }
}

fn parse_relays(json: &str) -> Result<Vec<RelayConfig>, String> {
    let relays: Vec<RelayConfig> =
        serde_json::from_str(json).map_err(|e| format!("relays: {}", e))?;
    Ok(retain_secure(relays))
}

/// Version string (static, do not free).
#[no_mangle]
pub extern "C" fn segnalibro_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

/// Last error message from a failed call on this thread. Valid until the next FFI call.
/// Do not free.
#[no_mangle]
pub extern "C" fn segnalibro_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| s.as_ptr())
            .unwrap_or(ptr::null())
    })
}

/// Free a string returned by this library. No-op if ptr is NULL.
#[no_mangle]
pub unsafe extern "C" fn segnalibro_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

/// Install a tracing subscriber writing to stderr. filter: EnvFilter directives (e.g.
/// "segnalibro_core=debug"); NULL uses RUST_LOG, falling back to "info". Returns 0, or -1 if a
/// subscriber was already installed.
#[no_mangle]
pub unsafe extern "C" fn segnalibro_init_logging(filter: *const c_char) -> c_int {
    use tracing_subscriber::EnvFilter;
    let filter = match ptr_to_str(filter) {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        Ok(()) => {
            clear_last_error();
            0
        }
        Err(e) => {
            set_last_error(e);
            -1
        }
    }
}

/// Load config.xml from config_dir (NULL: ~/.segnalibro) and set up the relay list cache there.
/// May be called again to switch directories. Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn segnalibro_init(config_dir: *const c_char) -> c_int {
    let result = (|| -> Result<(), String> {
        let registry = registry()?;
        let dir = ptr_to_str(config_dir)
            .map(PathBuf::from)
            .or_else(default_config_dir)
            .ok_or_else(|| "no config directory (HOME not set)".to_string())?;
        let config = load_config(&dir.join("config.xml")).map_err(|e| e.to_string())?;
        let pool = RelayPool::websocket(config.connect_timeout);
        let store = Arc::new(FileRelayListStore::new(&dir));
        let repository = Arc::new(RelayListRepository::new(pool, store, config));
        let mut slot = registry
            .repository
            .write()
            .map_err(|_| "registry lock poisoned".to_string())?;
        *slot = Some(repository);
        tracing::info!(dir = %dir.display(), "segnalibro initialized");
        Ok(())
    })();
    match result {
        Ok(()) => {
            clear_last_error();
            0
        }
        Err(e) => {
            set_last_error(e);
            -1
        }
    }
}

/// Discover the user's relays (npub or hex), probe them and cache up to the configured limit.
/// Returns the cached relays as a JSON array (empty when nothing was found or reachable), or
/// NULL on error. Blocks.
#[no_mangle]
pub unsafe extern "C" fn segnalibro_fetch_and_cache_relays(pubkey: *const c_char) -> *mut c_char {
    into_c_string((|| -> Result<String, String> {
        let pubkey = required(pubkey, "pubkey")?;
        let (registry, repository) = repository()?;
        let relays = registry
            .runtime
            .block_on(repository.fetch_and_cache_user_relays(&pubkey))
            .map_err(|e| e.to_string())?;
        to_json(&relays)
    })())
}

/// Cached relays, or the configured defaults when nothing is cached, as a JSON array.
#[no_mangle]
pub extern "C" fn segnalibro_cached_relays() -> *mut c_char {
    into_c_string((|| -> Result<String, String> {
        let (_, repository) = repository()?;
        to_json(&repository.relays().map_err(|e| e.to_string())?)
    })())
}

/// Query relays_json (JSON array of {url, read, write}; NULL: cached relays) with filter_json
/// (NIP-01 filter object). timeout_ms 0 uses the configured subscribe timeout. Returns the
/// deduplicated events as a JSON array. Unreachable relays contribute nothing. Blocks.
#[no_mangle]
pub unsafe extern "C" fn segnalibro_subscribe(
    relays_json: *const c_char,
    filter_json: *const c_char,
    timeout_ms: c_uint,
) -> *mut c_char {
    into_c_string((|| -> Result<String, String> {
        let (registry, repository) = repository()?;
        let relays = relays_arg(relays_json, &repository)?;
        let filter: Filter = serde_json::from_str(&required(filter_json, "filter")?)
            .map_err(|e| format!("filter: {}", e))?;
        let timeout = timeout_or(timeout_ms, repository.config().subscribe_timeout);
        let events = registry
            .runtime
            .block_on(repository.pool().subscribe_with_timeout(&relays, &filter, timeout));
        to_json(&events)
    })())
}

/// Publish a signed event (JSON) to the write relays in relays_json (NULL: cached relays).
/// timeout_ms 0 uses the configured publish timeout. Returns a JSON object
/// {event_id, successful_relays, failed_relays}, or NULL when no relay accepted. Blocks.
#[no_mangle]
pub unsafe extern "C" fn segnalibro_publish(
    relays_json: *const c_char,
    event_json: *const c_char,
    timeout_ms: c_uint,
) -> *mut c_char {
    into_c_string((|| -> Result<String, String> {
        let (registry, repository) = repository()?;
        let relays = relays_arg(relays_json, &repository)?;
        let event = required(event_json, "event")?;
        let timeout = timeout_or(timeout_ms, repository.config().publish_timeout);
        let result = registry
            .runtime
            .block_on(repository.pool().publish_event(&relays, &event, timeout))
            .map_err(|e| e.to_string())?;
        to_json(&result)
    })())
}

/// Signer reply to get_public_key. response_json: object with result (npub or hex) and
/// optional rejected. Returns the hex public key, or NULL on rejection or bad key.
#[no_mangle]
pub unsafe extern "C" fn segnalibro_signer_public_key(response_json: *const c_char) -> *mut c_char {
    into_c_string((|| -> Result<String, String> {
        let response = signer_response(response_json)?;
        parse_public_key_response(&response).map_err(|e| e.to_string())
    })())
}

/// Signer reply to sign_event. response_json: object with event (full signed event JSON) or
/// result/signature, and optional rejected. unsigned_event_json: the event sent for signing,
/// used when the signer returned only a signature (may be NULL otherwise). Returns the signed
/// event JSON, or NULL on error.
#[no_mangle]
pub unsafe extern "C" fn segnalibro_signer_signed_event(
    response_json: *const c_char,
    unsigned_event_json: *const c_char,
) -> *mut c_char {
    into_c_string((|| -> Result<String, String> {
        let response = signer_response(response_json)?;
        let unsigned = ptr_to_str(unsigned_event_json);
        let event = parse_sign_event_response(&response, unsigned.as_deref())
            .map_err(|e| e.to_string())?;
        Ok(event.to_string())
    })())
}

fn signer_response(response_json: *const c_char) -> Result<SignerResponse, String> {
    let json = required(response_json, "response")?;
    serde_json::from_str(&json).map_err(|e| format!("signer response: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(ptr: *mut c_char) -> Option<String> {
        if ptr.is_null() {
            return None;
        }
        let s = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        unsafe { segnalibro_free_string(ptr) };
        Some(s)
    }

    fn last_error() -> String {
        let p = segnalibro_last_error();
        assert!(!p.is_null());
        unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
    }

    #[test]
    fn version_is_nul_terminated() {
        let v = unsafe { CStr::from_ptr(segnalibro_version()) };
        assert_eq!(v.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn caller_relays_must_be_wss() {
        let json = r#"[{"url":"ws://plain.example"},{"url":"http://x"},{"url":"wss://a","write":false}]"#;
        let relays = parse_relays(json).unwrap();
        assert_eq!(relays, vec![RelayConfig::new("wss://a", true, false)]);
        assert!(parse_relays("{").unwrap_err().starts_with("relays:"));
    }

    #[test]
    fn signer_public_key_accepts_npub() {
        let hex = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";
        let npub = segnalibro_core::protocol::nostr::keys::hex_to_npub(hex).unwrap();
        let json = CString::new(serde_json::json!({ "result": npub }).to_string()).unwrap();
        let key = take(unsafe { segnalibro_signer_public_key(json.as_ptr()) });
        assert_eq!(key.as_deref(), Some(hex));
    }

    #[test]
    fn signer_rejection_sets_last_error() {
        let json = CString::new(r#"{"rejected":true}"#).unwrap();
        assert!(take(unsafe { segnalibro_signer_public_key(json.as_ptr()) }).is_none());
        assert!(last_error().contains("rejected"));
        assert!(take(unsafe { segnalibro_signer_public_key(ptr::null()) }).is_none());
        assert!(last_error().contains("response"));
    }

    #[test]
    fn init_uses_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = CString::new(dir.path().to_string_lossy().into_owned()).unwrap();
        assert_eq!(unsafe { segnalibro_init(path.as_ptr()) }, 0);
        let relays: Vec<RelayConfig> =
            serde_json::from_str(&take(segnalibro_cached_relays()).unwrap()).unwrap();
        assert!(!relays.is_empty());
        assert!(relays.iter().all(|r| r.url.starts_with("wss://")));
    }
}
