// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # XDG-style directory resolution
//!
//! Resolves the data, cache, and log directories from `XDG_*` environment
//! variables with `${HOME}/.local/share`, `${HOME}/.cache`, `<data>/logs`
//! fallbacks, all suffixed with the application name (§6). Grounded on
//! `wolf/conf.py`'s `get_dir`.

use std::path::PathBuf;

const APP_NAME: &str = "meshd";

fn get_dir(xdg_key: &str, fallback: &str) -> PathBuf {
    let path = std::env::var(format!("XDG_{xdg_key}"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(fallback)
        });
    path.join(APP_NAME)
}

pub fn data_dir() -> PathBuf {
    get_dir("DATA_HOME", ".local/share")
}

pub fn cache_dir() -> PathBuf {
    get_dir("CACHE_HOME", ".cache")
}

pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// The pidfile path for a given port: `<cache>/server-<port>.pid` (§4.9, §6).
pub fn pidfile_path(port: u16) -> PathBuf {
    cache_dir().join(format!("server-{port}.pid"))
}

/// Creates the data, cache, and log directories if they do not already
/// exist.
pub fn create_dirs() -> std::io::Result<()> {
    for path in [data_dir(), cache_dir(), log_dir()] {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
