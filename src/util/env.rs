//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in the binary (or rely on lazy Once).
//!
//! Getters are written against a key lookup so configuration can be loaded
//! from the process environment in production and from a map in tests.
use std::str::FromStr;
use std::sync::Once;

use crate::error::{CrawlError, Result};

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        // Fallback to the crate root so `cargo run` from a subdirectory still
        // sees the developer's .env.
        if dotenv::dotenv().is_err() {
            let candidate = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
            let _ = dotenv::from_filename(candidate);
        }
    });
}

/// Lookup over the process environment; blank values count as unset.
pub fn process_lookup(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Required value; error if missing.
pub fn env_req<L>(lookup: &L, key: &str) -> Result<String>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| CrawlError::Config(format!("missing env var {key}")))
}

/// Parsed value with default fallback. Unlike a silent fallback, a value that
/// is present but unparsable is a configuration error.
pub fn env_parse<L, T>(lookup: &L, key: &str, default: T) -> Result<T>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match env_parse_opt(lookup, key)? {
        Some(v) => Ok(v),
        None => Ok(default),
    }
}

/// Optional parsed value.
pub fn env_parse_opt<L, T>(lookup: &L, key: &str) -> Result<Option<T>>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CrawlError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(None),
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag<L>(lookup: &L, key: &str, default: bool) -> bool
where
    L: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => {
            let v = raw.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "on" | "yes")
        }
        None => default,
    }
}
