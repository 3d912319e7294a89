// i18n.rs
//
// Runtime string table for the viewer shell and its log lines.
// - Translations live in assets/i18n/<lang>.json next to the executable or in
//   the working directory; format: { "key": "value" }
// - English is compiled in and always acts as the fallback
// - Lookup: tr("key") / tr_with("key", &[("name", ...)]) with {name} placeholders
//
// Language selection: --lang=<code>, then EQUIRECT_LANG, then en.

use once_cell::sync::{Lazy, OnceCell};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const DEFAULT_LANG: &str = "en";
pub const LANG_ENV: &str = "EQUIRECT_LANG";

/// (code, native name) pairs offered in the language menu.
pub const LANGUAGES: [(&str, &str); 3] = [("en", "English"), ("zh-Hans", "简体中文"), ("ja", "日本語")];

static EMBEDDED_EN: &str = include_str!("../assets/i18n/en.json");

static FALLBACK: Lazy<HashMap<String, String>> = Lazy::new(|| {
    serde_json::from_str(EMBEDDED_EN).unwrap_or_else(|e| {
        log::error!("embedded English strings are malformed: {e}");
        HashMap::new()
    })
});

#[derive(Debug, Clone)]
struct Strings {
    lang: String,
    map: HashMap<String, String>,
}

static STRINGS: OnceCell<RwLock<Strings>> = OnceCell::new();

fn load_json_map(path: &Path) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(map) => Some(map),
        Err(e) => {
            log::warn!("ignoring {}: {e}", path.display());
            None
        }
    }
}

/// <exe_dir>/assets/i18n/<lang>.json, then ./assets/i18n/<lang>.json
fn find_lang_file(lang: &str) -> Option<PathBuf> {
    let rel = Path::new("assets").join("i18n").join(format!("{lang}.json"));

    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&rel)));

    beside_exe.into_iter().chain([rel.clone()]).find(|p| p.exists())
}

fn load_lang(lang: &str) -> HashMap<String, String> {
    find_lang_file(lang)
        .and_then(|p| load_json_map(&p))
        .unwrap_or_default()
}

/// Switches the active language. Safe to call again from the language menu.
pub fn init(lang: impl Into<String>) {
    let lang = lang.into();
    let map = if lang == DEFAULT_LANG {
        HashMap::new()
    } else {
        load_lang(&lang)
    };
    if map.is_empty() && lang != DEFAULT_LANG {
        log::info!("no strings for {lang}, using English");
    }
    let strings = Strings { lang, map };

    match STRINGS.get() {
        Some(lock) => {
            if let Ok(mut w) = lock.write() {
                *w = strings;
            }
        }
        None => {
            let _ = STRINGS.set(RwLock::new(strings));
        }
    }
}

pub fn current_lang() -> String {
    STRINGS
        .get()
        .and_then(|l| l.read().ok().map(|s| s.lang.clone()))
        .unwrap_or_else(|| DEFAULT_LANG.to_string())
}

/// Localised text for `key`; the key itself when no table has it.
pub fn tr(key: &str) -> String {
    let active = STRINGS
        .get()
        .and_then(|l| l.read().ok())
        .and_then(|s| s.map.get(key).cloned());

    active
        .or_else(|| FALLBACK.get(key).cloned())
        .unwrap_or_else(|| key.to_string())
}

/// `tr` with `{name}` placeholders substituted; unknown placeholders stay as-is.
pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    let mut s = tr(key);
    for (k, v) in args {
        s = s.replace(&format!("{{{k}}}"), v);
    }
    s
}

/// Language requested on the command line, then the environment, then English.
pub fn resolve_lang(requested: Option<&str>) -> String {
    if let Some(lang) = requested.filter(|l| !l.trim().is_empty()) {
        return lang.to_string();
    }
    match std::env::var(LANG_ENV) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => DEFAULT_LANG.to_string(),
    }
}
