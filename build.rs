// build.rs

//! Compiles `locales/<lang>.toml` into the `t!` macro.
//!
//! The language is picked from a `lang_*` feature, then `CREF_LANG`, then
//! English. Missing keys fall back to English. A translation whose
//! `{placeholders}` differ from the English message fails the build, since
//! every message is used as a `format!` string.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::Path;

const FALLBACK_LANG: &str = "en";

type Messages = BTreeMap<String, String>;

fn main() {
    println!("cargo:rerun-if-env-changed=CREF_LANG");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=locales/");

    let lang = selected_language();
    println!("cargo:rustc-env=CREF_LANG_EFFECTIVE={}", lang);

    let mut messages = load_messages(FALLBACK_LANG)
        .unwrap_or_else(|| panic!("locales/{}.toml is required", FALLBACK_LANG));

    if lang != FALLBACK_LANG {
        match load_messages(&lang) {
            Some(translated) => {
                check_placeholders(&lang, &messages, &translated);
                messages.extend(translated);
            }
            None => println!(
                "cargo:warning=locales/{}.toml not found. Using '{}'.",
                lang, FALLBACK_LANG
            ),
        }
    }

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let dest_path = Path::new(&out_dir).join("translations.rs");
    fs::write(&dest_path, render_macro(&messages)).expect("failed to write translations.rs");
}

fn selected_language() -> String {
    let features: BTreeSet<String> = env::vars()
        .filter_map(|(key, _)| {
            key.strip_prefix("CARGO_FEATURE_LANG_")
                .map(str::to_lowercase)
        })
        .collect();

    if features.len() > 1 {
        println!(
            "cargo:warning=Several language features enabled ({:?}); using the first.",
            features
        );
    }
    features
        .into_iter()
        .next()
        .or_else(|| env::var("CREF_LANG").ok())
        .unwrap_or_else(|| FALLBACK_LANG.to_string())
}

fn load_messages(lang: &str) -> Option<Messages> {
    let path = format!("locales/{}.toml", lang);
    let content = fs::read_to_string(&path).ok()?;
    let messages = toml::from_str(&content)
        .unwrap_or_else(|e| panic!("{} is not a flat table of strings: {}", path, e));
    Some(messages)
}

fn placeholders(message: &str) -> BTreeSet<&str> {
    message
        .split('{')
        .skip(1)
        .filter_map(|rest| rest.split_once('}').map(|(name, _)| name))
        .collect()
}

fn check_placeholders(lang: &str, fallback: &Messages, translated: &Messages) {
    for (key, message) in translated {
        let Some(english) = fallback.get(key) else {
            panic!("locales/{}.toml has '{}', which English lacks", lang, key);
        };
        if placeholders(english) != placeholders(message) {
            panic!(
                "locales/{}.toml: '{}' must use the placeholders {:?}",
                lang,
                key,
                placeholders(english)
            );
        }
    }
}

fn render_macro(messages: &Messages) -> String {
    let mut code = String::from("#[macro_export]\nmacro_rules! t {\n");
    for (key, message) in messages {
        code.push_str(&format!("    ({:?}) => {{ {:?} }};\n", key, message));
    }
    // Unknown keys fail the build instead of printing nothing at runtime.
    code.push_str(
        "    ($key:expr) => {{ compile_error!(concat!(\"Missing translation key: \", $key)) }};\n",
    );
    code.push_str("}\n");
    code
}
