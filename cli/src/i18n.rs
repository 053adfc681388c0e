//! CLI message catalog
//!
//! Strings live in Fluent files under `locales/`; only English ships today.

use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::sync::OnceLock;
use unic_langid::LanguageIdentifier;

const EN_MESSAGES: &str = include_str!("../locales/en/main.ftl");

static BUNDLE: OnceLock<FluentBundle<FluentResource>> = OnceLock::new();

fn bundle() -> &'static FluentBundle<FluentResource> {
    BUNDLE.get_or_init(|| {
        let langid: LanguageIdentifier = "en-US".parse().unwrap_or_default();
        let mut bundle = FluentBundle::new_concurrent(vec![langid]);
        // Plain strings, no bidi isolation marks around placeables
        bundle.set_use_isolating(false);
        match FluentResource::try_new(EN_MESSAGES.to_string()) {
            Ok(resource) | Err((resource, _)) => {
                if let Err(errors) = bundle.add_resource(resource) {
                    tracing::warn!("Duplicate messages in catalog: {:?}", errors);
                }
            }
        }
        bundle
    })
}

fn format(id: &str, args: Option<&FluentArgs>) -> String {
    let bundle = bundle();
    let Some(pattern) = bundle.get_message(id).and_then(|msg| msg.value()) else {
        return id.to_string();
    };
    let mut errors = vec![];
    bundle.format_pattern(pattern, args, &mut errors).to_string()
}

/// Message for `id`, or `id` itself when the catalog has no such entry
pub fn t(id: &str) -> String {
    format(id, None)
}

/// Message for `id` with named arguments
pub fn t_args(id: &str, args: &[(&str, &str)]) -> String {
    let mut fluent_args = FluentArgs::new();
    for (key, value) in args {
        fluent_args.set(*key, *value);
    }
    format(id, Some(&fluent_args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_lookup() {
        assert_eq!(t("version-title"), "WordGuard");
    }

    #[test]
    fn test_lookup_with_args() {
        let result = t_args("list-added", &[("value", "nsfw"), ("list", "explicit words")]);
        assert_eq!(
            result,
            "Added 'nsfw' to explicit words"
        );
    }

    #[test]
    fn test_missing_key_returns_id() {
        assert_eq!(t("nonexistent-key"), "nonexistent-key");
    }

    #[test]
    fn test_decision_labels() {
        assert_eq!(t("check-allowed"), "ALLOWED");
        assert_eq!(t("check-blocked"), "BLOCKED");
    }
}
