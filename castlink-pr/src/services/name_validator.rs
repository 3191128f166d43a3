//! Candidate performer-name validation and canonicalization
//!
//! Crawlers and free-text matches hand this pipeline raw strings; many are
//! marketing words, UI tokens, or page furniture rather than names. The
//! validator is the single gate every candidate passes before it may touch
//! the performer registry. A lookup-cache hit is never trusted without
//! re-validation.
//!
//! All bounds and token lists are configuration, not code: sources differ in
//! what garbage they emit, and new denylist entries must not require a
//! recompile.

use serde::Deserialize;
use std::collections::HashSet;

/// Marketing/category tokens that are never performer names.
///
/// Default seed list; deployments extend it in castlink.toml.
const DEFAULT_DENYLIST: &[&str] = &[
    "素人",
    "ナンパ",
    "企画",
    "AV",
    "サンプル",
    "ランキング",
    "人気順",
    "新着順",
    "次のページ",
    "前のページ",
    "もっと見る",
    "アダルト",
    "動画",
];

/// Tunable validation bounds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Minimum name length in characters
    pub min_chars: usize,
    /// Maximum name length in characters
    pub max_chars: usize,
    /// Exact-match rejection tokens (checked after whitespace canonicalization)
    pub denylist: Vec<String>,
    /// Full-name heuristic: minimum length for an all-kanji name
    pub full_name_min_kanji: usize,
    /// Full-name heuristic: minimum length for any other script
    pub full_name_min_other: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_chars: 2,
            max_chars: 30,
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            full_name_min_kanji: 3,
            full_name_min_other: 4,
        }
    }
}

/// Validates and canonicalizes candidate performer names
pub struct NameValidator {
    config: ValidatorConfig,
    denylist: HashSet<String>,
}

impl NameValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        let denylist = config.denylist.iter().cloned().collect();
        Self { config, denylist }
    }

    /// Canonicalize a raw candidate, or reject it.
    ///
    /// Canonicalization unifies full-width/half-width spacing, collapses
    /// whitespace runs, and trims. Idempotent: normalizing an already
    /// normalized name returns it unchanged.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let canonical = canonical_spacing(raw);
        if self.accepts(&canonical) {
            Some(canonical)
        } else {
            None
        }
    }

    /// Whether a candidate survives validation
    pub fn is_valid(&self, candidate: &str) -> bool {
        self.normalize(candidate).is_some()
    }

    /// Full-name heuristic for uncorroborated free-text matches.
    ///
    /// A spaced name is trusted; an unspaced all-kanji name needs
    /// `full_name_min_kanji` characters; anything else needs
    /// `full_name_min_other`. Precision/recall trade-off, thresholds are
    /// configuration.
    pub fn is_full_name(&self, name: &str) -> bool {
        let name = canonical_spacing(name);
        if name.contains(' ') {
            return true;
        }
        let chars = name.chars().count();
        if name.chars().all(is_kanji) {
            chars >= self.config.full_name_min_kanji
        } else {
            chars >= self.config.full_name_min_other
        }
    }

    fn accepts(&self, canonical: &str) -> bool {
        let chars = canonical.chars().count();
        if chars < self.config.min_chars || chars > self.config.max_chars {
            return false;
        }
        if self.denylist.contains(canonical) {
            return false;
        }
        // Names are kana/kanji or Latin letters plus a few joiners; anything
        // else (digits, markup, UI glyphs) marks a non-name token.
        canonical.chars().all(is_name_char)
    }
}

impl Default for NameValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

/// Unify full-width spacing, collapse runs, trim
fn canonical_spacing(raw: &str) -> String {
    raw.replace('\u{3000}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_kanji(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '々')
}

fn is_kana(c: char) -> bool {
    matches!(c, '\u{3041}'..='\u{3096}' | '\u{30A1}'..='\u{30FA}' | 'ー')
}

fn is_name_char(c: char) -> bool {
    is_kanji(c)
        || is_kana(c)
        || c.is_ascii_alphabetic()
        || matches!(c, ' ' | '・' | '-' | '.' | '\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylisted_token_is_rejected() {
        let v = NameValidator::default();
        assert!(!v.is_valid("素人"));
        assert!(!v.is_valid("ランキング"));
    }

    #[test]
    fn too_short_name_is_rejected() {
        let v = NameValidator::default();
        assert!(!v.is_valid("A"));
        assert!(!v.is_valid(""));
    }

    #[test]
    fn plain_kana_name_is_accepted() {
        let v = NameValidator::default();
        assert!(v.is_valid("まゆみ"));
        assert_eq!(v.normalize("まゆみ"), Some("まゆみ".to_string()));
    }

    #[test]
    fn markup_and_digits_are_rejected() {
        let v = NameValidator::default();
        assert!(!v.is_valid("<b>さくら</b>"));
        assert!(!v.is_valid("さくら(19)"));
        assert!(!v.is_valid("page2"));
    }

    #[test]
    fn over_long_name_is_rejected() {
        let v = NameValidator::default();
        let long = "あ".repeat(31);
        assert!(!v.is_valid(&long));
    }

    #[test]
    fn fullwidth_space_is_unified() {
        let v = NameValidator::default();
        assert_eq!(
            v.normalize("橋本　ありな"),
            Some("橋本 ありな".to_string())
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let v = NameValidator::default();
        for raw in ["  三上　悠亜 ", "Julia Boin", "まゆみ", "橋本　 ありな"] {
            let once = v.normalize(raw).unwrap();
            let twice = v.normalize(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn full_name_heuristic() {
        let v = NameValidator::default();
        // Spaced names are always full names
        assert!(v.is_full_name("橋本 ありな"));
        assert!(v.is_full_name("橋本　ありな"));
        // All-kanji needs three characters
        assert!(v.is_full_name("三上悠亜"));
        assert!(!v.is_full_name("悠亜"));
        // Other scripts need four
        assert!(v.is_full_name("ありなちゃん"));
        assert!(!v.is_full_name("まゆみ"));
    }

    #[test]
    fn custom_bounds_are_honored() {
        let config = ValidatorConfig {
            min_chars: 3,
            ..ValidatorConfig::default()
        };
        let v = NameValidator::new(config);
        assert!(!v.is_valid("ゆあ"));
        assert!(v.is_valid("まゆみ"));
    }
}
