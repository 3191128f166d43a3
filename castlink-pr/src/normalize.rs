//! Product code normalization
//!
//! Every ASP renders the same title's product code differently: wrapped in a
//! storefront prefix (`FANZA-gvh00802`), fused with a leading studio/series
//! marker (`425bdsx-01902`), with or without a hyphen, with or without
//! zero-padding. External performer indexes key their pages on the canonical
//! rendering, so resolution starts by expanding an arbitrary as-crawled code
//! into every plausible canonical form.
//!
//! The expansion is an ordered table of `(pattern, expansion)` rules. Order
//! matters downstream: earlier variants are more specific and are tried
//! first by the resolver. Adding support for a new ASP convention means
//! adding a rule row, not editing control flow.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Storefront wrapper prefixes stripped before the pattern rules apply.
///
/// These are catalog names fused onto the real product code by specific
/// ASPs, not part of any studio's own numbering scheme.
const WRAPPER_PREFIXES: &[&str] = &["FANZA-", "DMM-", "MGS-", "DUGA-", "SOKMIL-"];

/// One normalization rule: when `pattern` matches a candidate code,
/// `expand` yields further canonical renderings to try, best-first.
struct CodeRule {
    name: &'static str,
    pattern: Regex,
    expand: fn(&Captures) -> Vec<String>,
}

static CODE_RULES: Lazy<Vec<CodeRule>> = Lazy::new(|| {
    vec![
        // Letters fused or hyphenated with digits: GVH00802 -> GVH-802, GVH-00802
        CodeRule {
            name: "letter-digit-split",
            pattern: Regex::new(r"^([A-Z]+)-?([0-9]+)$").expect("valid letter-digit rule"),
            expand: |caps| hyphen_split_forms(&caps[1], &caps[2]),
        },
        // Leading 2-3 digit studio/series marker fused to the code:
        // 425BDSX-01902 -> BDSX-1902, BDSX-01902
        CodeRule {
            name: "numeric-prefix-split",
            pattern: Regex::new(r"^([0-9]{2,3})([A-Z]+)-?([0-9]+)$")
                .expect("valid numeric-prefix rule"),
            expand: |caps| hyphen_split_forms(&caps[2], &caps[3]),
        },
    ]
});

/// Hyphenated renderings for a letters/digits pair, zero-stripped form first.
fn hyphen_split_forms(letters: &str, digits: &str) -> Vec<String> {
    let stripped = digits.trim_start_matches('0');
    let stripped = if stripped.is_empty() { "0" } else { stripped };

    let mut forms = vec![format!("{letters}-{stripped}")];
    if stripped != digits {
        forms.push(format!("{letters}-{digits}"));
    }
    forms
}

fn strip_wrapper_prefix(code: &str) -> Option<String> {
    for prefix in WRAPPER_PREFIXES {
        if let Some(rest) = code.strip_prefix(prefix) {
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

fn push_unique(out: &mut Vec<String>, candidate: String) {
    if !out.contains(&candidate) {
        out.push(candidate);
    }
}

/// Expand an as-crawled ASP product code into canonical search variants,
/// most specific first, duplicates removed in first-seen order.
///
/// Deterministic and never fails; an empty/whitespace code yields no
/// variants.
pub fn variants(asp_code: &str) -> Vec<String> {
    let identity = asp_code.trim().to_ascii_uppercase();
    if identity.is_empty() {
        return Vec::new();
    }

    // Seed codes: the identity form, then the wrapper-stripped form.
    let mut seeds = vec![identity];
    if let Some(stripped) = strip_wrapper_prefix(&seeds[0]) {
        seeds.push(stripped);
    }

    let mut out: Vec<String> = Vec::new();
    for seed in &seeds {
        push_unique(&mut out, seed.clone());
        for rule in CODE_RULES.iter() {
            if let Some(caps) = rule.pattern.captures(seed) {
                tracing::trace!(code = %seed, rule = rule.name, "Code rule matched");
                for form in (rule.expand)(&caps) {
                    push_unique(&mut out, form);
                }
            }
        }
    }

    // Hyphen-absent rendering of every candidate gathered so far. The
    // hyphen-present renderings of fused codes are produced by the rules.
    for i in 0..out.len() {
        if out[i].contains('-') {
            let collapsed = out[i].replace('-', "");
            push_unique(&mut out, collapsed);
        }
    }

    out
}
