//! Security-token extraction from the upstream page markup.
//!
//! The upstream embeds its anti-forgery token under one of several field
//! names depending on the front-end build. The known aliases are kept as an
//! ordered table of [`TokenPattern`] records; the first record whose first
//! match is long enough wins. Adding or retiring an alias is a table edit.

use regex::{Regex, RegexBuilder};
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Captures of this length or shorter are treated as accidental matches.
pub const MIN_TOKEN_LEN: usize = 20;

/// Script blocks are only searched when they mention one of these names.
pub const SCRIPT_MARKERS: &[&str] = &["SNlM0e", "FdrFJe"];

/// One known place the token may live in the page.
#[derive(Debug, Clone, Copy)]
pub struct TokenPattern {
    pub name: &'static str,
    /// Regex with the token in capture group 1; matched case-insensitively.
    pub pattern: &'static str,
    /// Captures must be strictly longer than this many characters.
    pub min_len: usize,
}

/// Token aliases in priority order.
pub const TOKEN_PATTERNS: &[TokenPattern] = &[
    TokenPattern {
        name: "SNlM0e/json",
        pattern: r#""SNlM0e":"([^"]+)""#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "SNlM0e/single-quoted",
        pattern: r#"'SNlM0e':'([^']+)'"#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "SNlM0e/assignment",
        pattern: r#"SNlM0e["']?\s*[:=]\s*["']([^"']+)["']"#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "FdrFJe/json",
        pattern: r#""FdrFJe":"([^"]+)""#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "FdrFJe/single-quoted",
        pattern: r#"'FdrFJe':'([^']+)'"#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "FdrFJe/assignment",
        pattern: r#"FdrFJe["']?\s*[:=]\s*["']([^"']+)["']"#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "cfb2h/json",
        pattern: r#""cfb2h":"([^"]+)""#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "cfb2h/single-quoted",
        pattern: r#"'cfb2h':'([^']+)'"#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "cfb2h/assignment",
        pattern: r#"cfb2h["']?\s*[:=]\s*["']([^"']+)["']"#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "at/assignment",
        pattern: r#"at["']?\s*[:=]\s*["']([^"']{50,})["']"#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "at/json",
        pattern: r#""at":"([^"]+)""#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "token/json",
        pattern: r#""token":"([^"]+)""#,
        min_len: MIN_TOKEN_LEN,
    },
    TokenPattern {
        name: "data-token",
        pattern: r#"data-token["']?\s*=\s*["']([^"']+)["']"#,
        min_len: MIN_TOKEN_LEN,
    },
];

/// A token found in the page, with the alias that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch {
    pub pattern: &'static str,
    pub value: String,
}

fn compiled_patterns() -> &'static [(TokenPattern, Regex)] {
    static COMPILED: OnceLock<Vec<(TokenPattern, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        TOKEN_PATTERNS
            .iter()
            .map(|p| {
                let re = RegexBuilder::new(p.pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("token pattern regex is valid");
                (*p, re)
            })
            .collect()
    })
}

/// Search `text` with each pattern in priority order.
///
/// Only the first match of each pattern is considered; a short capture moves
/// on to the next pattern rather than the next match.
pub fn extract_token(text: &str) -> Option<TokenMatch> {
    for (pattern, re) in compiled_patterns() {
        let Some(value) = re.captures(text).and_then(|c| c.get(1)) else {
            continue;
        };
        if value.as_str().chars().count() > pattern.min_len {
            return Some(TokenMatch {
                pattern: pattern.name,
                value: value.as_str().to_string(),
            });
        }
    }
    None
}

/// Search each inline `<script>` block on its own, in document order.
///
/// Blocks that mention none of [`SCRIPT_MARKERS`] are skipped.
pub fn extract_from_script_blocks(html: &str) -> Option<TokenMatch> {
    let Ok(sel) = Selector::parse("script") else {
        return None;
    };
    let doc = Html::parse_document(html);

    doc.select(&sel)
        .map(|el| el.text().collect::<String>())
        .filter(|content| !content.is_empty())
        .filter(|content| SCRIPT_MARKERS.iter().any(|m| content.contains(m)))
        .find_map(|content| extract_token(&content))
}

/// Whole-page search first, then the per-script fallback.
pub fn find_token(html: &str) -> Option<TokenMatch> {
    extract_token(html).or_else(|| extract_from_script_blocks(html))
}
