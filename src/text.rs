//! Dialogue string transcoding.
//!
//! Raw strings are what the game stores: engine control codes, a marker
//! character instead of spaces, and an optional speaker header framed as
//! `\h(HEADER)BODY\e`. Visible strings are what a writer edits.
//!
//! The two directions use separate rule tables. Several visible rules map
//! to the empty string (`\h`, `\e`, `\c`, the full-width space); those have
//! no raw counterpart, so `to_raw(to_visible(s))` is not `s` in general.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Opens a speaker header.
pub const HEAD_OPEN: &str = "\\h(";
/// Closes a speaker header.
pub const HEAD_CLOSE: char = ')';
/// Terminates a framed dialogue string.
pub const BODY_END: &str = "\\e";
/// Stands for a plain space in raw text.
pub const LITERAL_SPACE: &str = "_";
/// Ideographic space; a header made of only this glyph is present but empty.
pub const FULL_WIDTH_SPACE: &str = "\u{3000}";
pub const ELLIPSIS: &str = "\u{2026}";

/// One literal substitution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rule {
    pub from: &'static str,
    pub to: &'static str,
}

/// Raw to visible, applied in order.
pub static VISIBLE_RULES: [Rule; 7] = [
    Rule { from: "\\h", to: "" },
    Rule { from: "\\e", to: "" },
    Rule { from: "\\c", to: "" },
    Rule { from: "\\n", to: "\n" },
    Rule { from: LITERAL_SPACE, to: " " },
    Rule { from: ELLIPSIS, to: "..." },
    Rule { from: FULL_WIDTH_SPACE, to: "" },
];

/// Visible to raw, applied in order. Only the visible rules with a
/// non-empty replacement have an entry here.
pub static RAW_RULES: [Rule; 3] = [
    Rule { from: "...", to: ELLIPSIS },
    Rule { from: " ", to: LITERAL_SPACE },
    Rule { from: "\n", to: "\\n" },
];

fn apply(rules: &[Rule], input: &str) -> String {
    rules
        .iter()
        .fold(input.to_string(), |text, rule| text.replace(rule.from, rule.to))
}

/// Converts a raw string into its visible form.
pub fn to_visible(raw: &str) -> String {
    apply(&VISIBLE_RULES, raw)
}

/// Converts a visible string back into raw form. Lossy; see module docs.
pub fn to_raw(visible: &str) -> String {
    apply(&RAW_RULES, visible)
}

/// Speaker header and dialogue body of a raw string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadBody {
    pub has_header: bool,
    pub header: String,
    pub body: String,
}

impl HeadBody {
    pub fn new(has_header: bool, header: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            has_header,
            header: header.into(),
            body: body.into(),
        }
    }

    pub fn join(&self) -> String {
        join_head_body(self.has_header, &self.header, &self.body)
    }
}

/// Splits a raw `\h(HEADER)BODY\e` string.
///
/// `\h()` means no header; `\h(　)` means a header that is present but
/// empty. Strings without the opening frame are all body. A missing
/// closing parenthesis degrades to an empty header with the remainder as
/// body.
pub fn split_head_body(raw: &str) -> HeadBody {
    let inner = raw.strip_suffix(BODY_END).unwrap_or(raw);
    let Some(rest) = inner.strip_prefix(HEAD_OPEN) else {
        return HeadBody::new(false, "", inner);
    };
    let Some(close) = rest.find(HEAD_CLOSE) else {
        debug!(raw, "unterminated dialogue header, keeping remainder as body");
        return HeadBody::new(false, "", rest);
    };
    let header = &rest[..close];
    let body = &rest[close + HEAD_CLOSE.len_utf8()..];
    if header.is_empty() {
        HeadBody::new(false, "", body)
    } else if header == FULL_WIDTH_SPACE {
        HeadBody::new(true, "", body)
    } else {
        HeadBody::new(true, header, body)
    }
}

/// Inverse of [`split_head_body`] for framed strings.
///
/// The header is ignored when `has_header` is false.
pub fn join_head_body(has_header: bool, header: &str, body: &str) -> String {
    let mut raw = String::with_capacity(HEAD_OPEN.len() + header.len() + body.len() + 4);
    raw.push_str(HEAD_OPEN);
    if has_header {
        if header.is_empty() {
            raw.push_str(FULL_WIDTH_SPACE);
        } else {
            raw.push_str(header);
        }
    }
    raw.push(HEAD_CLOSE);
    raw.push_str(body);
    raw.push_str(BODY_END);
    raw
}

/// Splits a raw dialogue string and converts both parts to visible text.
pub fn dialogue_to_visible(raw: &str) -> HeadBody {
    let parts = split_head_body(raw);
    HeadBody {
        has_header: parts.has_header,
        header: to_visible(&parts.header),
        body: to_visible(&parts.body),
    }
}

/// Converts visible dialogue parts back into one framed raw string.
pub fn dialogue_to_raw(visible: &HeadBody) -> String {
    join_head_body(
        visible.has_header,
        &to_raw(&visible.header),
        &to_raw(&visible.body),
    )
}

#[cfg(test)]
#[path = "tests/text_tests.rs"]
mod tests;
