//! Inline link markup for assistant messages.
//!
//! Assistant text may carry `[label](href)` links. Everything else renders
//! as plain text.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]\((.*?)\)").expect("Invalid link regex"));

/// A renderable piece of message text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Link { label: String, href: String },
}

impl Segment {
    fn text(s: &str) -> Self {
        Segment::Text {
            text: s.to_string(),
        }
    }
}

/// Split `input` into text and link segments, in order.
///
/// Empty text runs between adjacent links are dropped.
pub fn parse_markup(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in LINK_RE.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            segments.push(Segment::text(&input[last..whole.start()]));
        }
        segments.push(Segment::Link {
            label: caps.get(1).map_or("", |m| m.as_str()).to_string(),
            href: caps.get(2).map_or("", |m| m.as_str()).to_string(),
        });
        last = whole.end();
    }

    if last < input.len() {
        segments.push(Segment::text(&input[last..]));
    }
    segments
}
