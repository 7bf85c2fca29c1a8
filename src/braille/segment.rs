//! Text/math segmentation.
//!
//! Delimited math (`$$…$$`, `\[…\]`, `$…$`, `\(…\)`) is found first; the
//! prose between matches is then scanned line by line for bare equations.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Text,
    Math,
}

/// One run of prose or math from the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,

    /// Source text as it appeared, delimiters included
    pub original: String,

    /// Text to translate: trimmed prose, or the math without delimiters
    pub content: String,

    /// Display math (`$$` or `\[`) rather than inline
    #[serde(default)]
    pub display: bool,
}

impl Segment {
    pub fn text(original: &str) -> Self {
        Self {
            kind: SegmentKind::Text,
            original: original.to_string(),
            content: original.trim().to_string(),
            display: false,
        }
    }

    pub fn math(original: &str, content: &str, display: bool) -> Self {
        Self {
            kind: SegmentKind::Math,
            original: original.to_string(),
            content: content.trim().to_string(),
            display,
        }
    }

    pub fn is_math(&self) -> bool {
        self.kind == SegmentKind::Math
    }
}

/// Delimiter patterns in scan order, with whether each is display math
fn delimiters() -> &'static [(Regex, bool)] {
    static RE: OnceLock<Vec<(Regex, bool)>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            (r"(?s)\$\$(.+?)\$\$", true),
            (r"(?s)\\\[(.+?)\\\]", true),
            (r"\$([^$\n]+?)\$", false),
            (r"(?s)\\\((.+?)\\\)", false),
        ]
        .into_iter()
        .map(|(pattern, display)| {
            (
                Regex::new(pattern).expect("math delimiter regex must compile"),
                display,
            )
        })
        .collect()
    })
}

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(?:\([A-Za-z, ]*\))?\s*=\s*\S")
            .expect("assignment regex must compile")
    })
}

fn exponent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9)\]}]\s*\^\s*[A-Za-z0-9(\[{\\-]")
            .expect("exponent regex must compile")
    })
}

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:sin|cos|tan|cot|sec|csc|log|ln|exp|sqrt|abs)\s*\(")
            .expect("function regex must compile")
    })
}

fn arithmetic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9\s.,+\-*/=()<>%^]*[0-9][0-9\s.,()]*[+\-*/=<>^][0-9\s.,+\-*/=()<>%^]*$")
            .expect("arithmetic regex must compile")
    })
}

fn latex_macro_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\\(?:[dt]?frac|sqrt|times|cdot|div|pm|leq?|geq?|neq?|approx|infty|sum|int|pi|alpha|beta|gamma|delta|theta|lambda|mu|sigma|omega|Delta)\b",
        )
        .expect("latex macro regex must compile")
    })
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\p{L}{2,}\b").expect("word regex must compile"))
}

/// Lines with more words than this read as prose
const MAX_WORDS_IN_EQUATION: usize = 6;

const MATH_GLYPHS: &[char] = &['×', '÷', '±', '≤', '≥', '≠', '√', '∑', '∫', '∞', 'π', '≈'];

/// Heuristic for an undelimited equation on its own line
pub fn is_math_line(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    if word_re().find_iter(line).count() > MAX_WORDS_IN_EQUATION {
        return false;
    }

    assignment_re().is_match(line)
        || exponent_re().is_match(line)
        || line.contains(MATH_GLYPHS)
        || function_re().is_match(line)
        || arithmetic_re().is_match(line)
        || latex_macro_re().is_match(line)
}

/// Split input into ordered text and math segments.
///
/// Matches that overlap an earlier-accepted one are discarded, so `$$…$$`
/// wins over the `$…$` found inside it. Empty prose is dropped.
pub fn segment(input: &str) -> Vec<Segment> {
    let mut accepted: Vec<(Range<usize>, Range<usize>, bool)> = Vec::new();
    for (re, display) in delimiters() {
        let mut at = 0;
        while let Some(caps) = re.captures_at(input, at) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            let overlaps = accepted
                .iter()
                .any(|(r, _, _)| whole.start() < r.end && r.start < whole.end());
            if overlaps {
                // Retry just past the rejected opening delimiter
                let skip = input[whole.start()..].chars().next().map_or(1, char::len_utf8);
                at = whole.start() + skip;
            } else {
                accepted.push((whole.range(), inner.range(), *display));
                at = whole.end();
            }
        }
    }
    accepted.sort_by_key(|(r, _, _)| r.start);

    let mut segments = Vec::new();
    let mut cursor = 0;
    for (whole, inner, display) in accepted {
        split_prose(&input[cursor..whole.start], &mut segments);
        segments.push(Segment::math(&input[whole.clone()], &input[inner], display));
        cursor = whole.end;
    }
    split_prose(&input[cursor..], &mut segments);
    segments
}

/// Re-scan prose line by line, lifting bare equations into math segments
fn split_prose(prose: &str, out: &mut Vec<Segment>) {
    fn flush(pending: &mut Vec<&str>, out: &mut Vec<Segment>) {
        let joined = pending.join("\n");
        if !joined.trim().is_empty() {
            out.push(Segment::text(&joined));
        }
        pending.clear();
    }

    let mut pending: Vec<&str> = Vec::new();
    for line in prose.split('\n') {
        if is_math_line(line) {
            flush(&mut pending, out);
            out.push(Segment::math(line, line, false));
        } else {
            pending.push(line);
        }
    }
    flush(&mut pending, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(segments: &[Segment]) -> Vec<SegmentKind> {
        segments.iter().map(|s| s.kind).collect()
    }

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_inline_math_between_prose() {
        let segments = segment("Force is $F = ma$ where F is force.");
        assert_eq!(
            kinds(&segments),
            vec![SegmentKind::Text, SegmentKind::Math, SegmentKind::Text]
        );
        assert_eq!(segments[0].content, "Force is");
        assert_eq!(segments[1].content, "F = ma");
        assert_eq!(segments[1].original, "$F = ma$");
        assert_eq!(segments[2].content, "where F is force.");
    }

    #[test]
    fn test_all_delimiters() {
        let segments = segment(r"A $$x^2$$ B \[y\] C $z$ D \(w\) E");
        assert_eq!(segments.len(), 9);
        let math: Vec<(&str, bool)> = segments
            .iter()
            .filter(|s| s.is_math())
            .map(|s| (s.content.as_str(), s.display))
            .collect();
        assert_eq!(
            math,
            vec![("x^2", true), ("y", true), ("z", false), ("w", false)]
        );
    }

    #[test]
    fn test_display_math_wins_over_inline() {
        let segments = segment("$$a + b$$");
        assert_eq!(segments.len(), 1);
        assert!(segments[0].display);
        assert_eq!(segments[0].content, "a + b");
    }

    #[test]
    fn test_bare_equation_lines_are_lifted() {
        let input = "Newton said:\nF = m * a\nwhich is famous.";
        let segments = segment(input);
        assert_eq!(
            kinds(&segments),
            vec![SegmentKind::Text, SegmentKind::Math, SegmentKind::Text]
        );
        assert_eq!(segments[1].content, "F = m * a");
    }

    #[test]
    fn test_segmentation_is_lossless() {
        let input = "Intro line\n\nArea is $\\pi r^2$.\ny = 2x + 1\nDone $$\\frac{1}{2}$$ end";
        let joined: String = segment(input)
            .iter()
            .map(|s| s.original.as_str())
            .collect();
        assert_eq!(squash(&joined), squash(input));
    }

    #[test]
    fn test_empty_prose_dropped() {
        let segments = segment("  $x$  ");
        assert_eq!(kinds(&segments), vec![SegmentKind::Math]);
        assert!(segment("").is_empty());
    }

    #[test]
    fn test_math_line_heuristic() {
        assert!(is_math_line("y = mx + b"));
        assert!(is_math_line("f(x) = x + 1"));
        assert!(is_math_line("x^2 + y^2"));
        assert!(is_math_line("2 + 3 = 5"));
        assert!(is_math_line("sin(x) + cos(x)"));
        assert!(is_math_line("a ≤ b"));
        assert!(is_math_line(r"\frac{1}{2}"));

        assert!(!is_math_line("where F is force."));
        assert!(!is_math_line("The year 1990 was long ago."));
        assert!(!is_math_line("In 2020 there were many reasons to say x = 1 was fine"));
        assert!(!is_math_line(""));
    }
}
