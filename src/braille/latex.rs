//! LaTeX cleanup and input normalization.
//!
//! The Nemeth primitive only understands plain ASCII math, so every math
//! segment goes through [`clean_latex`] first.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Math glyphs: (glyph, LaTeX spelling, plain ASCII spelling)
const GLYPHS: &[(char, &str, &str)] = &[
    ('×', r"\times", "*"),
    ('·', r"\cdot", "*"),
    ('÷', r"\div", "/"),
    ('−', "-", "-"),
    ('±', r"\pm", "+-"),
    ('≤', r"\leq", "<="),
    ('≥', r"\geq", ">="),
    ('≠', r"\neq", "!="),
    ('≈', r"\approx", "~"),
    ('→', r"\to", "->"),
    ('∞', r"\infty", "infinity"),
    ('√', r"\sqrt", "sqrt"),
    ('∑', r"\sum", "sum"),
    ('∫', r"\int", "integral"),
    ('π', r"\pi", "pi"),
    ('θ', r"\theta", "theta"),
    ('α', r"\alpha", "alpha"),
    ('β', r"\beta", "beta"),
    ('λ', r"\lambda", "lambda"),
    ('μ', r"\mu", "mu"),
    ('Δ', r"\Delta", "Delta"),
    ('°', r"^\circ", " degrees"),
];

fn text_macro_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\\(?:text|mathrm|mathbf|mathit|operatorname)\s*\{([^{}]*)\}")
            .expect("text macro regex must compile")
    })
}

fn frac_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\\[dt]?frac\s*\{([^{}]*)\}\s*\{([^{}]*)\}").expect("frac regex must compile")
    })
}

fn sqrt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\sqrt\s*\{([^{}]*)\}").expect("sqrt regex must compile"))
}

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([_^])\{([^{}]*)\}").expect("script regex must compile"))
}

fn degree_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\^\s*(?:\{\s*\\circ\s*\}|\\circ)").expect("degree regex must compile")
    })
}

fn spacing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\[,;:! ]").expect("spacing regex must compile"))
}

fn macro_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\([A-Za-z]+)").expect("macro regex must compile"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex must compile"))
}

fn inline_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("inline space regex must compile"))
}

/// Plain-ASCII replacement for a LaTeX macro name
fn macro_replacement(name: &str) -> &str {
    match name {
        "times" | "cdot" | "ast" => "*",
        "div" => "/",
        "pm" => "+-",
        "mp" => "-+",
        "leq" | "le" => "<=",
        "geq" | "ge" => ">=",
        "neq" | "ne" => "!=",
        "approx" | "sim" => "~",
        "to" | "rightarrow" => "->",
        "infty" => "infinity",
        "ldots" | "cdots" | "dots" => "...",
        "left" | "right" | "displaystyle" | "quad" | "qquad" => "",
        "circ" => " degrees",
        "int" => "integral",
        // Greek letters and function names read as their own names
        other => other,
    }
}

/// Rewrite a LaTeX math expression into plain ASCII.
///
/// Fractions become `(a)/(b)`, roots `sqrt(x)`, degree marks ` degrees`,
/// operator macros their ASCII symbols and every other macro its bare name.
/// Braces and stray backslashes are dropped and whitespace collapsed.
pub fn clean_latex(math: &str) -> String {
    let mut s = text_macro_re().replace_all(math, "$1").into_owned();
    s = degree_re().replace_all(&s, " degrees").into_owned();

    // Innermost groups first, until nothing changes
    loop {
        let next = frac_re().replace_all(&s, "($1)/($2)").into_owned();
        let next = sqrt_re().replace_all(&next, "sqrt($1)").into_owned();
        let next = script_re()
            .replace_all(&next, |caps: &Captures| {
                let body = caps[2].trim();
                if body.chars().count() <= 1 {
                    format!("{}{}", &caps[1], body)
                } else {
                    format!("{}({})", &caps[1], body)
                }
            })
            .into_owned();
        if next == s {
            break;
        }
        s = next;
    }

    s = spacing_re().replace_all(&s, " ").into_owned();
    let spaced = s;
    s = macro_re()
        .replace_all(&spaced, |caps: &Captures| {
            let replacement = macro_replacement(&caps[1]);
            let end = caps.get(0).map_or(spaced.len(), |m| m.end());
            let glued = spaced[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric());
            // `\pix` must not read as one name
            if glued && replacement.chars().last().is_some_and(|c| c.is_ascii_alphabetic()) {
                format!("{} ", replacement)
            } else {
                replacement.to_string()
            }
        })
        .into_owned();

    let mut plain = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '{' | '}' | '\\' | '$' => {}
            other => match GLYPHS.iter().find(|(g, _, _)| *g == other) {
                Some((_, _, ascii)) => plain.push_str(ascii),
                None => plain.push(other),
            },
        }
    }

    whitespace_re().replace_all(plain.trim(), " ").into_owned()
}

/// Normalize raw lesson text before segmentation.
///
/// Line endings become `\n`, runs of spaces and tabs collapse to one space,
/// math glyphs are spelled as LaTeX macros so segmentation and cleanup see
/// one vocabulary, and typographic punctuation (quotes, guillemets, dashes,
/// ellipses) becomes ASCII.
pub fn normalize_input(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    for c in unified.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{00AB}' | '\u{00BB}' => out.push('"'),
            '\u{2010}' | '\u{2011}' | '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' => out.push(' '),
            other => match GLYPHS.iter().find(|(g, _, _)| *g == other) {
                Some((_, latex, _)) if latex.starts_with('\\') => {
                    out.push_str(latex);
                    out.push(' ');
                }
                Some((_, latex, _)) => out.push_str(latex),
                None => out.push(other),
            },
        }
    }

    out.lines()
        .map(|line| inline_space_re().replace_all(line.trim_end(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_operators() {
        assert_eq!(clean_latex(r"2 \times 3 \div 4"), "2 * 3 / 4");
        assert_eq!(clean_latex(r"a \cdot b \leq c"), "a * b <= c");
        assert_eq!(clean_latex(r"x \neq \pm 1"), "x != +- 1");
    }

    #[test]
    fn test_clean_fractions_and_roots() {
        assert_eq!(clean_latex(r"\frac{a}{b}"), "(a)/(b)");
        assert_eq!(clean_latex(r"\dfrac{1}{\sqrt{2}}"), "(1)/(sqrt(2))");
        assert_eq!(clean_latex(r"\frac{\frac{1}{2}}{3}"), "((1)/(2))/(3)");
        assert_eq!(clean_latex(r"\frac{x^{2}}{y}"), "(x^2)/(y)");
        assert_eq!(clean_latex(r"e^{i \pi}"), "e^(i pi)");
    }

    #[test]
    fn test_clean_greek_and_degrees() {
        assert_eq!(clean_latex(r"\pi r^2"), "pi r^2");
        assert_eq!(clean_latex(r"\theta = 90^\circ"), "theta = 90 degrees");
        assert_eq!(clean_latex(r"45^{\circ}"), "45 degrees");
        assert_eq!(clean_latex("30°"), "30 degrees");
    }

    #[test]
    fn test_clean_text_and_spacing() {
        assert_eq!(clean_latex(r"v = 5\,\text{m/s}"), "v = 5 m/s");
        assert_eq!(clean_latex(r"\left( x \right)"), "( x )");
        assert_eq!(clean_latex(r"\sin x"), "sin x");
    }

    #[test]
    fn test_clean_output_is_ascii() {
        let cleaned = clean_latex("x ≤ 2π × r");
        assert!(cleaned.is_ascii(), "{cleaned}");
        assert_eq!(cleaned, "x <= 2pi * r");
    }

    #[test]
    fn test_normalize_line_endings_and_spaces() {
        assert_eq!(normalize_input("a  b\r\nc\t\td  \r\n"), "a b\nc d");
    }

    #[test]
    fn test_normalize_glyphs_and_quotes() {
        assert_eq!(normalize_input("2 × 3 − 1"), r"2 \times 3 - 1");
        assert_eq!(normalize_input("“Hi” it’s"), "\"Hi\" it's");
        assert_eq!(normalize_input("90°"), r"90^\circ");
    }

    #[test]
    fn test_normalize_dashes_ellipses_guillemets() {
        assert_eq!(
            normalize_input("Wait… it’s done — “ok”"),
            "Wait... it's done - \"ok\""
        );
        assert_eq!(normalize_input("pages 3–5"), "pages 3-5");
        assert_eq!(normalize_input("«Hola»"), "\"Hola\"");
        assert!(normalize_input("„x“ ‑ y").is_ascii());
    }
}
