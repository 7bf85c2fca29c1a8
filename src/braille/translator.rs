//! Braille translation primitives.
//!
//! The engine needs two operations: literary translation for prose and
//! Nemeth translation for (already cleaned, plain ASCII) math. Both return
//! Unicode braille with [`BRAILLE_SPACE`] between words.

use thiserror::Error;

use super::table::{ascii_to_cell, BRAILLE_SPACE};

/// Errors from a translation primitive
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Translator unavailable: {0}")]
    Unavailable(String),

    #[error("Translator failed: {0}")]
    Failed(String),

    #[error("Unsupported character {ch:?} in {context}")]
    Unsupported { ch: char, context: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A literary + Nemeth braille translator
pub trait BrailleTranslator: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Literary (grade 2 where the backend supports contractions) braille
    fn grade2(&self, text: &str) -> Result<String, TranslateError>;

    /// Nemeth code for a plain-ASCII math expression, without indicators
    fn nemeth(&self, math: &str) -> Result<String, TranslateError>;
}

/// Built-in table-driven translator.
///
/// Produces uncontracted literary braille (capital, number and grade-1
/// indicators, UEB punctuation, Spanish accented letters) and a Nemeth
/// rendering of ASCII math. Needs no external binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableTranslator;

impl TableTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl BrailleTranslator for TableTranslator {
    fn name(&self) -> &str {
        "table"
    }

    fn grade2(&self, text: &str) -> Result<String, TranslateError> {
        to_cells(&literary_ascii(text)?)
    }

    fn nemeth(&self, math: &str) -> Result<String, TranslateError> {
        to_cells(&nemeth_ascii(math)?)
    }
}

/// Letters a–j double as digits 1–0
fn digit_letter(d: char) -> char {
    match d {
        '0' => 'J',
        d => (b'A' + (d as u8 - b'1')) as char,
    }
}

fn literary_punctuation(c: char, open_quote: &mut bool) -> Option<&'static str> {
    Some(match c {
        ',' => "1",
        ';' => "2",
        ':' => "3",
        '.' => "4",
        '!' => "6",
        '?' => "8",
        '\'' => "'",
        '"' => {
            *open_quote = !*open_quote;
            if *open_quote {
                "8"
            } else {
                "0"
            }
        }
        '-' => "-",
        '(' => "\"<",
        ')' => "\">",
        '[' => ".<",
        ']' => ".>",
        '/' => "_/",
        '\\' => "_*",
        '&' => "@&",
        '%' => ".0",
        '*' => "\"9",
        '+' => "\"6",
        '=' => "\"7",
        '<' => "@<",
        '>' => "@>",
        '$' => "@S",
        '#' => "_?",
        '@' => "@A",
        '_' => "._",
        '{' => "_<",
        '}' => "_>",
        '^' => "@5",
        '~' => "@9",
        '|' => "_\\",
        // Spanish letters and inverted marks
        'á' => "(",
        'é' => "!",
        'í' => "/",
        'ó' => "+",
        'ú' => ")",
        'ñ' => "]",
        'ü' => "\\",
        '¿' => "5",
        '¡' => "6",
        _ => return None,
    })
}

/// Uncontracted literary braille, as ASCII braille
fn literary_ascii(text: &str) -> Result<String, TranslateError> {
    let mut out = String::with_capacity(text.len() * 2);
    let mut in_number = false;
    let mut open_quote = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            in_number = false;
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            continue;
        }

        if c.is_ascii_digit() {
            if !in_number {
                out.push('#');
                in_number = true;
            }
            out.push(digit_letter(c));
            continue;
        }

        // A decimal point or comma between digits keeps the number going
        if in_number && matches!(c, '.' | ',') && chars.peek().is_some_and(|n| n.is_ascii_digit()) {
            out.push(if c == '.' { '4' } else { '1' });
            continue;
        }

        if c.is_ascii_alphabetic() {
            // Letters a–j right after a number would read as digits
            if in_number && ('a'..='j').contains(&c.to_ascii_lowercase()) {
                out.push(';');
            }
            in_number = false;
            if c.is_ascii_uppercase() {
                out.push(',');
            }
            out.push(c.to_ascii_uppercase());
            continue;
        }

        in_number = false;
        let lowered = c.to_lowercase().next().unwrap_or(c);
        match literary_punctuation(lowered, &mut open_quote) {
            Some(cells) => {
                if lowered != c {
                    out.push(',');
                }
                out.push_str(cells);
            }
            None => {
                return Err(TranslateError::Unsupported {
                    ch: c,
                    context: "literary text",
                })
            }
        }
    }

    Ok(out.trim_end().to_string())
}

/// Nemeth code for plain ASCII math, as ASCII braille
fn nemeth_ascii(math: &str) -> Result<String, TranslateError> {
    let mut out = String::with_capacity(math.len() * 2);
    let chars: Vec<char> = math.chars().collect();
    let mut i = 0;

    let push_spaced = |out: &mut String, symbol: &str| {
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(symbol);
        out.push(' ');
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let prev_is_gap = out.is_empty() || out.ends_with(' ') || out.ends_with('(');

        match (c, next) {
            (c, _) if c.is_whitespace() => {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            ('<', Some('=')) => {
                push_spaced(&mut out, "\"K.1");
                i += 1;
            }
            ('>', Some('=')) => {
                push_spaced(&mut out, ".1.K");
                i += 1;
            }
            ('!', Some('=')) => {
                push_spaced(&mut out, "/.K");
                i += 1;
            }
            ('-', Some('>')) => {
                push_spaced(&mut out, "$O");
                i += 1;
            }
            ('+', Some('-')) => {
                out.push_str("+-");
                i += 1;
            }
            ('=', _) => push_spaced(&mut out, ".K"),
            ('<', _) => push_spaced(&mut out, "\"K"),
            ('>', _) => push_spaced(&mut out, ".1"),
            ('~', _) => push_spaced(&mut out, "@:"),
            (d, _) if d.is_ascii_digit() => {
                // Numeric indicator at the start of a numeral after a space
                let prev_digit = i > 0 && (chars[i - 1].is_ascii_digit() || chars[i - 1] == '.');
                if prev_is_gap && !prev_digit {
                    out.push('#');
                }
                out.push(d);
            }
            (l, _) if l.is_ascii_alphabetic() => {
                if l.is_ascii_uppercase() {
                    out.push(',');
                }
                out.push(l.to_ascii_uppercase());
            }
            ('+', _) => out.push('+'),
            ('-', _) => out.push('-'),
            ('*', _) => out.push_str("@*"),
            ('/', _) => out.push_str("_/"),
            ('^', _) => out.push('^'),
            ('_', _) => out.push(';'),
            ('(', _) => out.push('('),
            (')', _) => out.push(')'),
            ('[', _) => out.push_str("@("),
            (']', _) => out.push_str("@)"),
            ('|', _) => out.push('\\'),
            ('.', _) => out.push('.'),
            (',', _) => out.push(','),
            ('!', _) => out.push('&'),
            ('%', _) => out.push_str("@0"),
            ('\'', _) => out.push('\''),
            (':', _) => out.push_str("_3"),
            (other, _) => {
                return Err(TranslateError::Unsupported {
                    ch: other,
                    context: "math",
                })
            }
        }
        i += 1;
    }

    Ok(out.trim().to_string())
}

/// ASCII braille to Unicode cells, spaces to the braille word space
fn to_cells(ascii: &str) -> Result<String, TranslateError> {
    ascii
        .chars()
        .map(|c| {
            if c == ' ' {
                Ok(BRAILLE_SPACE)
            } else {
                ascii_to_cell(c).ok_or(TranslateError::Unsupported {
                    ch: c,
                    context: "braille table",
                })
            }
        })
        .collect()
}
