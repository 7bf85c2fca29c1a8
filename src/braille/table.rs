//! North American ASCII braille ↔ Unicode braille cells.
//!
//! ASCII braille assigns one printable character to each of the 64 six-dot
//! cells. The table below is ordered by dot pattern, so the character at
//! index `i` is the cell `U+2800 + i`.

/// Braille word space (the blank cell)
pub const BRAILLE_SPACE: char = '\u{2800}';

/// Nemeth opening code indicator, dots 456 146
pub const NEMETH_OPEN: &str = "\u{2838}\u{2829}";

/// Nemeth closing code indicator, dots 456 156
pub const NEMETH_CLOSE: &str = "\u{2838}\u{2831}";

const ASCII_BRAILLE: &str = " A1B'K2L@CIF/MSP\"E3H9O6R^DJG>NTQ,*5<-U8V.%[$+X!&;:4\\0Z7(_?W]#Y)=";

/// True for characters in the Unicode braille block, which are the ones that
/// occupy a cell on the page
pub fn is_braille_cell(c: char) -> bool {
    ('\u{2800}'..='\u{28FF}').contains(&c)
}

/// Number of braille cells in a string
pub fn cell_count(s: &str) -> usize {
    s.chars().filter(|c| is_braille_cell(*c)).count()
}

/// Map one ASCII braille character to its Unicode cell
pub fn ascii_to_cell(c: char) -> Option<char> {
    let upper = c.to_ascii_uppercase();
    ASCII_BRAILLE
        .chars()
        .position(|b| b == upper)
        .and_then(|offset| char::from_u32(0x2800 + offset as u32))
}

/// Map one six-dot Unicode cell back to ASCII braille
pub fn cell_to_ascii(c: char) -> Option<char> {
    let offset = (c as u32).checked_sub(0x2800)?;
    ASCII_BRAILLE.chars().nth(offset as usize)
}

/// Convert an ASCII braille string to Unicode cells. Spaces become the blank
/// cell; newlines are kept.
pub fn ascii_to_unicode(ascii: &str) -> Option<String> {
    ascii
        .chars()
        .map(|c| match c {
            '\n' => Some('\n'),
            other => ascii_to_cell(other),
        })
        .collect()
}

/// Convert Unicode cells to ASCII braille, e.g. for an embosser. Non-cell
/// characters pass through.
pub fn unicode_to_ascii(cells: &str) -> String {
    cells
        .chars()
        .map(|c| cell_to_ascii(c).unwrap_or(c))
        .collect()
}
