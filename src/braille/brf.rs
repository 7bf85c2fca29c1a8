//! Braille-ready file (BRF) pagination.
//!
//! Embossers expect fixed geometry: at most 40 cells per line and 25 lines
//! per page, lines separated by `\n` and pages by form feed + newline.

use serde::{Deserialize, Serialize};

use super::table::{cell_count, is_braille_cell, BRAILLE_SPACE};

/// Separator placed between pages
pub const PAGE_BREAK: &str = "\x0C\n";

/// Page geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrfLayout {
    pub cells_per_line: usize,
    pub lines_per_page: usize,
}

impl Default for BrfLayout {
    fn default() -> Self {
        Self {
            cells_per_line: 40,
            lines_per_page: 25,
        }
    }
}

/// Pack braille words into lines of at most `cells_per_line` cells.
///
/// Words are separated by the braille space, which also counts as a cell.
/// A word longer than a whole line is hard-wrapped.
pub fn wrap_lines(braille: &str, layout: &BrfLayout) -> Vec<String> {
    let width = layout.cells_per_line.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_cells = 0;

    for word in braille.split(BRAILLE_SPACE).filter(|w| !w.trim().is_empty()) {
        let word_cells = cell_count(word);

        if word_cells > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_cells = 0;
            }
            let mut chunk = String::new();
            let mut chunk_cells = 0;
            for c in word.chars() {
                if chunk_cells == width {
                    lines.push(std::mem::take(&mut chunk));
                    chunk_cells = 0;
                }
                chunk.push(c);
                chunk_cells += usize::from(is_braille_cell(c));
            }
            current = chunk;
            current_cells = chunk_cells;
            continue;
        }

        let needed = if current.is_empty() {
            word_cells
        } else {
            current_cells + 1 + word_cells
        };
        if needed > width {
            lines.push(std::mem::take(&mut current));
            current_cells = 0;
        }
        if !current.is_empty() {
            current.push(BRAILLE_SPACE);
            current_cells += 1;
        }
        current.push_str(word);
        current_cells += word_cells;
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Group wrapped lines into pages
pub fn paginate(braille: &str, layout: &BrfLayout) -> Vec<Vec<String>> {
    let per_page = layout.lines_per_page.max(1);
    wrap_lines(braille, layout)
        .chunks(per_page)
        .map(|page| page.to_vec())
        .collect()
}

/// Render braille text as a BRF document
pub fn format_to_brf(braille: &str, layout: &BrfLayout) -> String {
    paginate(braille, layout)
        .iter()
        .map(|page| page.join("\n"))
        .collect::<Vec<_>>()
        .join(PAGE_BREAK)
}
