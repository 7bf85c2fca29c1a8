//! Braille transcription.
//!
//! Lesson text is split into prose and math, math is cleaned to plain ASCII,
//! both go through a [`BrailleTranslator`] (literary or Nemeth), and the
//! result is assembled into one braille string plus a paginated BRF file.

pub mod brf;
pub mod engine;
pub mod latex;
pub mod louis;
pub mod segment;
pub mod table;
pub mod translator;

pub use brf::{format_to_brf, paginate, BrfLayout};
pub use engine::{
    extract_text, BrailleEngine, ConversionResult, ConversionStats, ConvertOptions, MathPair,
};
pub use latex::{clean_latex, normalize_input};
pub use louis::LouisTranslator;
pub use segment::{is_math_line, segment, Segment, SegmentKind};
pub use table::{BRAILLE_SPACE, NEMETH_CLOSE, NEMETH_OPEN};
pub use translator::{BrailleTranslator, TableTranslator, TranslateError};
