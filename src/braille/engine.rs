//! Transcription engine: segmentation → cleanup → translation → assembly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::BrailleScope;

use super::brf::{format_to_brf, paginate, BrfLayout};
use super::latex::{clean_latex, normalize_input};
use super::segment::{segment, Segment, SegmentKind};
use super::table::{cell_count, BRAILLE_SPACE, NEMETH_CLOSE, NEMETH_OPEN};
use super::translator::{BrailleTranslator, TableTranslator, TranslateError};

/// Options for a single conversion
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Normalize line endings, spacing, glyphs and quotes first
    #[serde(default)]
    pub normalize: bool,

    #[serde(default)]
    pub layout: BrfLayout,
}

/// Math segment as written, as cleaned, and as brailled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathPair {
    pub original: String,
    pub cleaned: String,
    pub braille: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub text_segments: usize,
    pub math_segments: usize,
    pub braille_cells: usize,
    pub brf_lines: usize,
    pub brf_pages: usize,
}

/// Outcome of a conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub segments: Vec<Segment>,

    /// Every segment in order, each followed by a braille space
    pub full_braille: String,

    /// Text segments only
    pub english_braille: String,

    pub brf: String,

    pub math_pairs: Vec<MathPair>,

    pub stats: ConversionStats,
}

impl ConversionResult {
    fn failed(segments: Vec<Segment>, error: &TranslateError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            segments,
            full_braille: String::new(),
            english_braille: String::new(),
            brf: String::new(),
            math_pairs: Vec::new(),
            stats: ConversionStats::default(),
        }
    }
}

/// Runs the transcription pipeline over a translation backend
#[derive(Clone)]
pub struct BrailleEngine {
    translator: Arc<dyn BrailleTranslator>,
}

impl Default for BrailleEngine {
    fn default() -> Self {
        Self::new(Arc::new(TableTranslator::new()))
    }
}

impl BrailleEngine {
    pub fn new(translator: Arc<dyn BrailleTranslator>) -> Self {
        Self { translator }
    }

    pub fn backend(&self) -> &str {
        self.translator.name()
    }

    /// Convert lesson text, reporting translator failures in the result
    pub fn convert(&self, input: &str, options: &ConvertOptions) -> ConversionResult {
        let text = if options.normalize {
            normalize_input(input)
        } else {
            input.to_string()
        };
        let segments = segment(&text);

        match self.assemble(&segments, &options.layout) {
            Ok(parts) => parts.into_result(segments),
            Err(e) => {
                warn!(backend = self.backend(), error = %e, "Braille conversion failed");
                ConversionResult::failed(segments, &e)
            }
        }
    }

    /// Convert lesson text, failing on the first translator error
    pub fn try_convert(
        &self,
        input: &str,
        options: &ConvertOptions,
    ) -> Result<ConversionResult, TranslateError> {
        let text = if options.normalize {
            normalize_input(input)
        } else {
            input.to_string()
        };
        let segments = segment(&text);
        let parts = self.assemble(&segments, &options.layout)?;
        Ok(parts.into_result(segments))
    }

    /// Braille for one segment, plus the cleaned expression for math
    fn translate_segment(
        &self,
        seg: &Segment,
    ) -> Result<(String, Option<String>), TranslateError> {
        match seg.kind {
            SegmentKind::Text => Ok((self.translator.grade2(&seg.content)?, None)),
            SegmentKind::Math => {
                let cleaned = clean_latex(&seg.content);
                let body = self.translator.nemeth(&cleaned)?;
                let wrapped = format!(
                    "{}{}{}{}{}",
                    NEMETH_OPEN, BRAILLE_SPACE, body, BRAILLE_SPACE, NEMETH_CLOSE
                );
                Ok((wrapped, Some(cleaned)))
            }
        }
    }

    fn assemble(
        &self,
        segments: &[Segment],
        layout: &BrfLayout,
    ) -> Result<Assembled, TranslateError> {
        let mut full = String::new();
        let mut english: Vec<String> = Vec::new();
        let mut math_pairs = Vec::new();

        for seg in segments {
            let (braille, cleaned) = self.translate_segment(seg)?;
            full.push_str(&braille);
            full.push(BRAILLE_SPACE);

            match cleaned {
                Some(cleaned) => math_pairs.push(MathPair {
                    original: seg.original.clone(),
                    cleaned,
                    braille,
                }),
                None => english.push(braille),
            }
        }

        let pages = paginate(&full, layout);
        let stats = ConversionStats {
            text_segments: english.len(),
            math_segments: math_pairs.len(),
            braille_cells: cell_count(&full),
            brf_lines: pages.iter().map(Vec::len).sum(),
            brf_pages: pages.len(),
        };
        debug!(
            backend = self.backend(),
            segments = segments.len(),
            cells = stats.braille_cells,
            "Assembled braille"
        );

        Ok(Assembled {
            brf: format_to_brf(&full, layout),
            english: english.join(BRAILLE_SPACE.to_string().as_str()),
            full,
            math_pairs,
            stats,
        })
    }
}

struct Assembled {
    full: String,
    english: String,
    brf: String,
    math_pairs: Vec<MathPair>,
    stats: ConversionStats,
}

impl Assembled {
    fn into_result(self, segments: Vec<Segment>) -> ConversionResult {
        ConversionResult {
            success: true,
            error: None,
            segments,
            full_braille: self.full,
            english_braille: self.english,
            brf: self.brf,
            math_pairs: self.math_pairs,
            stats: self.stats,
        }
    }
}

/// Pull the text to transcribe out of a content payload.
///
/// `full` takes every string in the payload (object keys in sorted order),
/// one per paragraph; a field scope takes the strings under that top-level
/// field. Returns `None` when the field is absent or holds no text.
pub fn extract_text(payload: &Value, scope: &BrailleScope) -> Option<String> {
    let root = match scope {
        BrailleScope::Full => payload,
        BrailleScope::Field(name) => payload.get(name)?,
    };

    let mut parts = Vec::new();
    collect_strings(root, &mut parts);
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}
