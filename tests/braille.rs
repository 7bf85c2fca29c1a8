//! Braille Engine Scenario Tests

use std::sync::Arc;

use eduforge::braille::table::cell_count;
use eduforge::braille::{
    format_to_brf, segment, BrailleEngine, BrfLayout, ConvertOptions, LouisTranslator,
    SegmentKind, BRAILLE_SPACE, NEMETH_CLOSE, NEMETH_OPEN,
};

fn kinds(input: &str) -> Vec<SegmentKind> {
    segment(input).into_iter().map(|s| s.kind).collect()
}

#[test]
fn test_force_lesson_segments() {
    let segments = segment("Force is $F = ma$ where F is force.");
    assert_eq!(
        segments.iter().map(|s| s.kind).collect::<Vec<_>>(),
        vec![SegmentKind::Text, SegmentKind::Math, SegmentKind::Text]
    );
    assert_eq!(segments[1].content, "F = ma");
    assert!(!segments[1].display);
}

#[test]
fn test_display_math_wins_over_inline() {
    let segments = segment("Energy: $$E = mc^2$$ and $p = mv$.");
    let math: Vec<_> = segments.iter().filter(|s| s.is_math()).collect();
    assert_eq!(math.len(), 2);
    assert_eq!(math[0].original, "$$E = mc^2$$");
    assert!(math[0].display);
    assert_eq!(math[1].content, "p = mv");
}

#[test]
fn test_bare_equation_lines_become_math() {
    let lesson = "Speed tells us how fast something moves.\nv = d / t\nIt is measured in meters per second.";
    assert_eq!(
        kinds(lesson),
        vec![SegmentKind::Text, SegmentKind::Math, SegmentKind::Text]
    );
}

#[test]
fn test_math_is_wrapped_in_nemeth_indicators() {
    let result = BrailleEngine::default().convert("$x + 1$", &ConvertOptions::default());
    assert!(result.success, "{:?}", result.error);

    let math = result.full_braille.trim_end_matches(BRAILLE_SPACE);
    assert!(math.starts_with(NEMETH_OPEN));
    assert!(math.ends_with(NEMETH_CLOSE));
    assert!(result.english_braille.is_empty());
}

#[test]
fn test_long_lesson_brf_geometry() {
    let paragraph = "A force changes the motion of an object. Newton wrote it as $F = ma$ \
                     and the unit is the newton, written $1 N = 1 kg m/s^2$. ";
    let lesson = paragraph.repeat(30);
    let result = BrailleEngine::default().convert(&lesson, &ConvertOptions::default());
    assert!(result.success, "{:?}", result.error);

    let pages: Vec<&str> = result.brf.split("\x0C\n").collect();
    assert!(pages.len() > 1);
    assert_eq!(pages.len(), result.stats.brf_pages);
    for page in pages {
        assert!(page.lines().count() <= 25);
        for line in page.lines() {
            assert!(cell_count(line) <= 40, "line of {} cells", cell_count(line));
        }
    }
}

#[test]
fn test_custom_layout() {
    let layout = BrfLayout {
        cells_per_line: 10,
        lines_per_page: 3,
    };
    let word: String = std::iter::repeat('⠁').take(4).collect();
    let space = BRAILLE_SPACE.to_string();
    let text = vec![word.as_str(); 12].join(space.as_str());

    let brf = format_to_brf(&text, &layout);
    // Two words (9 cells) per line, three lines per page
    let pages: Vec<&str> = brf.split("\x0C\n").collect();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].lines().count(), 3);
    assert!(brf.lines().all(|l| cell_count(l) <= 10));
}

#[test]
fn test_missing_liblouis_reports_failure() {
    let louis = LouisTranslator::new(
        "eduforge-test-no-such-lou-translate",
        "en-ueb-g2.ctb",
        "nemeth.ctb",
    );
    let engine = BrailleEngine::new(Arc::new(louis));
    let result = engine.convert("Force is $F = ma$.", &ConvertOptions::default());

    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(result.full_braille.is_empty());
    assert!(result.brf.is_empty());
}
