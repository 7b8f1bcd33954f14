//! # Text Preparation for Documents
//!
//! PDF content streams place glyphs left to right. Before a string is drawn
//! it goes through two steps:
//!
//! ```text
//! logical order ──► visual_order() ──► TextShaper::shape() per script run
//!   "فاتورة 42"        "42 ةروتاف"        builtin fonts: "42 [...]"
//! ```
//!
//! [`visual_order`] is a single-line reduction of the bidirectional
//! algorithm: Arabic runs are reversed, Latin words and numbers keep their
//! reading order, and a line that starts with Arabic is laid out right to
//! left as a whole.
//!
//! A [`TextShaper`] decides which runs the active font can draw. Runs it
//! refuses become [`PLACEHOLDER`]; export never fails because of a glyph.

use tracing::debug;

/// Replaces any run the shaper cannot render.
pub const PLACEHOLDER: &str = "[...]";

// =============================================================================
// Character Classes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Ltr,
    Rtl,
    Neutral,
}

/// Arabic-Indic digits and separators sort with numbers, not letters.
fn is_arabic_number(c: char) -> bool {
    matches!(c, '\u{0660}'..='\u{0669}' | '\u{06F0}'..='\u{06F9}' | '\u{066B}' | '\u{066C}')
}

fn is_arabic_letter(c: char) -> bool {
    !is_arabic_number(c)
        && matches!(c,
            '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}')
}

fn direction(c: char) -> Direction {
    if is_arabic_letter(c) {
        Direction::Rtl
    } else if c.is_alphanumeric() || is_arabic_number(c) {
        Direction::Ltr
    } else {
        Direction::Neutral
    }
}

fn mirror(c: char) -> char {
    match c {
        '(' => ')',
        ')' => '(',
        '[' => ']',
        ']' => '[',
        '{' => '}',
        '}' => '{',
        '<' => '>',
        '>' => '<',
        c => c,
    }
}

// =============================================================================
// Visual Order
// =============================================================================

/// Groups `text` into maximal runs of one direction with neutrals resolved.
///
/// A neutral run takes the direction of its neighbours when both agree,
/// otherwise the paragraph direction.
fn resolved_runs(text: &str, base: Direction) -> Vec<(Direction, String)> {
    let mut raw: Vec<(Direction, String)> = Vec::new();
    for c in text.chars() {
        let dir = direction(c);
        match raw.last_mut() {
            Some((last, run)) if *last == dir => run.push(c),
            _ => raw.push((dir, c.to_string())),
        }
    }

    let strong = |i: Option<usize>| i.and_then(|i| raw.get(i)).map(|(d, _)| *d);
    let mut resolved: Vec<(Direction, String)> = Vec::with_capacity(raw.len());
    for (i, (dir, run)) in raw.iter().enumerate() {
        let dir = if *dir == Direction::Neutral {
            match (strong(i.checked_sub(1)), strong(Some(i + 1))) {
                (Some(before), Some(after)) if before == after => before,
                _ => base,
            }
        } else {
            *dir
        };
        match resolved.last_mut() {
            Some((last, text)) if *last == dir => text.push_str(run),
            _ => resolved.push((dir, run.clone())),
        }
    }
    resolved
}

/// Paragraph direction from the first letter. Digits do not count.
fn base_direction(text: &str) -> Direction {
    text.chars()
        .find_map(|c| {
            if is_arabic_letter(c) {
                Some(Direction::Rtl)
            } else if c.is_alphabetic() {
                Some(Direction::Ltr)
            } else {
                None
            }
        })
        .unwrap_or(Direction::Ltr)
}

/// Converts one line from logical to visual (left-to-right drawing) order.
///
/// ```rust
/// use khalifa_export::visual_order;
///
/// assert_eq!(visual_order("Total"), "Total");
/// assert_eq!(visual_order("مرحبا"), "ابحرم");
/// ```
pub fn visual_order(text: &str) -> String {
    let base = base_direction(text);
    let mut runs = resolved_runs(text, base);
    if base == Direction::Rtl {
        runs.reverse();
    }
    runs.into_iter()
        .map(|(dir, run)| match dir {
            Direction::Rtl => run.chars().rev().map(mirror).collect(),
            _ => run,
        })
        .collect()
}

// =============================================================================
// Shaping
// =============================================================================

/// Decides how (and whether) the active font draws a run of text.
pub trait TextShaper {
    /// Returns the string to hand to the font, or `None` when the font has no
    /// glyphs for this run.
    fn shape(&self, run: &str) -> Option<String>;
}

/// The standard PDF fonts (Helvetica family, WinAnsi encoding).
///
/// Draws Latin-1 text. Arabic-Indic digits and separators are transliterated
/// to ASCII so amounts stay readable; Arabic letters are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFontShaper;

impl TextShaper for BuiltinFontShaper {
    fn shape(&self, run: &str) -> Option<String> {
        run.chars()
            .map(|c| match c {
                '\u{0660}'..='\u{0669}' => char::from_u32('0' as u32 + (c as u32 - 0x0660)),
                '\u{06F0}'..='\u{06F9}' => char::from_u32('0' as u32 + (c as u32 - 0x06F0)),
                '\u{066B}' => Some('.'),
                '\u{066C}' => Some(','),
                c if (c as u32) < 0x100 && !c.is_control() => Some(c),
                _ => None,
            })
            .collect()
    }
}

/// An embedded TrueType font with Arabic coverage. Passes text through.
///
/// Letters are drawn in their isolated forms; contextual joining is up to
/// the font.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeFontShaper;

impl TextShaper for UnicodeFontShaper {
    fn shape(&self, run: &str) -> Option<String> {
        Some(run.chars().filter(|c| !c.is_control()).collect())
    }
}

/// Text ready for placement, with the number of runs that fell back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedText {
    pub text: String,
    pub fallbacks: usize,
}

/// Visual order, then shaping run by run.
///
/// Whitespace-separated pieces are shaped independently so one unknown word
/// does not hide its neighbours.
pub fn prepare(text: &str, shaper: &dyn TextShaper) -> ShapedText {
    let visual = visual_order(text);
    let mut out = String::with_capacity(visual.len());
    let mut fallbacks = 0;

    let mut piece = String::new();
    let flush = |piece: &mut String, out: &mut String, fallbacks: &mut usize| {
        if piece.is_empty() {
            return;
        }
        match shaper.shape(piece.as_str()) {
            Some(shaped) => out.push_str(&shaped),
            None => {
                // Neighbouring fallbacks share one placeholder.
                if out.trim_end().ends_with(PLACEHOLDER) {
                    let keep = out.trim_end().len();
                    out.truncate(keep);
                } else {
                    out.push_str(PLACEHOLDER);
                }
                *fallbacks += 1;
            }
        }
        piece.clear();
    };

    for c in visual.chars() {
        if c.is_whitespace() {
            flush(&mut piece, &mut out, &mut fallbacks);
            out.push(' ');
        } else {
            piece.push(c);
        }
    }
    flush(&mut piece, &mut out, &mut fallbacks);

    if fallbacks > 0 {
        debug!(original = %text, fallbacks, "Replaced runs the font cannot draw");
    }
    ShapedText {
        text: out,
        fallbacks,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
