use tracing::debug;

use super::font::TextMeasure;
use crate::error::CoreError;
use crate::geometry::Rect;

pub const MIN_FONT_SIZE: u32 = 8;
pub const LINE_SPACING_RATIO: f32 = 0.2;

/// Inclusive font size range searched by [`fit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    pub min: u32,
    pub max: u32,
}

impl SizeBounds {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// `[MIN_FONT_SIZE, initial_size]`.
    pub fn up_to(initial_size: u32) -> Self {
        Self::new(MIN_FONT_SIZE, initial_size)
    }

    fn normalized(self) -> (u32, u32) {
        if self.max < self.min {
            (self.max, self.max)
        } else {
            (self.min, self.max)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    /// Lines break only between words.
    Natural,
    /// At least one word was split with hyphens.
    Forced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub font_size: u32,
    pub lines: Vec<String>,
    pub wrap: Wrap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    space_before: bool,
}

/// Stacked height of `line_count` lines with 0.2 line-height spacing between them.
pub fn block_height(line_height: f32, line_count: usize) -> f32 {
    if line_count == 0 {
        return 0.0;
    }
    line_height * line_count as f32 + line_height * LINE_SPACING_RATIO * (line_count - 1) as f32
}

/// Largest size in `bounds` whose word-preserving wrap fits `rect`.
///
/// The search walks sizes upward and stops at the first size where the wrap
/// breaks a word or the block overflows vertically. When no size wraps without
/// breaking words, words are split per character at the minimum size instead.
pub fn fit<M: TextMeasure + ?Sized>(
    text: &str,
    rect: &Rect,
    font: &M,
    bounds: SizeBounds,
) -> FitResult {
    let (min, max) = bounds.normalized();
    let paragraphs = tokenize(text);
    if paragraphs.is_empty() {
        return FitResult {
            font_size: max,
            lines: vec![String::new()],
            wrap: Wrap::Natural,
        };
    }

    match search_natural(&paragraphs, rect, font, min, max) {
        Ok(result) => result,
        Err(err) => {
            debug!("{}; falling back to forced breaks", err);
            FitResult {
                font_size: min,
                lines: forced_wrap(&paragraphs, rect.width as f32, font, min),
                wrap: Wrap::Forced,
            }
        }
    }
}

fn search_natural<M: TextMeasure + ?Sized>(
    paragraphs: &[Vec<Token>],
    rect: &Rect,
    font: &M,
    min: u32,
    max: u32,
) -> Result<FitResult, CoreError> {
    let max_width = rect.width as f32;
    let max_height = rect.height as f32;
    let mut best: Option<FitResult> = None;

    for size in min..=max {
        let Some(lines) = natural_wrap(paragraphs, max_width, font, size) else {
            break;
        };
        let fits_height = block_height(font.line_height(size), lines.len()) <= max_height;
        if fits_height || best.is_none() {
            best = Some(FitResult {
                font_size: size,
                lines,
                wrap: Wrap::Natural,
            });
        }
        if !fits_height {
            break;
        }
    }

    best.ok_or(CoreError::FitUnsatisfiable { min_size: min })
}

fn natural_wrap<M: TextMeasure + ?Sized>(
    paragraphs: &[Vec<Token>],
    max_width: f32,
    font: &M,
    size: u32,
) -> Option<Vec<String>> {
    let mut lines = Vec::new();
    for tokens in paragraphs {
        let mut current = String::new();
        for token in tokens {
            let candidate = join_token(&current, token);
            if font.text_width(&candidate, size) <= max_width {
                current = candidate;
                continue;
            }
            if current.is_empty() || font.text_width(&token.text, size) > max_width {
                return None;
            }
            lines.push(std::mem::take(&mut current));
            current = token.text.clone();
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    Some(lines)
}

fn forced_wrap<M: TextMeasure + ?Sized>(
    paragraphs: &[Vec<Token>],
    max_width: f32,
    font: &M,
    size: u32,
) -> Vec<String> {
    let mut lines = Vec::new();
    for tokens in paragraphs {
        let mut current = String::new();
        for token in tokens {
            let candidate = join_token(&current, token);
            if font.text_width(&candidate, size) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if font.text_width(&token.text, size) <= max_width {
                current = token.text.clone();
                continue;
            }
            let mut pieces = break_word(&token.text, max_width, font, size);
            current = pieces.pop().unwrap_or_default();
            lines.extend(pieces);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

// Every piece but the last carries a trailing hyphen. A piece always holds at
// least one character, even when that character alone is wider than the line.
fn break_word<M: TextMeasure + ?Sized>(
    word: &str,
    max_width: f32,
    font: &M,
    size: u32,
) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut pieces = Vec::new();
    let mut piece = String::new();

    for (idx, ch) in chars.iter().enumerate() {
        let is_last = idx + 1 == chars.len();
        let mut candidate = piece.clone();
        candidate.push(*ch);
        let probe = if is_last {
            candidate.clone()
        } else {
            format!("{}-", candidate)
        };
        if !piece.is_empty() && font.text_width(&probe, size) > max_width {
            pieces.push(format!("{}-", piece));
            piece = ch.to_string();
        } else {
            piece = candidate;
        }
    }
    pieces.push(piece);
    pieces
}

fn join_token(line: &str, token: &Token) -> String {
    if line.is_empty() {
        token.text.clone()
    } else if token.space_before {
        format!("{} {}", line, token.text)
    } else {
        format!("{}{}", line, token.text)
    }
}

fn tokenize(text: &str) -> Vec<Vec<Token>> {
    text.split('\n')
        .map(tokenize_paragraph)
        .filter(|tokens| !tokens.is_empty())
        .collect()
}

// Words are separated by whitespace; CJK characters are break opportunities of
// their own and join their neighbours without a space.
fn tokenize_paragraph(paragraph: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for word in paragraph.split_whitespace() {
        let mut space_before = !tokens.is_empty();
        let mut current = String::new();
        for ch in word.chars() {
            if !is_cjk(ch) {
                current.push(ch);
                continue;
            }
            if !current.is_empty() {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    space_before,
                });
                space_before = false;
            }
            tokens.push(Token {
                text: ch.to_string(),
                space_before,
            });
            space_before = false;
        }
        if !current.is_empty() {
            tokens.push(Token {
                text: current,
                space_before,
            });
        }
    }
    tokens
}

pub(crate) fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3000..=0x303F | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF
    )
}
