//! Text layout for the generated PDF: cleanup, word wrap and pagination.
//!
//! Everything here is pure so the layout can be tested without pdfium.
//! Coordinates are PDF points with the origin at the bottom-left corner.

use crate::llm::prompts::SECTION_ICONS;

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, // A..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333,
    500, 278, 556, 500, 722, 500, 500, 500, // a..z
    334, 260, 334, 584, // {..~
];

/// Helvetica-Bold advance widths for ASCII 32..=126, in 1/1000 em
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    333, 333, 584, 584, 584, 611, 975, // :..@
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, // A..Z
    333, 278, 333, 584, 556, 333, // [..`
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389,
    556, 333, 611, 556, 778, 556, 556, 500, // a..z
    389, 280, 389, 584, // {..~
];

/// Width used for Latin-1 symbols without an ASCII base letter
const DEFAULT_WIDTH: u16 = 556;

const BULLET_PREFIX: &str = "- ";

/// Role of a source line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading,
    Body,
    Bullet,
    Blank,
}

/// A cleaned source line, before wrapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub kind: LineKind,
    pub text: String,
}

/// A positioned line of output
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutLine {
    pub text: String,
    pub x: f32,
    /// Baseline
    pub y: f32,
    pub size: f32,
    pub bold: bool,
}

/// Page size, margins and type sizes
#[derive(Debug, Clone)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub body_size: f32,
    pub heading_size: f32,
    /// Line advance as a multiple of the font size
    pub line_spacing: f32,
    /// Vertical space reserved for the title on the first page
    pub title_block: f32,
    /// Vertical space reserved for the footer on every page
    pub footer_block: f32,
    /// Indentation of bullet continuation lines
    pub bullet_indent: f32,
}

impl PageGeometry {
    pub fn a4() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
            margin: 56.0,
            body_size: 11.0,
            heading_size: 12.0,
            line_spacing: 1.4,
            title_block: 64.0,
            footer_block: 40.0,
            bullet_indent: 12.0,
        }
    }

    pub fn text_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    fn top(&self, first_page: bool) -> f32 {
        let top = self.height - self.margin;
        if first_page { top - self.title_block } else { top }
    }

    fn bottom(&self) -> f32 {
        self.margin + self.footer_block
    }
}

/// Width of `text` in points.
pub fn text_width(text: &str, font_size: f32, bold: bool) -> f32 {
    let table = if bold {
        &HELVETICA_BOLD_WIDTHS
    } else {
        &HELVETICA_WIDTHS
    };
    let units: u32 = text
        .chars()
        .map(|c| {
            let base = ascii_base(c);
            if (' '..='~').contains(&base) {
                table[(base as u32 - 32) as usize] as u32
            } else {
                DEFAULT_WIDTH as u32
            }
        })
        .sum();
    units as f32 * font_size / 1000.0
}

/// ASCII letter an accented Latin-1 letter is drawn like, for width purposes.
fn ascii_base(c: char) -> char {
    match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' => 'O',
        'Ù'..='Ü' => 'U',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Map typographic characters to Latin-1 and drop everything the standard
/// Helvetica encoding cannot show (emoji, variation selectors).
pub fn to_latin1(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            '\u{2022}' | '\u{25B8}' | '\u{25AA}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\t' => out.push(' '),
            c if (c as u32) < 0x20 => {}
            c if (c as u32) <= 0xFF => out.push(c),
            _ => {}
        }
    }
    out
}

/// Turn model output into typed lines.
///
/// Markdown emphasis and heading marks are removed; lines that begin with a
/// section icon, a `#` heading or are fully bold become headings; list
/// markers are normalized to `- `.
pub fn prepare_lines(text: &str) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();

    for raw in text.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            if lines.last().is_some_and(|l| l.kind != LineKind::Blank) {
                lines.push(TextLine {
                    kind: LineKind::Blank,
                    text: String::new(),
                });
            }
            continue;
        }

        let starts_with_icon = SECTION_ICONS.iter().any(|icon| {
            // Icons may arrive with or without the emoji variation selector
            let bare = icon.trim_end_matches('\u{FE0F}');
            trimmed.starts_with(bare)
        });
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        let fully_bold = trimmed.len() > 4 && trimmed.starts_with("**") && trimmed.ends_with("**");

        let mut content = trimmed.trim_start_matches('#').trim().replace("**", "");
        let mut kind = if starts_with_icon || hashes > 0 || fully_bold {
            LineKind::Heading
        } else {
            LineKind::Body
        };

        if kind == LineKind::Body {
            for marker in ["* ", "- ", "• ", "▸ "] {
                if let Some(rest) = content.strip_prefix(marker) {
                    content = rest.trim_start().to_string();
                    kind = LineKind::Bullet;
                    break;
                }
            }
        }

        let content = to_latin1(&content).trim().to_string();
        if content.is_empty() {
            continue;
        }

        lines.push(TextLine {
            kind,
            text: match kind {
                LineKind::Bullet => format!("{}{}", BULLET_PREFIX, content),
                _ => content,
            },
        });
    }

    while lines.last().is_some_and(|l| l.kind == LineKind::Blank) {
        lines.pop();
    }
    lines
}

/// Greedy word wrap; words wider than a line are split by character.
pub fn wrap_line(line: &str, max_width: f32, font_size: f32, bold: bool) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if text_width(&candidate, font_size, bold) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }

        if text_width(word, font_size, bold) <= max_width {
            current = word.to_string();
        } else {
            for c in word.chars() {
                let mut next = current.clone();
                next.push(c);
                if !current.is_empty() && text_width(&next, font_size, bold) > max_width {
                    out.push(std::mem::take(&mut current));
                    current.push(c);
                } else {
                    current = next;
                }
            }
        }
    }

    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Place lines on pages. Always returns at least one page.
pub fn paginate(lines: &[TextLine], geometry: &PageGeometry) -> Vec<Vec<LaidOutLine>> {
    let mut pages: Vec<Vec<LaidOutLine>> = vec![Vec::new()];
    let mut cursor = geometry.top(true);
    let bottom = geometry.bottom();

    for line in lines {
        let at_top = pages.last().is_some_and(|p| p.is_empty());

        let (size, bold, width, indent) = match line.kind {
            LineKind::Blank => {
                if !at_top {
                    cursor -= geometry.body_size * geometry.line_spacing * 0.5;
                }
                continue;
            }
            LineKind::Heading => {
                if !at_top {
                    cursor -= geometry.body_size * 0.5;
                }
                (geometry.heading_size, true, geometry.text_width(), 0.0)
            }
            LineKind::Body => (geometry.body_size, false, geometry.text_width(), 0.0),
            LineKind::Bullet => (
                geometry.body_size,
                false,
                geometry.text_width() - geometry.bullet_indent,
                geometry.bullet_indent,
            ),
        };

        let advance = size * geometry.line_spacing;
        for (index, wrapped) in wrap_line(&line.text, width, size, bold).into_iter().enumerate() {
            if cursor - advance < bottom {
                pages.push(Vec::new());
                cursor = geometry.top(false);
            }
            let x = if index == 0 { geometry.margin } else { geometry.margin + indent };
            if let Some(page) = pages.last_mut() {
                page.push(LaidOutLine {
                    text: wrapped,
                    x,
                    y: cursor - size,
                    size,
                    bold,
                });
            }
            cursor -= advance;
        }
    }

    pages
}
