//! Standard-14 font metrics used to lay out editor-drawn text
//!
//! Appearance streams only reference non-embedded base fonts, so text width
//! comes from the published AFM advance widths (units per 1000 em).

use serde::{Deserialize, Serialize};

const FIRST_CHAR: u32 = 32;

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 222, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 222,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 333, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    278, 278, 564, 564, 564, 444, 921,
    722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889,
    722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611,
    333, 278, 333, 469, 500, 333,
    444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778,
    500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444,
    480, 200, 480, 541,
];

/// Non-embedded PDF base fonts the editor can draw with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardFont {
    #[default]
    Helvetica,
    TimesRoman,
    Courier,
}

impl StandardFont {
    pub const ALL: [StandardFont; 3] =
        [StandardFont::Helvetica, StandardFont::TimesRoman, StandardFont::Courier];

    /// `/BaseFont` name written into font dictionaries.
    pub fn base_font_name(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::Courier => "Courier",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::TimesRoman => "Times",
            StandardFont::Courier => "Courier",
        }
    }

    /// Maps a `/BaseFont` name from an existing PDF to the closest base font.
    pub fn from_base_font_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("courier") || lower.contains("mono") {
            StandardFont::Courier
        } else if lower.contains("times") || (lower.contains("serif") && !lower.contains("sans")) {
            StandardFont::TimesRoman
        } else {
            StandardFont::Helvetica
        }
    }

    /// Advance width of one character in 1/1000 em.
    pub fn char_width(self, ch: char) -> u16 {
        let code = ch as u32;
        let index = code.checked_sub(FIRST_CHAR).map(|i| i as usize);
        match self {
            StandardFont::Courier => 600,
            StandardFont::Helvetica => {
                index.and_then(|i| HELVETICA_WIDTHS.get(i)).copied().unwrap_or(556)
            }
            StandardFont::TimesRoman => {
                index.and_then(|i| TIMES_ROMAN_WIDTHS.get(i)).copied().unwrap_or(500)
            }
        }
    }

    /// Width of `text` in points at `font_size`.
    pub fn text_width(self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|ch| u32::from(self.char_width(ch))).sum();
        units as f32 * font_size / 1000.0
    }

    /// Distance from baseline to the top of capitals, as a fraction of the font size.
    pub fn ascent(self) -> f32 {
        match self {
            StandardFont::Helvetica => 0.718,
            StandardFont::TimesRoman => 0.683,
            StandardFont::Courier => 0.629,
        }
    }

    /// Depth below the baseline, as a positive fraction of the font size.
    pub fn descent(self) -> f32 {
        match self {
            StandardFont::Helvetica => 0.207,
            StandardFont::TimesRoman => 0.217,
            StandardFont::Courier => 0.157,
        }
    }
}

/// Encodes text for a simple-font string operand.
///
/// Characters outside Latin-1 have no code in the base encodings and are
/// replaced by `?`.
pub fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?'))
        .collect()
}

/// Inverse of [`encode_text`] for strings read back from a PDF.
pub fn decode_text(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helvetica_widths() {
        assert_eq!(StandardFont::Helvetica.char_width(' '), 278);
        assert_eq!(StandardFont::Helvetica.char_width('W'), 944);
        assert_eq!(StandardFont::Helvetica.char_width('@'), 1015);
        assert_eq!(StandardFont::Helvetica.char_width('~'), 584);
        assert_eq!(StandardFont::Helvetica.char_width('é'), 556);
    }

    #[test]
    fn test_text_width_scales_with_size() {
        let width = StandardFont::Helvetica.text_width("Page 1", 10.0);
        // P 667 + a 556 + g 556 + e 556 + space 278 + 1 556
        assert!((width - 31.69).abs() < 0.001);
        assert!((StandardFont::Helvetica.text_width("Page 1", 20.0) - 2.0 * width).abs() < 0.001);
    }

    #[test]
    fn test_courier_is_monospaced() {
        assert_eq!(StandardFont::Courier.text_width("iiii", 10.0), StandardFont::Courier.text_width("MMMM", 10.0));
    }

    #[test]
    fn test_base_font_names() {
        assert_eq!(StandardFont::TimesRoman.base_font_name(), "Times-Roman");
        assert_eq!(StandardFont::from_base_font_name("ABCDEF+TimesNewRoman"), StandardFont::TimesRoman);
        assert_eq!(StandardFont::from_base_font_name("CourierNew"), StandardFont::Courier);
        assert_eq!(StandardFont::from_base_font_name("Arial-BoldMT"), StandardFont::Helvetica);
    }

    #[test]
    fn test_encode_decode() {
        assert_eq!(encode_text("Café ✓"), b"Caf\xe9 ?".to_vec());
        assert_eq!(decode_text(b"Caf\xe9"), "Café");
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
    }
}
