use crate::application::layout::TextMeasure;

/// Anchos de avance de Helvetica (AFM estándar, unidades de 1/1000 em)
/// para ASCII imprimible, de `' '` (32) a `'~'` (126).
const ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Ancho para caracteres fuera de la tabla.
const FALLBACK_WIDTH: u16 = 556;

#[derive(Debug, Clone, Copy, Default)]
pub struct HelveticaMetrics;

impl HelveticaMetrics {
    pub fn char_width(c: char) -> u16 {
        let code = c as u32;
        if (32..=126).contains(&code) {
            ASCII_WIDTHS[(code - 32) as usize]
        } else {
            FALLBACK_WIDTH
        }
    }
}

impl TextMeasure for HelveticaMetrics {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| Self::char_width(c) as u32).sum();
        units as f32 * font_size / 1000.0
    }
}
