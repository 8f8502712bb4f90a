//! Maquetación del informe PDF.
//!
//! El cálculo es puro: produce las páginas con la posición de cada línea de
//! texto y del bloque de imagen, sin tocar la librería de dibujo. El renderer
//! sólo reproduce este resultado. Coordenadas en puntos PDF (origen abajo a la
//! izquierda).

use crate::domain::detection::Detection;
use crate::domain::report::{format_timestamp, ReportInput, REPORT_TITLE};

/// Mide el ancho renderizado de un texto con la fuente fija del informe.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font_size: f32) -> f32;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub left_margin: f32,
    pub bottom_margin: f32,
    /// Margen superior: línea base del título y de cada página nueva.
    pub top_margin: f32,
    pub title_gap: f32,
    pub header_gap: f32,
    pub list_gap: f32,
    pub line_height: f32,
    pub font_size: f32,
    pub image_width: f32,
    pub image_height: f32,
}

impl PageGeometry {
    /// Carta US (612 x 792 pt).
    pub const LETTER: PageGeometry = PageGeometry {
        width: 612.0,
        height: 792.0,
        left_margin: 30.0,
        bottom_margin: 60.0,
        top_margin: 30.0,
        title_gap: 30.0,
        header_gap: 20.0,
        list_gap: 30.0,
        line_height: 20.0,
        font_size: 12.0,
        image_width: 500.0,
        image_height: 300.0,
    };

    pub fn usable_width(&self) -> f32 {
        self.width - self.left_margin * 2.0
    }

    pub fn top_y(&self) -> f32 {
        self.height - self.top_margin
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::LETTER
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutItem {
    Text { x: f32, y: f32, text: String },
    /// `y` es el borde inferior del bloque.
    Image { x: f32, y: f32, width: f32, height: f32 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub items: Vec<LayoutItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub geometry: PageGeometry,
    pub pages: Vec<PageLayout>,
}

impl ReportLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Todas las líneas de texto en orden de documento.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().flat_map(|p| p.items.iter()).filter_map(|item| match item {
            LayoutItem::Text { text, .. } => Some(text.as_str()),
            LayoutItem::Image { .. } => None,
        })
    }

    /// Página (base 0) y posición del bloque de imagen, si existe.
    pub fn image_placement(&self) -> Option<(usize, &LayoutItem)> {
        self.pages.iter().enumerate().find_map(|(idx, page)| {
            page.items
                .iter()
                .find(|item| matches!(item, LayoutItem::Image { .. }))
                .map(|item| (idx, item))
        })
    }
}

pub fn detection_line(detection: &Detection) -> String {
    let [x1, y1, x2, y2] = detection.bbox.to_array();
    format!(
        "Class: {}, Confidence: {:.2}, BBox: [{:?}, {:?}, {:?}, {:?}]",
        detection.label, detection.confidence, x1, y1, x2, y2
    )
}

/// Ajuste voraz por palabras: acumula mientras el ancho quepa en `max_width`.
/// Una palabra más ancha que la línea queda sola en su propia línea.
pub fn wrap_words(text: &str, max_width: f32, font_size: f32, measure: &dyn TextMeasure) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
            continue;
        }
        let candidate = format!("{line} {word}");
        if measure.text_width(&candidate, font_size) <= max_width {
            line = candidate;
        } else {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

struct Cursor {
    geometry: PageGeometry,
    pages: Vec<PageLayout>,
    y: f32,
}

impl Cursor {
    fn new(geometry: PageGeometry) -> Self {
        let y = geometry.top_y();
        Self { geometry, pages: vec![PageLayout::default()], y }
    }

    fn new_page(&mut self) {
        self.pages.push(PageLayout::default());
        self.y = self.geometry.top_y();
    }

    fn push(&mut self, item: LayoutItem) {
        if let Some(page) = self.pages.last_mut() {
            page.items.push(item);
        }
    }

    fn text_at(&mut self, y: f32, text: String) {
        let x = self.geometry.left_margin;
        self.push(LayoutItem::Text { x, y, text });
    }

    /// Escribe una línea del flujo paginado y avanza el cursor.
    fn flow_line(&mut self, text: String) {
        if self.y < self.geometry.bottom_margin {
            self.new_page();
        }
        self.text_at(self.y, text);
        self.y -= self.geometry.line_height;
    }

    fn finish(self) -> ReportLayout {
        ReportLayout { geometry: self.geometry, pages: self.pages }
    }
}

pub fn compose_layout(input: &ReportInput, geometry: &PageGeometry, measure: &dyn TextMeasure) -> ReportLayout {
    let mut cursor = Cursor::new(geometry.clone());
    let g = geometry;

    cursor.text_at(g.top_y(), REPORT_TITLE.to_string());

    let header = [
        format!("Image ID: {}", input.image_id),
        format!("Timestamp: {}", format_timestamp(&input.timestamp)),
        format!("Total Detections: {}", input.detections.len()),
        format!("Violations: {}", input.summary.violations()),
        format!("Complaints: {}", input.summary.compliant()),
    ];
    let mut y = g.top_y() - g.title_gap;
    for (i, line) in header.into_iter().enumerate() {
        if i > 0 {
            y -= g.header_gap;
        }
        cursor.text_at(y, line);
    }
    cursor.y = y - g.list_gap;

    for detection in &input.detections {
        let text = detection_line(detection);
        for line in wrap_words(&text, g.usable_width(), g.font_size, measure) {
            cursor.flow_line(line);
        }
    }

    if cursor.y - g.image_height < g.bottom_margin {
        cursor.new_page();
    }
    let image_y = cursor.y - g.image_height;
    cursor.push(LayoutItem::Image {
        x: g.left_margin,
        y: image_y,
        width: g.image_width,
        height: g.image_height,
    });

    cursor.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detection::{BoundingBox, DetectionSummary};
    use chrono::NaiveDate;

    /// Fuente monoespaciada: medio em por carácter.
    struct Mono;

    impl TextMeasure for Mono {
        fn text_width(&self, text: &str, font_size: f32) -> f32 {
            text.chars().count() as f32 * font_size * 0.5
        }
    }

    fn detection(i: usize) -> Detection {
        let f = i as f32;
        Detection {
            label: if i % 2 == 0 { "head".into() } else { "helmet".into() },
            confidence: 0.5 + (i % 50) as f32 / 100.0,
            bbox: BoundingBox::from_corners(f, f + 1.0, f + 10.0, f + 20.0),
        }
    }

    fn input(n: usize) -> ReportInput {
        let detections: Vec<Detection> = (0..n).map(detection).collect();
        ReportInput {
            image_id: "abc_test.png".into(),
            timestamp: NaiveDate::from_ymd_opt(2025, 12, 14)
                .unwrap()
                .and_hms_opt(8, 22, 27)
                .unwrap(),
            summary: DetectionSummary::from_detections(&detections),
            detections,
            annotated_image_base64: String::new(),
        }
    }

    #[test]
    fn header_comes_first_on_page_one() {
        let layout = compose_layout(&input(2), &PageGeometry::LETTER, &Mono);
        let lines: Vec<&str> = layout.text_lines().collect();
        assert_eq!(
            &lines[..6],
            &[
                "PPE Safety Incident Report",
                "Image ID: abc_test.png",
                "Timestamp: 2025-12-14 08:22:27",
                "Total Detections: 2",
                "Violations: 1",
                "Complaints: 1",
            ]
        );
        match &layout.pages[0].items[0] {
            LayoutItem::Text { x, y, .. } => {
                assert_eq!(*x, 30.0);
                assert_eq!(*y, 762.0);
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn detection_line_format() {
        let d = Detection {
            label: "helmet".into(),
            confidence: 0.8949,
            bbox: BoundingBox::from_corners(197.0, 41.0, 260.5, 112.0),
        };
        assert_eq!(
            detection_line(&d),
            "Class: helmet, Confidence: 0.89, BBox: [197.0, 41.0, 260.5, 112.0]"
        );
    }

    #[test]
    fn no_detections_keeps_image_on_first_page() {
        let layout = compose_layout(&input(0), &PageGeometry::LETTER, &Mono);
        assert_eq!(layout.page_count(), 1);
        let (page, item) = layout.image_placement().unwrap();
        assert_eq!(page, 0);
        // 762 - 30 - 4 * 20 - 30 = 622; 622 - 300 = 322
        assert_eq!(
            item,
            &LayoutItem::Image { x: 30.0, y: 322.0, width: 500.0, height: 300.0 }
        );
    }

    #[test]
    fn long_lists_span_pages_in_order_without_duplicates() {
        let n = 120;
        let data = input(n);
        let layout = compose_layout(&data, &PageGeometry::LETTER, &Mono);
        assert!(layout.page_count() > 1);

        let listed: Vec<&str> = layout
            .text_lines()
            .filter(|l| l.starts_with("Class:"))
            .collect();
        let expected: Vec<String> = data.detections.iter().map(detection_line).collect();
        assert_eq!(listed, expected);

        for page in &layout.pages {
            for item in &page.items {
                if let LayoutItem::Text { y, .. } = item {
                    assert!(*y >= 60.0, "line below bottom margin: {y}");
                    assert!(*y <= 762.0);
                }
            }
        }
    }

    #[test]
    fn first_page_holds_29_lines_then_breaks() {
        // Lista desde y=622 hasta y>=60 en pasos de 20.
        let layout = compose_layout(&input(30), &PageGeometry::LETTER, &Mono);
        let first = layout.pages[0]
            .items
            .iter()
            .filter(|i| matches!(i, LayoutItem::Text { text, .. } if text.starts_with("Class:")))
            .count();
        assert_eq!(first, 29);
        match &layout.pages[1].items[0] {
            LayoutItem::Text { y, .. } => assert_eq!(*y, 762.0),
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn image_moves_to_new_page_when_space_runs_out() {
        // 29 líneas dejan el cursor en 42: no caben 300 pt.
        let layout = compose_layout(&input(29), &PageGeometry::LETTER, &Mono);
        assert_eq!(layout.page_count(), 2);
        let (page, item) = layout.image_placement().unwrap();
        assert_eq!(page, 1);
        assert_eq!(
            item,
            &LayoutItem::Image { x: 30.0, y: 462.0, width: 500.0, height: 300.0 }
        );
    }

    #[test]
    fn wrap_is_greedy_and_never_emits_empty_lines() {
        // 10 caracteres por línea a 2 pt/carácter con 20 pt de ancho.
        let lines = wrap_words("aaaa bbbb cccc dddddddddddddd e", 20.0, 4.0, &Mono);
        assert_eq!(lines, vec!["aaaa bbbb", "cccc", "dddddddddddddd", "e"]);
        assert!(wrap_words("   ", 20.0, 4.0, &Mono).is_empty());
    }

    #[test]
    fn wrapped_detection_lines_paginate_individually() {
        let geometry = PageGeometry { width: 260.0, ..PageGeometry::LETTER };
        let data = input(40);
        let layout = compose_layout(&data, &geometry, &Mono);
        let joined: Vec<String> = {
            let mut out = Vec::new();
            for line in layout.text_lines().skip(6) {
                if line.starts_with("Class:") {
                    out.push(line.to_string());
                } else if let Some(last) = out.last_mut() {
                    last.push(' ');
                    last.push_str(line);
                }
            }
            out
        };
        let expected: Vec<String> = data.detections.iter().map(detection_line).collect();
        assert_eq!(joined, expected);
        assert!(layout.page_count() > 2);
    }
}
