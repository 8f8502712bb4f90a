use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;

use crate::domain::detection::{Detection, HELMET_CLASS, NO_HELMET_CLASS};

const BOX_THICKNESS: i32 = 2;
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_PADDING: i32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Color por clase: casco en verde, cabeza descubierta en rojo, resto en azul.
pub fn class_color(label: &str) -> Rgb<u8> {
    match label {
        HELMET_CLASS => Rgb([0, 200, 0]),
        NO_HELMET_CLASS => Rgb([220, 0, 0]),
        _ => Rgb([0, 0, 255]),
    }
}

/// Pinta cajas y, si hay fuente configurada, la etiqueta `clase confianza`.
pub struct Annotator {
    font: Option<FontArc>,
}

impl Annotator {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    pub fn with_font_file(path: Option<&Path>) -> Result<Self> {
        let font = match path {
            Some(p) => {
                let data = std::fs::read(p).with_context(|| format!("reading font {}", p.display()))?;
                Some(FontArc::try_from_vec(data).with_context(|| format!("invalid font {}", p.display()))?)
            }
            None => None,
        };
        Ok(Self::new(font))
    }

    pub fn draw(&self, image: &mut RgbImage, detections: &[Detection]) {
        for det in detections {
            self.draw_one(image, det);
        }
    }

    fn draw_one(&self, image: &mut RgbImage, det: &Detection) {
        let (w, h) = (image.width() as i32, image.height() as i32);
        if w == 0 || h == 0 {
            return;
        }

        let x_min = (det.bbox.x_min.floor() as i32).clamp(0, w - 1);
        let y_min = (det.bbox.y_min.floor() as i32).clamp(0, h - 1);
        let x_max = (det.bbox.x_max.ceil() as i32).clamp(0, w - 1);
        let y_max = (det.bbox.y_max.ceil() as i32).clamp(0, h - 1);
        if x_min >= x_max || y_min >= y_max {
            return;
        }

        let color = class_color(&det.label);
        for t in 0..BOX_THICKNESS {
            let bw = x_max - x_min - 2 * t;
            let bh = y_max - y_min - 2 * t;
            if bw <= 0 || bh <= 0 {
                break;
            }
            let rect = Rect::at(x_min + t, y_min + t).of_size(bw as u32 + 1, bh as u32 + 1);
            draw_hollow_rect_mut(image, rect, color);
        }

        let Some(font) = &self.font else {
            return;
        };

        let label = format!("{} {:.2}", det.label, det.confidence);
        let scale = PxScale::from(LABEL_FONT_SIZE);
        let (text_w, text_h) = text_size(scale, font, &label);
        let label_h = text_h as i32 + 2 * LABEL_PADDING;
        let label_x = x_min;
        let label_y = (y_min - label_h).max(0);
        let label_w = (text_w as i32 + 2 * LABEL_PADDING).min(w - label_x);

        if label_w > 0 && label_h > 0 {
            let rect = Rect::at(label_x, label_y).of_size(label_w as u32, label_h as u32);
            draw_filled_rect_mut(image, rect, color);
            draw_text_mut(
                image,
                TEXT_COLOR,
                label_x + LABEL_PADDING,
                label_y + LABEL_PADDING,
                scale,
                font,
                &label,
            );
        }
    }
}
