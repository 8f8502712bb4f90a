use anyhow::{anyhow, Context, Result};
use printpdf::{image_crate, BuiltinFont, Image, ImageTransform, Mm, PdfDocument, PdfLayerReference};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::adapters::pdf::helvetica::HelveticaMetrics;
use crate::application::layout::{LayoutItem, ReportLayout, TextMeasure};
use crate::application::ports::ReportRendererPort;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::report::REPORT_TITLE;

const LAYER_NAME: &str = "Layer 1";
/// A 72 dpi un píxel de la imagen mide un punto PDF.
const IMAGE_DPI: f32 = 72.0;

fn pt(v: f32) -> Mm {
    Mm(v * 25.4 / 72.0)
}

/// Renderer `printpdf` con Helvetica integrada. Escribe en un temporal del
/// mismo directorio y lo renombra al final: o hay informe completo o no hay nada.
#[derive(Debug, Default)]
pub struct PrintPdfRenderer {
    metrics: HelveticaMetrics,
}

impl PrintPdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_document(&self, layout: &ReportLayout, image_bytes: &[u8], out: &mut File) -> Result<()> {
        let image = image_crate::load_from_memory(image_bytes)
            .context("annotated image could not be decoded")?;
        let (img_w, img_h) = (image.width().max(1) as f32, image.height().max(1) as f32);
        // Sin canal alfa: printpdf sólo incrusta RGB de forma fiable.
        let image = image_crate::DynamicImage::ImageRgb8(image.to_rgb8());

        let g = &layout.geometry;
        let (doc, first_page, first_layer) =
            PdfDocument::new(REPORT_TITLE, pt(g.width), pt(g.height), LAYER_NAME);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("builtin font: {e}"))?;

        for (idx, page) in layout.pages.iter().enumerate() {
            let layer: PdfLayerReference = if idx == 0 {
                doc.get_page(first_page).get_layer(first_layer)
            } else {
                let (p, l) = doc.add_page(pt(g.width), pt(g.height), LAYER_NAME);
                doc.get_page(p).get_layer(l)
            };

            for item in &page.items {
                match item {
                    LayoutItem::Text { x, y, text } => {
                        layer.use_text(text.as_str(), g.font_size, pt(*x), pt(*y), &font);
                    }
                    LayoutItem::Image { x, y, width, height } => {
                        Image::from_dynamic_image(&image).add_to_layer(
                            layer.clone(),
                            ImageTransform {
                                translate_x: Some(pt(*x)),
                                translate_y: Some(pt(*y)),
                                scale_x: Some(width / img_w),
                                scale_y: Some(height / img_h),
                                dpi: Some(IMAGE_DPI),
                                ..Default::default()
                            },
                        );
                    }
                }
            }
        }

        let mut writer = BufWriter::new(out);
        doc.save(&mut writer).map_err(|e| anyhow!("pdf serialization: {e}"))?;
        writer.flush()?;
        Ok(())
    }
}

impl ReportRendererPort for PrintPdfRenderer {
    fn text_measure(&self) -> &dyn TextMeasure {
        &self.metrics
    }

    fn render(&self, layout: &ReportLayout, image_bytes: &[u8], output_path: &Path) -> DomainResult<()> {
        let dir = output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let mut tmp = tempfile::Builder::new()
            .prefix(".report_")
            .suffix(".partial")
            .tempfile_in(dir)
            .map_err(|e| DomainError::processing("failed to create report file", e))?;

        self.write_document(layout, image_bytes, tmp.as_file_mut())
            .map_err(|e| DomainError::processing("failed to draw PDF report", format!("{e:#}")))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| DomainError::processing("failed to flush PDF report", e))?;

        // Si algo falla antes, el temporal se borra al soltarlo.
        tmp.persist(output_path)
            .map_err(|e| DomainError::processing("failed to persist PDF report", e.error))?;
        Ok(())
    }
}
