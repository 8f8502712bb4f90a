use anyhow::{bail, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::{s, ArrayView2, ArrayViewD, Axis, Ix2, IxDyn};
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::Session;
use ort::value::Tensor;
use std::fs;
use std::path::Path;

use crate::domain::detection::BoundingBox;
use crate::domain::model::YoloParams;

/// Candidato ya filtrado, antes de asignarle nombre de clase.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub score: f32,
    pub bbox: BoundingBox,
}

pub struct OnnxYoloEngine {
    session: Session,
    device: &'static str,
}

/// Se consulta una sola vez, al cargar el modelo.
pub fn cuda_available() -> bool {
    CUDAExecutionProvider::default().is_available().unwrap_or(false)
}

impl OnnxYoloEngine {
    pub fn load(path: &Path) -> Result<Self> {
        let mut builder = Session::builder()?.with_intra_threads(4)?;
        let mut device = "cpu";

        // CUDA es opcional: si está disponible se registra, si no continuamos en CPU.
        if cuda_available() {
            let cuda = CUDAExecutionProvider::default().build();
            if let Ok(builder_with_cuda) = builder.clone().with_execution_providers([cuda]) {
                builder = builder_with_cuda;
                device = "cuda";
            }
        }

        let model_bytes = fs::read(path)?;
        let session = builder.commit_from_memory(&model_bytes)?;

        Ok(Self { session, device })
    }

    pub fn device(&self) -> &'static str {
        self.device
    }

    pub fn infer(&mut self, rgb: &RgbImage, params: &YoloParams) -> Result<Vec<RawDetection>> {
        let imgsz = params.input_size as usize;
        let input = preprocess(rgb, params.input_size);

        let input_shape = vec![1, 3, imgsz as i64, imgsz as i64];
        let input_tensor = Tensor::from_array((input_shape, input))?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;
        let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape_out.iter().map(|&x| x as usize).collect();
        if dims.len() != 3 || dims[0] != 1 || dims[1] < 5 {
            bail!("unexpected YOLO output shape {:?}", dims);
        }
        let array_view = ArrayViewD::from_shape(IxDyn(&dims), data_out)?;
        let view = array_view.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;

        let sx = rgb.width() as f32 / imgsz as f32;
        let sy = rgb.height() as f32 / imgsz as f32;
        Ok(postprocess(view, sx, sy, rgb.width() as f32, rgb.height() as f32, params))
    }
}

/// RGB -> tensor NCHW normalizado a [0, 1].
pub fn preprocess(rgb: &RgbImage, input_size: u32) -> Vec<f32> {
    let imgsz = input_size as usize;
    let resized = image::imageops::resize(rgb, input_size, input_size, FilterType::Triangle);
    let plane = imgsz * imgsz;

    let mut input = vec![0f32; 3 * plane];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = y as usize * imgsz + x as usize;
        input[idx] = pixel[0] as f32 / 255.0;
        input[plane + idx] = pixel[1] as f32 / 255.0;
        input[2 * plane + idx] = pixel[2] as f32 / 255.0;
    }
    input
}

/// Decodifica la salida `[4 + clases, candidatos]` (cx, cy, w, h, puntuaciones...).
pub fn postprocess(
    view: ArrayView2<f32>,
    sx: f32,
    sy: f32,
    image_w: f32,
    image_h: f32,
    params: &YoloParams,
) -> Vec<RawDetection> {
    let num_candidates = view.shape()[1];
    let mut detections = Vec::new();

    for i in 0..num_candidates {
        let scores = view.slice(s![4.., i]);
        let Some((class_id, &max_score)) = scores
            .indexed_iter()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };

        if max_score > params.conf_threshold {
            let cx = view[[0, i]];
            let cy = view[[1, i]];
            let w = view[[2, i]];
            let h = view[[3, i]];

            let bbox = BoundingBox::from_corners(
                (cx - w / 2.0) * sx,
                (cy - h / 2.0) * sy,
                (cx + w / 2.0) * sx,
                (cy + h / 2.0) * sy,
            )
            .clamp_to(image_w, image_h);

            detections.push(RawDetection { class_id, score: max_score, bbox });
        }
    }

    let mut kept = nms(detections, params.iou_threshold);
    kept.truncate(params.max_detections);
    kept
}

/// NMS voraz por clase. Devuelve el resultado ordenado por puntuación.
pub fn nms(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut result: Vec<RawDetection> = Vec::new();
    for det in detections {
        let suppressed = result
            .iter()
            .any(|kept| kept.class_id == det.class_id && kept.bbox.iou(&det.bbox) >= iou_threshold);
        if !suppressed {
            result.push(det);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn params() -> YoloParams {
        YoloParams { input_size: 640, conf_threshold: 0.25, iou_threshold: 0.45, max_detections: 300 }
    }

    /// Construye una salida con 2 clases: filas cx, cy, w, h, s0, s1.
    fn output(candidates: &[[f32; 6]]) -> Array2<f32> {
        let mut out = Array2::<f32>::zeros((6, candidates.len()));
        for (i, c) in candidates.iter().enumerate() {
            for (row, v) in c.iter().enumerate() {
                out[[row, i]] = *v;
            }
        }
        out
    }

    #[test]
    fn low_scores_are_dropped_and_boxes_rescaled() {
        let out = output(&[
            [100.0, 100.0, 20.0, 40.0, 0.10, 0.90],
            [300.0, 300.0, 10.0, 10.0, 0.20, 0.05],
        ]);
        let dets = postprocess(out.view(), 2.0, 0.5, 1280.0, 320.0, &params());
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert!((dets[0].score - 0.9).abs() < 1e-6);
        assert_eq!(dets[0].bbox.to_array(), [180.0, 40.0, 220.0, 60.0]);
    }

    #[test]
    fn overlapping_boxes_of_same_class_are_suppressed() {
        let out = output(&[
            [100.0, 100.0, 50.0, 50.0, 0.8, 0.0],
            [102.0, 101.0, 50.0, 50.0, 0.7, 0.0],
            // Misma caja, otra clase: se conserva.
            [100.0, 100.0, 50.0, 50.0, 0.0, 0.6],
            [400.0, 400.0, 50.0, 50.0, 0.5, 0.0],
        ]);
        let dets = postprocess(out.view(), 1.0, 1.0, 640.0, 640.0, &params());
        let classes: Vec<usize> = dets.iter().map(|d| d.class_id).collect();
        assert_eq!(classes, vec![0, 1, 0]);
        assert!(dets.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn max_detections_caps_the_result() {
        let candidates: Vec<[f32; 6]> = (0..10)
            .map(|i| [20.0 + i as f32 * 60.0, 20.0, 10.0, 10.0, 0.5 + i as f32 * 0.01, 0.0])
            .collect();
        let mut p = params();
        p.max_detections = 3;
        let dets = postprocess(output(&candidates).view(), 1.0, 1.0, 640.0, 640.0, &p);
        assert_eq!(dets.len(), 3);
        assert!((dets[0].score - 0.59).abs() < 1e-6);
    }

    #[test]
    fn boxes_are_clamped_to_the_image() {
        let out = output(&[[5.0, 5.0, 40.0, 40.0, 0.9, 0.0]]);
        let dets = postprocess(out.view(), 1.0, 1.0, 100.0, 100.0, &params());
        assert_eq!(dets[0].bbox.to_array(), [0.0, 0.0, 25.0, 25.0]);
    }

    #[test]
    fn preprocess_is_planar_and_normalized() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 51]));
        let input = preprocess(&img, 2);
        assert_eq!(input.len(), 3 * 2 * 2);
        assert!(input[..4].iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(input[4..8].iter().all(|&v| v.abs() < 1e-6));
        assert!(input[8..].iter().all(|&v| (v - 0.2).abs() < 1e-6));
    }
}
