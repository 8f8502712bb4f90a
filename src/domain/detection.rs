use serde::{Deserialize, Serialize};

pub const HELMET_CLASS: &str = "helmet";
pub const NO_HELMET_CLASS: &str = "head";

/// Caja en coordenadas de píxel: `[x_min, y_min, x_max, y_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    /// Construye la caja ordenando las esquinas para que `min <= max`.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x_min: x1.min(x2),
            y_min: y1.min(y2),
            x_max: x1.max(x2),
            y_max: y1.max(y2),
        }
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x_min.max(other.x_min);
        let y1 = self.y_min.max(other.y_min);
        let x2 = self.x_max.min(other.x_max);
        let y2 = self.y_max.min(other.y_max);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    pub fn clamp_to(&self, width: f32, height: f32) -> Self {
        Self {
            x_min: self.x_min.clamp(0.0, width),
            y_min: self.y_min.clamp(0.0, height),
            x_max: self.x_max.clamp(0.0, width),
            y_max: self.y_max.clamp(0.0, height),
        }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x_min, self.y_min, self.x_max, self.y_max]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Conteo casco / sin casco de una imagen. Otras clases no cuentan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub helmet_count: u32,
    pub no_helmet_count: u32,
}

impl DetectionSummary {
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut summary = Self::default();
        for label in labels {
            match label {
                HELMET_CLASS => summary.helmet_count += 1,
                NO_HELMET_CLASS => summary.no_helmet_count += 1,
                _ => {}
            }
        }
        summary
    }

    pub fn from_detections(detections: &[Detection]) -> Self {
        Self::from_labels(detections.iter().map(|d| d.label.as_str()))
    }

    /// Cascos ausentes: cada clase "head" es una infracción.
    pub fn violations(&self) -> u32 {
        self.no_helmet_count
    }

    pub fn compliant(&self) -> u32 {
        self.helmet_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str) -> Detection {
        Detection {
            label: label.to_string(),
            confidence: 0.9,
            bbox: BoundingBox::from_corners(0.0, 0.0, 10.0, 10.0),
        }
    }

    #[test]
    fn summary_ignores_other_classes() {
        let dets = vec![det("helmet"), det("head"), det("person"), det("helmet")];
        let summary = DetectionSummary::from_detections(&dets);
        assert_eq!(summary.helmet_count, 2);
        assert_eq!(summary.no_helmet_count, 1);
        assert_eq!(summary.violations(), 1);
        assert_eq!(summary.compliant(), 2);
    }

    #[test]
    fn summary_is_order_independent() {
        let mut dets = vec![det("head"), det("helmet"), det("person"), det("head"), det("helmet")];
        let expected = DetectionSummary::from_detections(&dets);
        dets.reverse();
        assert_eq!(DetectionSummary::from_detections(&dets), expected);
        dets.rotate_left(2);
        assert_eq!(DetectionSummary::from_detections(&dets), expected);
        assert_eq!(expected.helmet_count + expected.no_helmet_count, 4);
    }

    #[test]
    fn corners_are_normalized() {
        let b = BoundingBox::from_corners(20.0, 5.0, 10.0, 15.0);
        assert_eq!(b.to_array(), [10.0, 5.0, 20.0, 15.0]);
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::from_corners(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::from_corners(20.0, 20.0, 30.0, 30.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), 0.0);

        let half = BoundingBox::from_corners(5.0, 0.0, 15.0, 10.0);
        // 50 / (100 + 100 - 50)
        assert!((a.iou(&half) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_keeps_box_inside_image() {
        let b = BoundingBox::from_corners(-4.0, -1.0, 700.0, 300.0).clamp_to(640.0, 480.0);
        assert_eq!(b.to_array(), [0.0, 0.0, 640.0, 300.0]);
    }
}
