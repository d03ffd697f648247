//! Non-maximum suppression.
//!
//! Neighbouring SSD anchors fire on the same object, so raw detections come in overlapping
//! clusters. Each cluster is reduced to one detection around its most confident member.

use itertools::{zip_eq, Itertools};

use crate::image::Rect;

use super::{Detection, Keypoint};

/// How a cluster of overlapping detections is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Keep only the most confident detection.
    Remove,
    /// Replace the cluster by its confidence-weighted mean. Steadier across frames.
    Average,
}

pub struct NonMaxSuppression {
    mode: SuppressionMode,
    iou_thresh: f32,
}

impl NonMaxSuppression {
    /// Overlap at which two detections count as the same object.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new(mode: SuppressionMode, iou_thresh: f32) -> Self {
        Self { mode, iou_thresh }
    }

    /// Merges overlapping detections in place.
    ///
    /// The result is ordered by the confidence of each cluster's most confident member, highest
    /// first.
    pub fn process(&self, detections: &mut Vec<Detection>) {
        let mut pending = std::mem::take(detections);
        pending.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));

        while !pending.is_empty() {
            let seed_rect = pending[0].bounding_rect();
            let (cluster, rest): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|det| seed_rect.iou(&det.bounding_rect()) >= self.iou_thresh);
            pending = rest;

            // The seed overlaps itself, so it leads its cluster.
            let merged = match self.mode {
                SuppressionMode::Remove => cluster.into_iter().next(),
                SuppressionMode::Average => weighted_mean(&cluster),
            };
            detections.extend(merged);
        }
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new(SuppressionMode::Average, Self::DEFAULT_IOU_THRESH)
    }
}

/// Averages box and keypoints weighted by confidence. Confidence and angle come from the first
/// detection.
fn weighted_mean(cluster: &[Detection]) -> Option<Detection> {
    let seed = cluster.first()?;
    let total: f32 = cluster.iter().map(Detection::confidence).sum();
    if total <= 0.0 {
        return Some(seed.clone());
    }

    let mut rect = [0.0; 4];
    let mut keypoints = vec![(0.0, 0.0); seed.keypoints().len()];
    for det in cluster {
        let weight = det.confidence();
        let r = det.bounding_rect();
        let (xc, yc) = r.center();
        for (sum, v) in rect.iter_mut().zip([xc, yc, r.width(), r.height()]) {
            *sum += v * weight;
        }
        for (sum, kp) in zip_eq(&mut keypoints, det.keypoints()) {
            sum.0 += kp.x() * weight;
            sum.1 += kp.y() * weight;
        }
    }

    let [xc, yc, w, h] = rect.map(|sum| sum / total);
    let keypoints = keypoints
        .into_iter()
        .map(|(x, y)| Keypoint::new(x / total, y / total))
        .collect_vec();
    let mut mean =
        Detection::with_keypoints(seed.confidence(), Rect::from_center(xc, yc, w, h), keypoints);
    mean.set_angle(seed.angle());
    Some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remove() -> NonMaxSuppression {
        NonMaxSuppression::new(SuppressionMode::Remove, NonMaxSuppression::DEFAULT_IOU_THRESH)
    }

    #[test]
    fn keeps_most_confident_of_cluster() {
        let rect = Rect::from_center(0.0, 0.0, 1.0, 1.0);
        let mut detections = vec![
            Detection::new(0.55, rect.scale(1.5)),
            Detection::new(0.6, rect),
        ];
        remove().process(&mut detections);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence(), 0.6);
        assert_eq!(detections[0].bounding_rect(), rect);
    }

    #[test]
    fn separate_objects_survive() {
        let mut detections = vec![
            Detection::new(0.9, Rect::from_center(0.0, 0.0, 1.0, 1.0)),
            Detection::new(1.0, Rect::from_center(5.0, 0.0, 1.0, 1.0)),
        ];
        remove().process(&mut detections);
        let confidences = detections.iter().map(Detection::confidence).collect_vec();
        assert_eq!(confidences, [1.0, 0.9]);
    }

    #[test]
    fn averages_cluster() {
        let rect = Rect::from_center(-1.0, 3.0, 1.0, 1.0);
        let mut detections = vec![
            Detection::with_keypoints(0.5, rect.scale(4.0), vec![Keypoint::new(3.0, 3.0)]),
            Detection::with_keypoints(1.0, rect, vec![Keypoint::new(0.0, 0.0)]),
        ];
        detections[1].set_angle(0.25);
        NonMaxSuppression::new(SuppressionMode::Average, 0.0).process(&mut detections);
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        assert_eq!(d.confidence(), 1.0);
        assert_eq!(d.angle(), 0.25);
        assert_eq!(d.bounding_rect(), Rect::from_center(-1.0, 3.0, 2.0, 2.0));
        assert_eq!(d.keypoints(), &[Keypoint::new(1.0, 1.0)]);
    }
}
