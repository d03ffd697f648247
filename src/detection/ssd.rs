//! Single Shot Detector (SSD) anchors and box decoding.
//!
//! The MediaPipe palm and face detectors both predict, for every anchor, one logit and a row of
//! `[dx, dy, w, h, kx0, ky0, kx1, ky1, ...]` offsets in input pixels relative to the anchor's
//! center. Their anchors are fixed at the center of each feature map cell.

use std::ops::Index;

use crate::image::{Rect, Resolution};
use crate::nn::Outputs;

use super::{Detection, Keypoint};

/// The logistic function, turning a logit into a confidence in `0.0..=1.0`.
pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// One square output feature map of an SSD network.
#[derive(Debug, Clone, Copy)]
pub struct AnchorLayer {
    /// Anchors sharing each cell. Must be non-zero.
    pub boxes_per_cell: u32,
    /// Cells along each side of the feature map.
    pub grid_size: u32,
}

/// Anchor centers of a network, in output order, relative to the input size.
#[derive(Debug)]
pub struct Anchors {
    centers: Vec<(f32, f32)>,
}

impl Anchors {
    pub fn new(layers: &[AnchorLayer]) -> Self {
        let mut centers = Vec::new();
        for layer in layers {
            assert_ne!(layer.boxes_per_cell, 0, "anchor layer without boxes");
            let cell = 1.0 / layer.grid_size as f32;
            for row in 0..layer.grid_size {
                for col in 0..layer.grid_size {
                    let center = ((col as f32 + 0.5) * cell, (row as f32 + 0.5) * cell);
                    centers.extend((0..layer.boxes_per_cell).map(|_| center));
                }
            }
        }
        Self { centers }
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Decodes every anchor whose confidence reaches `thresh` and appends it to `out`.
    ///
    /// `outputs[0]` holds the box rows with shape `[1, anchors, 4 + 2 * keypoints]`, `outputs[1]`
    /// the logits with shape `[1, anchors, 1]`. Coordinates are in pixels of an input of size
    /// `input_res`.
    pub fn decode(
        &self,
        input_res: Resolution,
        outputs: &Outputs,
        thresh: f32,
        out: &mut Vec<Detection>,
    ) {
        let (boxes, logits) = (&outputs[0], &outputs[1]);
        let row_len = boxes.shape()[2];
        assert_eq!(boxes.shape(), &[1, self.len(), row_len]);
        assert_eq!(logits.shape(), &[1, self.len(), 1]);
        assert!(row_len >= 4 && row_len % 2 == 0, "bad box row length {row_len}");

        let (w, h) = (input_res.width() as f32, input_res.height() as f32);
        for (i, logit) in logits.index([0]).rows().enumerate() {
            let confidence = sigmoid(logit.as_slice()[0]);
            if confidence < thresh {
                continue;
            }

            let (ax, ay) = (self[i].0 * w, self[i].1 * h);
            let row = boxes.index([0, i]);
            let row = row.as_slice();
            let rect = Rect::from_center(ax + row[0], ay + row[1], row[2], row[3]);
            let keypoints = row[4..]
                .chunks_exact(2)
                .map(|k| Keypoint::new(ax + k[0], ay + k[1]))
                .collect();
            out.push(Detection::with_keypoints(confidence, rect, keypoints));
        }
    }
}

impl Index<usize> for Anchors {
    type Output = (f32, f32);

    fn index(&self, index: usize) -> &(f32, f32) {
        &self.centers[index]
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::nn::tensor::Tensor;

    use super::*;

    #[test]
    fn sigmoid_range() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert_relative_eq!(sigmoid(50.0), 1.0);
        assert_relative_eq!(sigmoid(-50.0), 0.0);
    }

    #[test]
    fn anchor_centers() {
        let anchors = Anchors::new(&[
            AnchorLayer {
                boxes_per_cell: 2,
                grid_size: 2,
            },
            AnchorLayer {
                boxes_per_cell: 1,
                grid_size: 1,
            },
        ]);
        assert_eq!(anchors.len(), 9);
        assert_eq!(anchors[0], anchors[1]);
        assert_eq!(anchors[0], (0.25, 0.25));
        assert_eq!(anchors[2], (0.75, 0.25));
        assert_eq!(anchors[4], (0.25, 0.75));
        assert_eq!(anchors[8], (0.5, 0.5));
    }

    #[test]
    fn decode_offsets_from_anchor() {
        let anchors = Anchors::new(&[AnchorLayer {
            boxes_per_cell: 1,
            grid_size: 2,
        }]);
        let mut rows = vec![0.0; 4 * 6];
        // Anchor 3 sits at (75, 75) in a 100x100 input.
        rows[18..].copy_from_slice(&[1.0, -1.0, 10.0, 20.0, 5.0, 5.0]);
        let outputs: Outputs = [
            Tensor::from_iter(&[1, 4, 6], rows),
            Tensor::from_iter(&[1, 4, 1], [-9.0, 0.0, -9.0, 9.0]),
        ]
        .into_iter()
        .collect();

        let mut out = Vec::new();
        anchors.decode(Resolution::new(100, 100), &outputs, 0.5, &mut out);
        // Anchor 1 has a confidence of exactly 0.5.
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[1].bounding_rect(),
            Rect::from_center(76.0, 74.0, 10.0, 20.0)
        );
        assert_eq!(out[1].keypoints(), &[Keypoint::new(80.0, 80.0)]);
        assert!(out[1].confidence() > 0.99);
    }
}
