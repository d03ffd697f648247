//! Palm detection.
//!
//! Palms are found instead of whole hands because they are rigid and nearly square. A palm box is
//! then widened into the region the landmark network looks at.

use std::path::Path;

use nalgebra::{Rotation2, Vector2};
use once_cell::sync::Lazy;

use crate::detection::{
    ssd::{AnchorLayer, Anchors},
    Detection, Network,
};
use crate::image::Rect;
use crate::nn::{Cnn, ColorMapper, NeuralNetwork, Outputs};

/// Palm keypoints, by their index in [`Detection::keypoints`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmKeypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;

static ANCHORS: Lazy<Anchors> = Lazy::new(|| {
    Anchors::new(&[
        AnchorLayer {
            boxes_per_cell: 2,
            grid_size: 24,
        },
        AnchorLayer {
            boxes_per_cell: 6,
            grid_size: 12,
        },
    ])
});

/// MediaPipe's palm detector, lite or full. Both take 192x192 inputs.
pub struct PalmDetectionNetwork {
    cnn: Cnn,
}

impl PalmDetectionNetwork {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cnn = Cnn::new(NeuralNetwork::load(path)?, ColorMapper::linear(0.0, 1.0))?;
        Ok(Self { cnn })
    }
}

impl Network for PalmDetectionNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, thresh: f32, out: &mut Vec<Detection>) {
        decode_palms(&self.cnn, outputs, thresh, out);
    }
}

fn decode_palms(cnn: &Cnn, outputs: &Outputs, thresh: f32, out: &mut Vec<Detection>) {
    assert_eq!(outputs[0].shape().last(), Some(&(4 + 2 * NUM_KEYPOINTS)));
    let first = out.len();
    ANCHORS.decode(cnn.input_resolution(), outputs, thresh, out);
    for palm in &mut out[first..] {
        palm.set_angle(palm_angle(palm));
    }
}

/// Clockwise rotation of a palm, zero when the fingers point straight up.
fn palm_angle(palm: &Detection) -> f32 {
    let wrist = palm.keypoints()[PalmKeypoint::Wrist as usize];
    let knuckle = palm.keypoints()[PalmKeypoint::MiddleFingerMcp as usize];
    let down = Vector2::new(wrist.x() - knuckle.x(), wrist.y() - knuckle.y());
    Rotation2::rotation_between(&Vector2::y(), &down).angle()
}

/// Region expected to contain the whole hand of `palm`.
///
/// The palm box is shifted half its height towards the fingers, then grown to 2.6 times its
/// size.
pub fn hand_region(palm: &Detection) -> Rect {
    let rect = palm.bounding_rect();
    let (sin, cos) = palm.angle().sin_cos();
    let shift = rect.height() / 2.0;
    rect.move_by(shift * sin, -shift * cos).grow_rel(0.8)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::detection::Keypoint;

    use super::*;

    fn palm(wrist: (f32, f32), knuckle: (f32, f32)) -> Detection {
        let mut keypoints = vec![Keypoint::new(0.0, 0.0); NUM_KEYPOINTS];
        keypoints[PalmKeypoint::Wrist as usize] = Keypoint::new(wrist.0, wrist.1);
        keypoints[PalmKeypoint::MiddleFingerMcp as usize] = Keypoint::new(knuckle.0, knuckle.1);
        Detection::with_keypoints(1.0, Rect::from_center(50.0, 50.0, 10.0, 10.0), keypoints)
    }

    #[test]
    fn palm_anchor_count() {
        assert_eq!(ANCHORS.len(), 2016);
    }

    #[test]
    fn palm_angles() {
        assert_relative_eq!(palm_angle(&palm((50.0, 60.0), (50.0, 40.0))), 0.0);
        // Fingers pointing right.
        assert_relative_eq!(
            palm_angle(&palm((40.0, 50.0), (60.0, 50.0))),
            std::f32::consts::FRAC_PI_2
        );
    }

    #[test]
    fn hand_region_extends_towards_fingers() {
        let upright = hand_region(&palm((50.0, 60.0), (50.0, 40.0)));
        let (xc, yc) = upright.center();
        assert_relative_eq!(xc, 50.0);
        assert_relative_eq!(yc, 45.0);
        assert_relative_eq!(upright.width(), 26.0);

        let mut sideways = palm((40.0, 50.0), (60.0, 50.0));
        sideways.set_angle(palm_angle(&sideways));
        let (xc, yc) = hand_region(&sideways).center();
        assert_relative_eq!(xc, 55.0, epsilon = 1e-4);
        assert_relative_eq!(yc, 50.0, epsilon = 1e-4);
    }
}
