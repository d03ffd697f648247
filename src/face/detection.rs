//! BlazeFace face detection.
//!
//! See MediaPipe's [Face Detection] solution for the networks.
//!
//! [Face Detection]: https://google.github.io/mediapipe/solutions/face_detection

use std::path::Path;

use nalgebra::{Rotation2, Vector2};
use once_cell::sync::Lazy;

use crate::detection::{
    ssd::{AnchorLayer, Anchors},
    Detection, Network,
};
use crate::nn::{Cnn, ColorMapper, NeuralNetwork, Outputs};

/// Face keypoints, by their index in [`Detection::keypoints`].
///
/// Left and right are as seen in the image, not from the person's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKeypoint {
    LeftEye = 0,
    RightEye = 1,
    NoseTip = 2,
    Mouth = 3,
    LeftEarTragion = 4,
    RightEarTragion = 5,
}

const NUM_KEYPOINTS: usize = 6;

/// BlazeFace model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceRange {
    /// 128x128 input, for faces within about 2m of the camera.
    Short,
    /// 192x192 input with a longer reach, roughly 5 times slower.
    Full,
}

impl FaceRange {
    fn anchors(self) -> &'static Anchors {
        static SHORT: Lazy<Anchors> = Lazy::new(|| {
            Anchors::new(&[
                AnchorLayer {
                    boxes_per_cell: 2,
                    grid_size: 16,
                },
                AnchorLayer {
                    boxes_per_cell: 6,
                    grid_size: 8,
                },
            ])
        });
        static FULL: Lazy<Anchors> = Lazy::new(|| {
            Anchors::new(&[AnchorLayer {
                boxes_per_cell: 1,
                grid_size: 48,
            }])
        });

        match self {
            FaceRange::Short => &SHORT,
            FaceRange::Full => &FULL,
        }
    }
}

pub struct FaceDetectionNetwork {
    cnn: Cnn,
    range: FaceRange,
}

impl FaceDetectionNetwork {
    /// Loads a BlazeFace model. `range` must match the file.
    pub fn load<P: AsRef<Path>>(path: P, range: FaceRange) -> anyhow::Result<Self> {
        let cnn = Cnn::new(NeuralNetwork::load(path)?, ColorMapper::linear(-1.0, 1.0))?;
        Ok(Self { cnn, range })
    }
}

impl Network for FaceDetectionNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, thresh: f32, out: &mut Vec<Detection>) {
        decode_faces(&self.cnn, self.range, outputs, thresh, out);
    }
}

fn decode_faces(
    cnn: &Cnn,
    range: FaceRange,
    outputs: &Outputs,
    thresh: f32,
    out: &mut Vec<Detection>,
) {
    assert_eq!(outputs[0].shape().last(), Some(&(4 + 2 * NUM_KEYPOINTS)));
    let first = out.len();
    range
        .anchors()
        .decode(cnn.input_resolution(), outputs, thresh, out);
    for face in &mut out[first..] {
        face.set_angle(eye_line_angle(face));
    }
}

/// Clockwise tilt of the line from the left to the right eye.
fn eye_line_angle(face: &Detection) -> f32 {
    let left = face.keypoints()[FaceKeypoint::LeftEye as usize];
    let right = face.keypoints()[FaceKeypoint::RightEye as usize];
    let eyes = Vector2::new(right.x() - left.x(), right.y() - left.y());
    Rotation2::rotation_between(&Vector2::x(), &eyes).angle()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::detection::Keypoint;
    use crate::image::Rect;

    use super::*;

    #[test]
    fn anchor_counts() {
        assert_eq!(FaceRange::Short.anchors().len(), 896);
        assert_eq!(FaceRange::Full.anchors().len(), 2304);
    }

    #[test]
    fn eye_line() {
        let face = |left: (f32, f32), right: (f32, f32)| {
            let mut keypoints = vec![Keypoint::new(0.0, 0.0); NUM_KEYPOINTS];
            keypoints[FaceKeypoint::LeftEye as usize] = Keypoint::new(left.0, left.1);
            keypoints[FaceKeypoint::RightEye as usize] = Keypoint::new(right.0, right.1);
            Detection::with_keypoints(1.0, Rect::from_center(0.0, 0.0, 1.0, 1.0), keypoints)
        };
        assert_relative_eq!(eye_line_angle(&face((0.0, 0.0), (4.0, 0.0))), 0.0);
        assert_relative_eq!(
            eye_line_angle(&face((0.0, 0.0), (4.0, 4.0))),
            std::f32::consts::FRAC_PI_4
        );
    }
}
