//! Hand landmark estimation.

use std::path::Path;

use itertools::{zip_eq, Itertools};

use crate::gesture::FingerState;
use crate::image::{draw, AsImageViewMut, Color};
use crate::landmark::{Estimate, Landmarks, Network};
use crate::nn::{Cnn, ColorMapper, NeuralNetwork, Outputs};

/// Landmarks per hand.
pub const NUM_LANDMARKS: usize = 21;

/// One hand as seen by [`LandmarkNetwork`].
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    presence: f32,
    right_handedness: f32,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        Self {
            landmarks: Landmarks::new(NUM_LANDMARKS),
            presence: 0.0,
            right_handedness: 0.0,
        }
    }
}

impl LandmarkResult {
    /// Builds a result from known pixel positions, for hands that did not come from the network.
    ///
    /// Panics unless `positions` has [`NUM_LANDMARKS`] entries.
    pub fn from_positions(positions: &[[f32; 3]], presence: f32, handedness: Handedness) -> Self {
        let mut landmarks = Landmarks::new(NUM_LANDMARKS);
        for (dst, src) in zip_eq(landmarks.positions_mut(), positions) {
            *dst = *src;
        }
        let right_handedness = match handedness {
            Handedness::Left => 0.0,
            Handedness::Right => 1.0,
        };
        Self {
            landmarks,
            presence,
            right_handedness,
        }
    }

    /// Landmarks in the coordinates of the image the hand was tracked in.
    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    fn position(&self, idx: LandmarkIdx) -> [f32; 3] {
        self.landmarks.get(idx as usize)
    }

    /// Confidence that a hand is in view, `0.0..=1.0`.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Which hand this is, according to the network.
    ///
    /// The label describes the hand as it appears in the image the network was given. Frames are
    /// usually mirrored before processing, which swaps what the person would call their own left
    /// and right. Only meaningful while [`LandmarkResult::presence`] is high.
    pub fn handedness(&self) -> Handedness {
        if self.right_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }

    /// Which fingers of this hand are extended.
    pub fn finger_state(&self) -> FingerState {
        FingerState::from_landmarks(self.landmarks.positions(), self.handedness())
    }

    /// Draws the hand skeleton in green with a red marker on every landmark.
    pub fn draw<I: AsImageViewMut>(&self, target: &mut I) {
        let mut target = target.as_view_mut();
        for (from, to) in bones() {
            let [x0, y0, _] = self.position(from);
            let [x1, y1, _] = self.position(to);
            draw::line(&mut target, x0, y0, x1, y1).color(Color::GREEN);
        }
        for &[x, y, _] in self.landmarks.positions() {
            draw::marker(&mut target, x, y);
        }
    }
}

impl Estimate for LandmarkResult {
    fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    fn confidence(&self) -> f32 {
        self.presence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// Hand landmark indices.
///
/// Joints from the wrist outwards: the thumb has CMC (carpometacarpal), MCP, IP and tip. The
/// other fingers have MCP (the knuckle), PIP, DIP and tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Joints of each finger from the base outwards, thumb first.
const FINGER_CHAINS: [[LandmarkIdx; 4]; 5] = {
    use LandmarkIdx::*;
    [
        [ThumbCmc, ThumbMcp, ThumbIp, ThumbTip],
        [IndexFingerMcp, IndexFingerPip, IndexFingerDip, IndexFingerTip],
        [MiddleFingerMcp, MiddleFingerPip, MiddleFingerDip, MiddleFingerTip],
        [RingFingerMcp, RingFingerPip, RingFingerDip, RingFingerTip],
        [PinkyMcp, PinkyPip, PinkyDip, PinkyTip],
    ]
};

/// Closed outline of the palm.
const PALM_OUTLINE: [LandmarkIdx; 6] = {
    use LandmarkIdx::*;
    [Wrist, ThumbCmc, IndexFingerMcp, MiddleFingerMcp, RingFingerMcp, PinkyMcp]
};

/// Landmark pairs joined by a line in the skeleton.
fn bones() -> impl Iterator<Item = (LandmarkIdx, LandmarkIdx)> {
    let fingers = FINGER_CHAINS
        .iter()
        .flat_map(|chain| chain.iter().copied().tuple_windows());
    let palm = PALM_OUTLINE.iter().copied().circular_tuple_windows();
    fingers.chain(palm)
}

/// MediaPipe's hand landmark network on 224x224 crops.
///
/// Outputs 21 landmarks in input pixels, a presence score and a right-handedness score.
#[derive(Clone)]
pub struct LandmarkNetwork {
    cnn: Cnn,
}

impl LandmarkNetwork {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cnn = Cnn::new(NeuralNetwork::load(path)?, ColorMapper::linear(0.0, 1.0))?;
        Ok(Self { cnn })
    }
}

impl Network for LandmarkNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut LandmarkResult) {
        decode(outputs, estimate);
    }
}

fn decode(outputs: &Outputs, hand: &mut LandmarkResult) {
    let (coords, presence, handedness) = (&outputs[0], &outputs[1], &outputs[2]);
    assert_eq!(coords.shape(), &[1, NUM_LANDMARKS * 3]);
    assert_eq!(presence.shape(), &[1, 1]);
    assert_eq!(handedness.shape(), &[1, 1]);

    hand.presence = presence.index([0, 0]).as_singular();
    hand.right_handedness = handedness.index([0, 0]).as_singular();
    let xyz = coords.index([0]).as_slice().chunks_exact(3);
    for (dst, src) in zip_eq(hand.landmarks.positions_mut(), xyz) {
        dst.copy_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use crate::image::Image;
    use crate::nn::tensor::Tensor;

    use super::*;

    #[test]
    fn decode_outputs() {
        let coords = (0..NUM_LANDMARKS * 3).map(|i| i as f32);
        let outputs: Outputs = [
            Tensor::from_iter(&[1, NUM_LANDMARKS * 3], coords.clone()),
            Tensor::from_iter(&[1, 1], [0.9]),
            Tensor::from_iter(&[1, 1], [0.2]),
            // World landmarks, unused.
            Tensor::from_iter(&[1, NUM_LANDMARKS * 3], coords),
        ]
        .into_iter()
        .collect();

        let mut hand = LandmarkResult::default();
        decode(&outputs, &mut hand);
        assert_eq!(hand.presence(), 0.9);
        assert_eq!(hand.confidence(), 0.9);
        assert_eq!(hand.handedness(), Handedness::Left);
        assert_eq!(hand.position(LandmarkIdx::Wrist), [0.0, 1.0, 2.0]);
        assert_eq!(hand.position(LandmarkIdx::PinkyTip), [60.0, 61.0, 62.0]);
    }

    #[test]
    fn skeleton_joins_every_landmark() {
        let mut seen = [false; NUM_LANDMARKS];
        for (a, b) in bones() {
            seen[a as usize] = true;
            seen[b as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(bones().count(), 21);
    }

    #[test]
    fn draw_marks_landmarks() {
        let mut positions = [[0.0; 3]; NUM_LANDMARKS];
        for (i, pos) in positions.iter_mut().enumerate() {
            *pos = [10.0 + i as f32 * 10.0, 20.0, 0.0];
        }
        let hand = LandmarkResult::from_positions(&positions, 1.0, Handedness::Right);
        let mut image = Image::new(240, 40);
        hand.draw(&mut image);
        // Markers are drawn over the bones.
        assert_eq!(image.get(10, 20), Color::RED);
        assert_eq!(image.get(200, 20), Color::RED);
        assert_eq!(image.get(15, 20), Color::GREEN);
        assert_eq!(image.get(5, 5), Color::NULL);
    }
}
