//! Landmark estimation and region-of-interest tracking.
//!
//! A landmark network sees a crop of the frame. [`LandmarkTracker`] picks that crop: it starts
//! from a seed region (a hand region from palm detection, for example) and then follows the
//! bounding box of the previous frame's landmarks until the network's confidence drops.

use crate::image::{AsImageView, ImageView, Rect};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

/// Fixed number of `[x, y, z]` landmark positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    positions: Vec<[f32; 3]>,
}

impl Landmarks {
    /// `len` landmarks at the origin.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0; 3]; len],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position of landmark `index`. Panics if out of range.
    pub fn get(&self, index: usize) -> [f32; 3] {
        self.positions[index]
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [[f32; 3]] {
        &mut self.positions
    }

    pub fn map_positions(&mut self, mut f: impl FnMut([f32; 3]) -> [f32; 3]) {
        self.positions.iter_mut().for_each(|p| *p = f(*p));
    }

    /// Bounding box of the X/Y coordinates, `None` without landmarks.
    pub fn bounding_rect(&self) -> Option<Rect> {
        Rect::bounding(self.positions.iter().map(|&[x, y, _]| (x, y)))
    }
}

/// Decoded output of a landmark network.
pub trait Estimate: Default + Clone + Send + Sync + 'static {
    fn landmarks(&self) -> &Landmarks;

    fn landmarks_mut(&mut self) -> &mut Landmarks;

    /// How sure the network is that the object is still in view, `0.0..=1.0`.
    fn confidence(&self) -> f32;
}

/// A landmark network together with its output decoding.
pub trait Network: Clone + Send + Sync + 'static {
    type Output: Estimate;

    fn cnn(&self) -> &Cnn;

    /// Decodes `outputs` into `estimate`, in network input coordinates.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output);
}

/// Follows one object from frame to frame.
pub struct LandmarkTracker<N: Network> {
    network: N,
    estimate: N::Output,
    roi: Option<Rect>,
    loss_thresh: f32,
    t_infer: Timer,
}

impl<N: Network> LandmarkTracker<N> {
    /// Confidence below which the object counts as lost.
    pub const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    /// Margin added around the landmarks' bounding box on every side, relative to its size.
    pub const ROI_PADDING: f32 = 0.3;

    pub fn new(network: N) -> Self {
        Self {
            network,
            estimate: N::Output::default(),
            roi: None,
            loss_thresh: Self::DEFAULT_LOSS_THRESHOLD,
            t_infer: Timer::new("landmarks"),
        }
    }

    pub fn set_loss_threshold(&mut self, thresh: f32) {
        self.loss_thresh = thresh;
    }

    /// Region the next [`LandmarkTracker::track`] call will look at. `None` once tracking is lost.
    pub fn roi(&self) -> Option<Rect> {
        self.roi
    }

    /// Seeds or re-seeds tracking. `roi` is used without padding.
    pub fn set_roi(&mut self, roi: Rect) {
        self.roi = Some(roi);
    }

    pub fn timer(&self) -> &Timer {
        &self.t_infer
    }

    /// Estimates landmarks inside the current region of `image`.
    ///
    /// Returns `None` without a region, or when the confidence falls below the loss threshold
    /// (which also clears the region). Otherwise the region moves to the padded bounding box of the
    /// new landmarks, which are returned in `image` coordinates.
    pub fn track<V: AsImageView>(
        &mut self,
        image: &V,
    ) -> anyhow::Result<Option<&N::Output>> {
        let Some(roi) = self.roi else {
            return Ok(None);
        };
        let image = image.as_view();
        let crop = image.view(roi);
        self.estimate_on(&crop)?;

        let confidence = self.estimate.confidence();
        if confidence < self.loss_thresh {
            log::trace!("landmark confidence {confidence} below {}", self.loss_thresh);
            self.roi = None;
            return Ok(None);
        }

        let (dx, dy) = (roi.x().round(), roi.y().round());
        let landmarks = self.estimate.landmarks_mut();
        landmarks.map_positions(|[x, y, z]| [x + dx, y + dy, z]);
        self.roi = landmarks
            .bounding_rect()
            .map(|rect| rect.grow_rel(Self::ROI_PADDING));

        Ok(self.roi.map(|_| &self.estimate))
    }

    /// Runs the network on `crop`, leaving landmarks in `crop` coordinates.
    fn estimate_on(&mut self, crop: &ImageView<'_>) -> anyhow::Result<()> {
        let (outputs, letterbox) = self
            .t_infer
            .time(|| self.network.cnn().infer_letterboxed(crop))?;
        self.network.extract(&outputs, &mut self.estimate);
        self.estimate.landmarks_mut().map_positions(|[x, y, z]| {
            let (x, y) = letterbox.point(x, y);
            [x, y, letterbox.length(z)]
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_rect() {
        let mut lms = Landmarks::new(3);
        lms.positions_mut()
            .copy_from_slice(&[[1.0, 1.0, 0.0], [3.0, 2.0, 5.0], [2.0, 5.0, 0.0]]);
        assert_eq!(
            lms.bounding_rect(),
            Some(Rect::from_corners(1.0, 1.0, 3.0, 5.0))
        );
        assert_eq!(Landmarks::new(0).bounding_rect(), None);
    }

    #[test]
    fn map_positions() {
        let mut lms = Landmarks::new(2);
        lms.positions_mut()[1] = [1.0, 2.0, 3.0];
        lms.map_positions(|[x, y, z]| [x * 2.0, y + 1.0, z]);
        assert_eq!(lms.get(0), [0.0, 1.0, 0.0]);
        assert_eq!(lms.get(1), [2.0, 3.0, 3.0]);
        assert_eq!(lms.len(), 2);
    }
}
