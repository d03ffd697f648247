//! Object detection shared by the face and palm detectors.
//!
//! A [`Network`] decodes raw outputs into [`Detection`]s in network input coordinates.
//! [`Detector`] letterboxes the frame, runs the network, merges overlapping detections and maps
//! the survivors back onto the frame.

pub mod nms;
pub mod ssd;

use crate::image::{AsImageView, Rect};
use crate::nn::{Cnn, Letterbox, Outputs};
use crate::timer::Timer;

use self::nms::NonMaxSuppression;

/// A detection network together with its output decoding.
pub trait Network: Send + Sync + 'static {
    fn cnn(&self) -> &Cnn;

    /// Appends every detection with a confidence of at least `thresh` to `out`.
    fn extract(&self, outputs: &Outputs, thresh: f32, out: &mut Vec<Detection>);
}

pub struct Detector {
    network: Box<dyn Network>,
    detections: Vec<Detection>,
    nms: NonMaxSuppression,
    thresh: f32,
    t_infer: Timer,
    t_nms: Timer,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            detections: Vec::new(),
            nms: NonMaxSuppression::default(),
            thresh: Self::DEFAULT_THRESHOLD,
            t_infer: Timer::new("infer"),
            t_nms: Timer::new("nms"),
        }
    }

    /// Minimum confidence of reported detections.
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    /// Detects objects in `image`, in `image` coordinates.
    pub fn detect<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&[Detection]> {
        self.detections.clear();
        let cnn = self.network.cnn();
        let (outputs, letterbox) = self
            .t_infer
            .time(|| cnn.infer_letterboxed(&image.as_view()))?;
        log::trace!("detector outputs: {outputs:?}");

        self.network
            .extract(&outputs, self.thresh, &mut self.detections);
        self.t_nms.time(|| self.nms.process(&mut self.detections));

        for det in &mut self.detections {
            det.unletterbox(&letterbox);
        }
        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_nms].into_iter()
    }
}

/// A detected object: a box, a confidence, a rotation and detector-specific keypoints.
///
/// The confidence is in `0.0..=1.0` and weighs the detection when overlapping ones are averaged.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Clockwise rotation in radians. Zero unless the detector sets it.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    /// Keypoints in the order the detector defines.
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    fn unletterbox(&mut self, letterbox: &Letterbox) {
        self.rect = letterbox.rect(self.rect);
        for kp in &mut self.keypoints {
            (kp.x, kp.y) = letterbox.point(kp.x, kp.y);
        }
    }
}

/// A point of interest of a [`Detection`], such as an eye or a knuckle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}
