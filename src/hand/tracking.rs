//! Multi-hand tracking.
//!
//! Palm detection is slow and only runs while a hand slot is free. Once a palm is found, its hand
//! region seeds a [`LandmarkTracker`] that follows the hand on its own until the presence score
//! drops.

use crate::detection::Detector;
use crate::image::{AsImageView, ImageView, Rect};
use crate::landmark::LandmarkTracker;
use crate::timer::Timer;

use super::detection::{hand_region, PalmDetectionNetwork};
use super::landmark::{LandmarkNetwork, LandmarkResult};

/// Identifies a hand for as long as it stays tracked. Never reused by the same [`HandTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandId(u64);

impl HandId {
    #[cfg(test)]
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

struct Slot {
    id: HandId,
    tracker: LandmarkTracker<LandmarkNetwork>,
    hand: LandmarkResult,
}

impl Slot {
    /// Follows the hand into `image`. `false` means it was lost.
    fn advance(&mut self, image: &ImageView<'_>) -> anyhow::Result<bool> {
        let Some(hand) = self.tracker.track(image)? else {
            return Ok(false);
        };
        self.hand.clone_from(hand);
        Ok(true)
    }
}

pub struct HandTracker {
    detector: Detector,
    landmark_network: LandmarkNetwork,
    slots: Vec<Slot>,
    next_id: u64,
    max_hands: usize,
    presence_thresh: f32,
}

impl HandTracker {
    /// Hand regions overlapping a tracked hand at least this much are not tracked twice.
    pub const IOU_THRESH: f32 = 0.3;

    pub const DEFAULT_MAX_HANDS: usize = 2;

    pub fn new(palm_network: PalmDetectionNetwork, landmark_network: LandmarkNetwork) -> Self {
        Self {
            detector: Detector::new(palm_network),
            landmark_network,
            slots: Vec::new(),
            next_id: 0,
            max_hands: Self::DEFAULT_MAX_HANDS,
            presence_thresh: LandmarkTracker::<LandmarkNetwork>::DEFAULT_LOSS_THRESHOLD,
        }
    }

    pub fn set_max_hands(&mut self, max_hands: usize) {
        self.max_hands = max_hands;
    }

    /// Minimum palm confidence for a new hand.
    pub fn set_detection_threshold(&mut self, thresh: f32) {
        self.detector.set_threshold(thresh);
    }

    /// Minimum presence score for a hand to stay tracked.
    pub fn set_tracking_threshold(&mut self, thresh: f32) {
        self.presence_thresh = thresh;
    }

    /// Hands found by the last [`HandTracker::track`] call, oldest first.
    pub fn hands(&self) -> impl Iterator<Item = (HandId, &LandmarkResult)> + '_ {
        self.slots.iter().map(|slot| (slot.id, &slot.hand))
    }

    /// Processes the next frame. All frames must have the same size.
    pub fn track<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<()> {
        let image = image.as_view();

        let mut kept = Vec::with_capacity(self.slots.len());
        for mut slot in self.slots.drain(..) {
            if slot.advance(&image)? {
                kept.push(slot);
            } else {
                log::debug!("lost {:?}", slot.id);
            }
        }
        self.slots = kept;

        if self.slots.len() < self.max_hands {
            self.admit_new_hands(&image)?;
        }
        Ok(())
    }

    fn admit_new_hands(&mut self, image: &ImageView<'_>) -> anyhow::Result<()> {
        let regions: Vec<Rect> = self.detector.detect(image)?.iter().map(hand_region).collect();

        for region in regions {
            if self.slots.len() >= self.max_hands {
                break;
            }
            let tracked = self.slots.iter().filter_map(|slot| slot.tracker.roi());
            if overlaps_any(tracked, region, Self::IOU_THRESH) {
                continue;
            }

            let mut tracker = LandmarkTracker::new(self.landmark_network.clone());
            tracker.set_loss_threshold(self.presence_thresh);
            tracker.set_roi(region);
            let mut slot = Slot {
                id: HandId(self.next_id),
                tracker,
                hand: LandmarkResult::default(),
            };
            if slot.advance(image)? {
                log::debug!("new {:?} in {:?}", slot.id, region);
                self.next_id += 1;
                self.slots.push(slot);
            }
        }
        Ok(())
    }

    /// Palm detection timers followed by each tracked hand's landmark timer.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.detector
            .timers()
            .chain(self.slots.iter().map(|slot| slot.tracker.timer()))
    }
}

fn overlaps_any(rois: impl IntoIterator<Item = Rect>, region: Rect, iou_thresh: f32) -> bool {
    rois.into_iter().any(|roi| roi.iou(&region) >= iou_thresh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_check() {
        let roi = Rect::from_center(10.0, 10.0, 10.0, 10.0);
        assert!(overlaps_any([roi], roi.move_by(1.0, 0.0), 0.3));
        assert!(!overlaps_any([roi], roi.move_by(8.0, 0.0), 0.3));
        assert!(!overlaps_any(std::iter::empty(), roi, 0.3));
    }
}
