//! Gesture recognition from hand landmarks.
//!
//! A hand's 21 landmarks are reduced to a [`FingerState`], which records for each of the five
//! fingers whether it is extended. The [`GestureTable`] maps finger states to display labels by
//! exact lookup.
//!
//! The rules only compare coordinates of the same landmark set, so they work in any coordinate
//! system in which a smaller Y coordinate means "higher up" in the image: normalized `[0, 1]`
//! network coordinates and image pixels both qualify.

use std::{collections::HashMap, fmt};

use itertools::Itertools;

use crate::hand::landmark::{Handedness, LandmarkIdx};

/// Label returned by [`GestureTable::classify`] when no entry matches, unless overridden.
pub const UNKNOWN_GESTURE: &str = "Unknown Gesture";

/// The five fingers of a hand, in [`FingerState`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Returns the landmark at the tip of this finger.
    pub fn tip(self) -> LandmarkIdx {
        match self {
            Finger::Thumb => LandmarkIdx::ThumbTip,
            Finger::Index => LandmarkIdx::IndexFingerTip,
            Finger::Middle => LandmarkIdx::MiddleFingerTip,
            Finger::Ring => LandmarkIdx::RingFingerTip,
            Finger::Pinky => LandmarkIdx::PinkyTip,
        }
    }

    /// Returns the joint the tip is compared against.
    ///
    /// For the thumb, this is the IP joint right below the tip. For all other fingers, it is the
    /// PIP joint, two landmarks below the tip.
    pub fn reference_joint(self) -> LandmarkIdx {
        match self {
            Finger::Thumb => LandmarkIdx::ThumbIp,
            Finger::Index => LandmarkIdx::IndexFingerPip,
            Finger::Middle => LandmarkIdx::MiddleFingerPip,
            Finger::Ring => LandmarkIdx::RingFingerPip,
            Finger::Pinky => LandmarkIdx::PinkyPip,
        }
    }
}

/// Which of the five fingers of a hand are extended ("open").
///
/// Displays as `[1, 0, 1, 1, 0]`, in thumb, index, middle, ring, pinky order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FingerState([bool; 5]);

impl FingerState {
    /// Creates a finger state from flags in thumb, index, middle, ring, pinky order.
    pub const fn new(fingers: [bool; 5]) -> Self {
        Self(fingers)
    }

    /// Computes the finger state of a hand from its landmark positions.
    ///
    /// - The thumb is open when its tip lies further outward along X than its IP joint. For a
    ///   [`Handedness::Right`] hand that is a smaller X coordinate, for a [`Handedness::Left`] hand
    ///   a larger one.
    /// - Every other finger is open when its tip lies above its PIP joint (smaller Y).
    ///
    /// Z coordinates are ignored. Equal coordinates count as closed.
    ///
    /// # Panics
    ///
    /// Panics if `landmarks` has fewer than 21 entries.
    pub fn from_landmarks(landmarks: &[[f32; 3]], handedness: Handedness) -> Self {
        let pos = |idx: LandmarkIdx| landmarks[idx as usize];

        let mut fingers = [false; 5];
        for (open, finger) in fingers.iter_mut().zip(Finger::ALL) {
            let tip = pos(finger.tip());
            let joint = pos(finger.reference_joint());
            *open = match (finger, handedness) {
                (Finger::Thumb, Handedness::Right) => tip[0] < joint[0],
                (Finger::Thumb, Handedness::Left) => tip[0] > joint[0],
                _ => tip[1] < joint[1],
            };
        }

        Self(fingers)
    }

    /// Returns whether `finger` is extended.
    #[inline]
    pub fn is_open(&self, finger: Finger) -> bool {
        self.0[finger as usize]
    }

    /// Returns the number of extended fingers.
    pub fn open_count(&self) -> usize {
        self.0.iter().filter(|open| **open).count()
    }

    #[inline]
    pub fn as_array(&self) -> [bool; 5] {
        self.0
    }
}

impl From<[bool; 5]> for FingerState {
    fn from(fingers: [bool; 5]) -> Self {
        Self(fingers)
    }
}

impl fmt::Display for FingerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.iter().map(|open| if *open { "1" } else { "0" });
        write!(f, "[{}]", digits.format(", "))
    }
}

/// Immutable mapping from [`FingerState`]s to gesture labels.
///
/// Lookups are exact: there is no partial matching, scoring or smoothing across frames.
#[derive(Debug, Clone)]
pub struct GestureTable {
    labels: HashMap<FingerState, String>,
    unknown: String,
}

impl GestureTable {
    /// Builds a table from an ordered list of entries.
    ///
    /// When a finger state occurs more than once, the entry listed last wins. Each overwritten
    /// entry is logged as a warning.
    pub fn from_entries<I, L>(entries: I, unknown: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (FingerState, L)>,
        L: Into<String>,
    {
        let mut labels = HashMap::new();
        for (state, label) in entries {
            let label: String = label.into();
            if let Some(previous) = labels.get(&state) {
                log::warn!("gesture table: {state} was '{previous}', keeping '{label}'");
            }
            labels.insert(state, label);
        }

        Self {
            labels,
            unknown: unknown.into(),
        }
    }

    /// Returns the label for `state`, or the unknown label if no entry matches.
    pub fn classify(&self, state: &FingerState) -> &str {
        self.labels
            .get(state)
            .map_or(self.unknown.as_str(), String::as_str)
    }

    /// Replaces the label returned for finger states that have no entry.
    pub fn with_unknown_label(self, unknown: impl Into<String>) -> Self {
        Self {
            unknown: unknown.into(),
            ..self
        }
    }

    /// Returns the label for finger states that have no entry.
    pub fn unknown_label(&self) -> &str {
        &self.unknown
    }

    /// Returns the number of distinct finger states with a label.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// The built-in gestures.
impl Default for GestureTable {
    fn default() -> Self {
        Self::from_entries(DEFAULT_GESTURES.iter().copied(), UNKNOWN_GESTURE)
    }
}

const DEFAULT_GESTURES: &[(FingerState, &str)] = {
    const fn fs(t: u8, i: u8, m: u8, r: u8, p: u8) -> FingerState {
        FingerState([t != 0, i != 0, m != 0, r != 0, p != 0])
    }

    &[
        (fs(1, 1, 1, 1, 1), "Open Hand"),
        (fs(1, 0, 0, 0, 0), "Thumbs Up"),
        (fs(0, 1, 0, 0, 0), "Hello"),
        (fs(0, 1, 1, 0, 0), "My Name Is"),
        (fs(0, 1, 1, 1, 0), "Three"),
        (fs(0, 1, 1, 1, 1), "Four"),
        (fs(0, 1, 0, 0, 1), "Rock n Roll"),
        (fs(1, 1, 0, 0, 1), "I Love You"),
        (fs(0, 0, 1, 0, 0), "Middle Finger"),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    /// An upright hand with all fingers curled: every tip sits below its reference joint, and the
    /// thumb tip sits exactly above its IP joint.
    fn fist() -> [[f32; 3]; 21] {
        let mut lm = [[0.5, 0.5, 0.0]; 21];
        for finger in Finger::ALL {
            lm[finger.reference_joint() as usize] = [0.5, 0.5, 0.0];
            lm[finger.tip() as usize] = [0.5, 0.6, 0.0];
        }
        lm
    }

    fn extend(lm: &mut [[f32; 3]; 21], finger: Finger) {
        let joint = lm[finger.reference_joint() as usize];
        lm[finger.tip() as usize] = match finger {
            // Outward for a right hand.
            Finger::Thumb => [joint[0] - 0.1, joint[1], 0.0],
            _ => [joint[0], joint[1] - 0.1, 0.0],
        };
    }

    #[test]
    fn all_tips_above_pip_are_open() {
        let mut lm = fist();
        for finger in [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky] {
            extend(&mut lm, finger);
        }

        for handedness in [Handedness::Left, Handedness::Right] {
            let state = FingerState::from_landmarks(&lm, handedness);
            assert!(state.is_open(Finger::Index));
            assert!(state.is_open(Finger::Middle));
            assert!(state.is_open(Finger::Ring));
            assert!(state.is_open(Finger::Pinky));
        }
    }

    #[test]
    fn tips_below_pip_are_closed() {
        let state = FingerState::from_landmarks(&fist(), Handedness::Right);
        assert_eq!(state, FingerState::new([false; 5]));
    }

    #[test]
    fn handedness_flips_thumb() {
        let mut lm = fist();
        extend(&mut lm, Finger::Thumb);

        let right = FingerState::from_landmarks(&lm, Handedness::Right);
        let left = FingerState::from_landmarks(&lm, Handedness::Left);
        assert!(right.is_open(Finger::Thumb));
        assert!(!left.is_open(Finger::Thumb));

        // Only the thumb depends on handedness.
        assert_eq!(right.as_array()[1..], left.as_array()[1..]);
    }

    #[test]
    fn uses_pip_not_dip() {
        let mut lm = fist();
        // Tip above the DIP joint, but still below the PIP joint.
        lm[LandmarkIdx::IndexFingerDip as usize] = [0.5, 0.7, 0.0];
        lm[LandmarkIdx::IndexFingerTip as usize] = [0.5, 0.6, 0.0];
        let state = FingerState::from_landmarks(&lm, Handedness::Right);
        assert!(!state.is_open(Finger::Index));
    }

    #[test]
    #[should_panic]
    fn short_landmark_slice_panics() {
        FingerState::from_landmarks(&[[0.0; 3]; 20], Handedness::Right);
    }

    #[test]
    fn display() {
        let state = FingerState::new([true, false, true, true, false]);
        assert_eq!(state.to_string(), "[1, 0, 1, 1, 0]");
        assert_eq!(state.open_count(), 3);
    }

    #[test]
    fn lookup_hit_and_miss() {
        let table = GestureTable::default();
        assert_eq!(table.classify(&FingerState::new([true; 5])), "Open Hand");
        assert_eq!(
            table.classify(&FingerState::new([false, false, true, false, false])),
            "Middle Finger"
        );
        assert_eq!(table.classify(&FingerState::new([false; 5])), UNKNOWN_GESTURE);
        assert_eq!(
            table.classify(&FingerState::new([true, true, false, false, false])),
            UNKNOWN_GESTURE
        );
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let key = FingerState::new([false, true, true, false, false]);
        let table = GestureTable::from_entries([(key, "Victory"), (key, "Peace")], "?");
        assert_eq!(table.len(), 1);
        assert_eq!(table.classify(&key), "Peace");
        assert_eq!(table.classify(&FingerState::new([true; 5])), "?");
        assert_eq!(table.unknown_label(), "?");
    }

    #[test]
    fn default_table_has_no_duplicates() {
        assert_eq!(GestureTable::default().len(), DEFAULT_GESTURES.len());
    }

    #[test]
    fn default_table_keys() {
        let keys = DEFAULT_GESTURES
            .iter()
            .map(|(state, _)| state.to_string())
            .sorted()
            .collect_vec();
        assert_eq!(
            keys,
            [
                "[0, 0, 1, 0, 0]",
                "[0, 1, 0, 0, 0]",
                "[0, 1, 0, 0, 1]",
                "[0, 1, 1, 0, 0]",
                "[0, 1, 1, 1, 0]",
                "[0, 1, 1, 1, 1]",
                "[1, 0, 0, 0, 0]",
                "[1, 1, 0, 0, 1]",
                "[1, 1, 1, 1, 1]",
            ]
        );
    }
}
