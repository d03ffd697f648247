//! The gesture recognition application.
//!
//! [`App`] owns the detectors, the gesture table and the display settings. [`App::run`] drives the
//! capture loop, [`App::process`] handles a single frame and can be used without a camera.

use crate::{
    config::Config,
    detection::{Detection, Detector},
    face::detection::{FaceDetectionNetwork, FaceRange},
    gesture::{FingerState, GestureTable},
    gui::{self, Key},
    hand::{
        detection::PalmDetectionNetwork,
        landmark::{Handedness, LandmarkIdx, LandmarkNetwork},
        tracking::{HandId, HandTracker},
    },
    image::{draw, Color, Image, Rect},
    landmark::Landmarks,
    timer::{FpsCounter, Timer},
    video::webcam::Webcam,
};

/// Color of face boxes and their captions.
const FACE_COLOR: Color = Color::MAGENTA;
/// Color of the finger-state vector.
const FINGER_STATE_COLOR: Color = Color::YELLOW;
/// Color of the gesture label, drawn on a black box.
const LABEL_COLOR: Color = Color::GREEN;

/// Vertical distance between the wrist and the finger-state vector.
const FINGER_STATE_OFFSET: f32 = 30.0;
/// Vertical distance between the wrist and the bottom of the label box.
const LABEL_OFFSET: f32 = 10.0;
const LABEL_PADDING: f32 = 5.0;

/// Results for one processed frame.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub faces: Vec<Detection>,
    pub hands: Vec<HandReport>,
}

/// A tracked hand and its classified gesture.
#[derive(Debug, Clone)]
pub struct HandReport {
    pub id: HandId,
    pub handedness: Handedness,
    /// Landmark positions in image coordinates.
    pub landmarks: Landmarks,
    pub finger_state: FingerState,
    pub gesture: String,
}

pub struct App {
    config: Config,
    gestures: GestureTable,
    face_detector: Option<Detector>,
    hand_tracker: HandTracker,
    t_frame: Timer,
}

impl App {
    /// Loads the networks named in `config` and builds the gesture table.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let gestures = config.gesture_table()?;
        log::debug!("gesture table has {} entries", gestures.len());

        let face_detector = if config.face.enabled {
            let (path, range) = if config.face.full_range {
                (&config.models.face_detection_full_range, FaceRange::Full)
            } else {
                (&config.models.face_detection_short_range, FaceRange::Short)
            };
            let mut detector = Detector::new(FaceDetectionNetwork::load(path, range)?);
            detector.set_threshold(config.face.min_detection_confidence);
            Some(detector)
        } else {
            None
        };

        let palm_path = if config.hands.full_range_palm_detection {
            &config.models.palm_detection_full
        } else {
            &config.models.palm_detection
        };
        let mut hand_tracker = HandTracker::new(
            PalmDetectionNetwork::load(palm_path)?,
            LandmarkNetwork::load(&config.models.hand_landmark)?,
        );
        hand_tracker.set_max_hands(config.hands.max_num_hands);
        hand_tracker.set_detection_threshold(config.hands.min_detection_confidence);
        hand_tracker.set_tracking_threshold(config.hands.min_tracking_confidence);

        Ok(Self {
            config,
            gestures,
            face_detector,
            hand_tracker,
            t_frame: Timer::new("frame"),
        })
    }

    pub fn gestures(&self) -> &GestureTable {
        &self.gestures
    }

    /// Detects faces and hands in `image`, classifies each hand's gesture and draws the results
    /// onto `image`.
    pub fn process(&mut self, image: &mut Image) -> anyhow::Result<FrameReport> {
        let _guard = self.t_frame.start();
        let mut report = FrameReport::default();

        if let Some(detector) = &mut self.face_detector {
            report.faces = detector.detect(&*image)?.iter().cloned().collect();
        }

        self.hand_tracker.track(&*image)?;
        for (id, hand) in self.hand_tracker.hands() {
            let finger_state = hand.finger_state();
            let gesture = self.gestures.classify(&finger_state).to_string();
            log::trace!("{id:?}: {finger_state} -> {gesture}");

            report.hands.push(HandReport {
                id,
                handedness: hand.handedness(),
                landmarks: hand.landmarks().clone(),
                finger_state,
                gesture,
            });
            hand.draw(image);
        }

        for face in &report.faces {
            draw_face(image, face.bounding_rect());
        }
        for hand in &report.hands {
            draw_hand_annotations(image, hand, self.config.display.show_finger_state);
        }

        Ok(report)
    }

    /// Returns the profiling timers of all processing stages.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.face_detector
            .iter()
            .flat_map(|d| d.timers())
            .chain(self.hand_tracker.timers())
            .chain([&self.t_frame])
    }

    /// Runs the capture loop until the quit key is pressed or the window is closed.
    ///
    /// Fails if the camera cannot be opened. A failure to read a frame ends the loop, but is not
    /// an error.
    pub fn run(mut self) -> anyhow::Result<()> {
        let mut webcam = match Webcam::open(self.config.camera.webcam_options()) {
            Ok(webcam) => webcam,
            Err(e) => {
                log::error!("failed to open webcam: {e:#}");
                return Err(e);
            }
        };
        log::info!(
            "running, press '{}' in the window to quit",
            self.config.display.quit_key
        );

        let mut fps = FpsCounter::new("handsign");
        loop {
            let mut image = match webcam.read() {
                Ok(image) => image,
                Err(e) => {
                    log::error!("failed to read frame from webcam: {e:#}");
                    break;
                }
            };
            if self.config.camera.mirror {
                image.flip_horizontal_in_place();
            }

            self.process(&mut image)?;
            gui::show_image(&self.config.display.window_title, &image)?;

            if self.quit_requested() {
                log::info!("exiting");
                break;
            }

            fps.tick_with(webcam.timers().chain(self.timers()));
        }

        Ok(())
    }

    fn quit_requested(&self) -> bool {
        std::iter::from_fn(gui::poll_key).any(|key| match key {
            Key::Char(c) => c == self.config.display.quit_key,
            Key::WindowClosed => true,
        })
    }
}

/// Outlines a face and captions it "Face" above the top left corner.
pub fn draw_face(image: &mut Image, rect: Rect) {
    draw::rect(image, rect).color(FACE_COLOR).stroke_width(2);
    draw::text(image, rect.x(), rect.y() - 5.0, "Face")
        .align_bottom()
        .align_left()
        .color(FACE_COLOR);
}

/// Writes the gesture label on a black box above the wrist and, if `show_finger_state` is set,
/// the finger-state vector below it.
pub fn draw_hand_annotations(image: &mut Image, hand: &HandReport, show_finger_state: bool) {
    let [x, y, _] = hand.landmarks.get(LandmarkIdx::Wrist as usize);

    if show_finger_state {
        let state = hand.finger_state.to_string();
        draw::text(image, x, y + FINGER_STATE_OFFSET, &state)
            .align_top()
            .align_left()
            .color(FINGER_STATE_COLOR);
    }

    let (text_w, text_h) = draw::text_size(&hand.gesture);
    let box_h = text_h as f32 + 2.0 * LABEL_PADDING;
    let label_box = Rect::from_top_left(
        x - LABEL_PADDING,
        y - LABEL_OFFSET - box_h,
        text_w as f32 + 2.0 * LABEL_PADDING,
        box_h,
    );
    draw::filled_rect(image, label_box);
    draw::text(image, x, label_box.y() + LABEL_PADDING, &hand.gesture)
        .align_top()
        .align_left()
        .color(LABEL_COLOR);
}
