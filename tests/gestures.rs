use handsign::{
    config::Config,
    gesture::{Finger, FingerState, GestureTable, UNKNOWN_GESTURE},
    hand::landmark::{Handedness, LandmarkIdx, LandmarkResult, NUM_LANDMARKS},
    image::{Color, Image},
};

/// An upright right hand (palm facing the camera) in pixel coordinates, with the given fingers
/// extended.
fn synthetic_hand(open: [bool; 5]) -> [[f32; 3]; NUM_LANDMARKS] {
    let mut lm = [[0.0; 3]; NUM_LANDMARKS];
    lm[LandmarkIdx::Wrist as usize] = [100.0, 200.0, 0.0];

    // Thumb points left when extended, and curls right across the palm otherwise.
    let thumb_tip_x = if open[0] { 50.0 } else { 90.0 };
    lm[LandmarkIdx::ThumbCmc as usize] = [85.0, 185.0, 0.0];
    lm[LandmarkIdx::ThumbMcp as usize] = [75.0, 170.0, 0.0];
    lm[LandmarkIdx::ThumbIp as usize] = [65.0, 160.0, 0.0];
    lm[LandmarkIdx::ThumbTip as usize] = [thumb_tip_x, 150.0, 0.0];

    for (finger, x) in [
        (Finger::Index, 80.0),
        (Finger::Middle, 100.0),
        (Finger::Ring, 120.0),
        (Finger::Pinky, 140.0),
    ] {
        let tip = finger.tip() as usize;
        let pip = finger.reference_joint() as usize;
        let mcp = pip - 1;
        let dip = pip + 1;
        lm[mcp] = [x, 140.0, 0.0];
        lm[pip] = [x, 110.0, 0.0];
        if open[finger as usize] {
            lm[dip] = [x, 90.0, 0.0];
            lm[tip] = [x, 70.0, 0.0];
        } else {
            lm[dip] = [x, 125.0, 0.0];
            lm[tip] = [x, 135.0, 0.0];
        }
    }
    lm
}

#[test]
fn raised_fingers_are_open() {
    let open = [false, true, true, true, true];
    let state = FingerState::from_landmarks(&synthetic_hand(open), Handedness::Right);
    for finger in [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky] {
        assert!(state.is_open(finger), "{finger:?} should be open in {state}");
    }
    assert!(!state.is_open(Finger::Thumb));
    assert_eq!(state.to_string(), "[0, 1, 1, 1, 1]");
}

#[test]
fn handedness_flips_thumb() {
    for open in [[true; 5], [false; 5], [true, false, true, false, true]] {
        let lm = synthetic_hand(open);
        let right = FingerState::from_landmarks(&lm, Handedness::Right);
        let left = FingerState::from_landmarks(&lm, Handedness::Left);

        assert_ne!(right.is_open(Finger::Thumb), left.is_open(Finger::Thumb));
        assert_eq!(right.as_array()[1..], left.as_array()[1..]);
    }
}

#[test]
fn classify_landmark_results() {
    let table = GestureTable::default();
    let cases = [
        ([true; 5], "Open Hand"),
        ([false, true, true, false, false], "My Name Is"),
        ([true, true, false, false, true], "I Love You"),
        ([false, false, true, false, false], "Middle Finger"),
        ([false; 5], UNKNOWN_GESTURE),
    ];
    for (open, label) in cases {
        let result = LandmarkResult::from_positions(&synthetic_hand(open), 1.0, Handedness::Right);
        assert_eq!(result.finger_state(), FingerState::new(open));
        assert_eq!(table.classify(&result.finger_state()), label);
    }
}

#[test]
fn duplicate_keys_keep_last_label() {
    let peace = FingerState::new([false, true, true, false, false]);
    let table = GestureTable::from_entries(
        [(peace, "Peace"), (FingerState::new([false; 5]), "Fist"), (peace, "Victory")],
        UNKNOWN_GESTURE,
    );
    assert_eq!(table.len(), 2);
    assert_eq!(table.classify(&peace), "Victory");
    assert_eq!(table.classify(&FingerState::new([true; 5])), UNKNOWN_GESTURE);
}

#[test]
fn configured_table_classifies_hand() {
    let config = Config::parse(
        r#"
        [gestures]
        unknown = "nothing"

        [[gestures.entry]]
        fingers = [1, 1, 1, 1, 1]
        label = "Fist"

        [[gestures.entry]]
        fingers = [1, 1, 1, 1, 1]
        label = "Open Hand"
        "#,
    )
    .unwrap();
    let table = config.gesture_table().unwrap();

    let open = LandmarkResult::from_positions(&synthetic_hand([true; 5]), 1.0, Handedness::Right);
    assert_eq!(table.classify(&open.finger_state()), "Open Hand");

    let fist = LandmarkResult::from_positions(&synthetic_hand([false; 5]), 1.0, Handedness::Right);
    assert_eq!(table.classify(&fist.finger_state()), "nothing");
}

#[test]
fn draw_hand_skeleton() {
    let result = LandmarkResult::from_positions(&synthetic_hand([true; 5]), 1.0, Handedness::Right);
    let mut image = Image::new(200, 220);
    result.draw(&mut image);

    // Midpoint of the bone from the wrist to the pinky MCP.
    assert_eq!(image.get(120, 170), Color::GREEN);
    assert_eq!(image.get(5, 5), Color::NULL);
}
