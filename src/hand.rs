//! Detection and landmark estimation of human hands.
//!
//! Hands are located with the palm detector in [`detection`], and then tracked with the landmark
//! network in [`landmark`]. [`tracking::HandTracker`] ties both together.

pub mod detection;
pub mod landmark;
pub mod tracking;
