//! Face detection.

pub mod detection;
