//! Webcam hand gesture and face detection.
//!
//! Every camera frame runs through a face detector and a hand tracker. Each tracked hand's 21
//! landmarks are reduced to a [`gesture::FingerState`] (which of the five fingers are extended),
//! and that state is looked up in a [`gesture::GestureTable`] to obtain a label for display.
//!
//! # Coordinates
//!
//! Unless otherwise noted, 2D coordinates are image pixels: X points to the right, Y points
//! *down*. Neural network outputs use the coordinate system of the network's input image.
//!
//! # Environment Variables
//!
//! * `HANDSIGN_CONFIG`: path to the TOML configuration file. If unset, `handsign.toml` in the
//!   working directory is used when it exists, and built-in defaults otherwise.
//! * `HANDSIGN_JPEG_BACKEND`: JPEG decoder to use for webcam frames. Allowed values are
//!   `zune-jpeg` (the default) and `jpeg-decoder`.
//! * `HANDSIGN_WEBCAM_NAME`: forces the device to use for [`Webcam`]s opened without an explicit
//!   device name.
//!
//! [`Webcam`]: video::webcam::Webcam

use log::LevelFilter;

pub mod app;
pub mod config;
pub mod detection;
pub mod face;
pub mod gesture;
pub mod gui;
pub mod hand;
pub mod image;
pub mod landmark;
pub mod nn;
pub mod termination;
pub mod timer;
pub mod video;

#[doc(hidden)]
pub fn init_logger(binary: &'static str) {
    let mut builder = env_logger::Builder::new();
    for module in [binary, env!("CARGO_CRATE_NAME")] {
        builder.filter_module(module, LevelFilter::Debug);
    }
    // wgpu is chatty at info level.
    builder.filter_module("wgpu", LevelFilter::Warn);
    if builder.parse_default_env().try_init().is_err() {
        log::debug!("a logger was already installed");
    }
}

/// Sends log output to stderr.
///
/// The invoking crate and `handsign` log at debug level and `wgpu` at warn level unless `RUST_LOG`
/// says otherwise. Does nothing if a logger is already installed.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
