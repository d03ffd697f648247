//! Process exit codes for values returned by the application thread.

use std::{fmt::Debug, process};

/// A [`process::Termination`] value that can be checked before the process exits.
///
/// [`gui::run`](crate::gui::run) ends the process itself, so it cannot hand the result back to
/// `main`.
pub trait Termination: process::Termination {
    fn succeeded(&self) -> bool;

    fn exit_code(&self) -> i32 {
        i32::from(!self.succeeded())
    }
}

impl Termination for () {
    fn succeeded(&self) -> bool {
        true
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn succeeded(&self) -> bool {
        self.as_ref().map_or(false, T::succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(().exit_code(), 0);
        assert_eq!(Ok::<(), &str>(()).exit_code(), 0);
        assert_eq!(Err::<(), &str>("camera missing").exit_code(), 1);
    }
}
