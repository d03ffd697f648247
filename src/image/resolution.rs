use std::fmt;

/// Size of an image or camera frame, in pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of pixels, used to rank camera formats by size.
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `width / height`, or `None` if either dimension is zero.
    ///
    /// Networks are fed views of exactly this aspect, so a degenerate input size is an error for
    /// every caller.
    pub fn aspect(&self) -> Option<f32> {
        (self.width != 0 && self.height != 0).then(|| self.width as f32 / self.height as f32)
    }

    /// Returns whether an image of this resolution covers `other` in both dimensions.
    pub fn covers(&self, other: Resolution) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolution({self})")
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn aspect() {
        assert_relative_eq!(Resolution::new(1280, 720).aspect().unwrap(), 16.0 / 9.0);
        assert_eq!(Resolution::new(192, 192).aspect(), Some(1.0));
        assert_eq!(Resolution::new(0, 480).aspect(), None);
    }

    #[test]
    fn covers() {
        let hd = Resolution::new(1280, 720);
        assert!(hd.covers(Resolution::new(640, 480)));
        assert!(hd.covers(hd));
        assert!(!hd.covers(Resolution::new(1920, 480)));
        assert_eq!(hd.pixel_count(), 921_600);
        assert_eq!(hd.to_string(), "1280x720");
    }
}
