//! Axis-aligned rectangles for image views, detections and hand regions.

use std::fmt;

/// Rectangle with `f32` coordinates, stored as its center point and size.
///
/// Width and height may be zero, but never negative.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    xc: f32,
    yc: f32,
    w: f32,
    h: f32,
}

impl Rect {
    #[inline]
    pub fn from_center(xc: f32, yc: f32, w: f32, h: f32) -> Self {
        Self { xc, yc, w, h }
    }

    #[inline]
    pub fn from_top_left(left: f32, top: f32, w: f32, h: f32) -> Self {
        Self::from_center(left + w / 2.0, top + h / 2.0, w, h)
    }

    /// Builds the rectangle between a top-left and a bottom-right corner.
    pub fn from_corners(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        assert!(
            left <= right && top <= bottom,
            "inverted corners ({left},{top}) and ({right},{bottom})"
        );
        Self::from_top_left(left, top, right - left, bottom - top)
    }

    /// Smallest rectangle containing every point, or `None` for an empty input.
    pub fn bounding<I: IntoIterator<Item = (f32, f32)>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let (x0, y0) = points.next()?;
        let [left, top, right, bottom] = points.fold([x0, y0, x0, y0], |[l, t, r, b], (x, y)| {
            [l.min(x), t.min(y), r.max(x), b.max(y)]
        });
        Some(Self::from_corners(left, top, right, bottom))
    }

    /// Multiplies both dimensions by `factor`, keeping the center in place.
    #[must_use]
    pub fn scale(&self, factor: f32) -> Self {
        Self::from_center(self.xc, self.yc, self.w * factor, self.h * factor)
    }

    /// Pads every side by `amount` times the rectangle's own width or height.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.scale(1.0 + 2.0 * amount)
    }

    /// Widens or heightens the rectangle around its center until `width / height == aspect`.
    ///
    /// Neither dimension ever shrinks.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: f32) -> Self {
        let wanted_w = self.h * aspect;
        if wanted_w >= self.w {
            Self { w: wanted_w, ..*self }
        } else {
            Self {
                h: self.w / aspect,
                ..*self
            }
        }
    }

    /// Left edge.
    #[inline]
    pub fn x(&self) -> f32 {
        self.xc - self.w / 2.0
    }

    /// Top edge.
    #[inline]
    pub fn y(&self) -> f32 {
        self.yc - self.h / 2.0
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.xc, self.yc)
    }

    #[must_use]
    pub fn move_by(&self, dx: f32, dy: f32) -> Self {
        Self::from_center(self.xc + dx, self.yc + dy, self.w, self.h)
    }

    fn right(&self) -> f32 {
        self.x() + self.w
    }

    fn bottom(&self) -> f32 {
        self.y() + self.h
    }

    /// The overlapping region of both rectangles, if they touch at all.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x().max(other.x());
        let top = self.y().max(other.y());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (left <= right && top <= bottom).then(|| Self::from_corners(left, top, right, bottom))
    }

    /// Intersection over union. Zero when the union has no area.
    pub fn iou(&self, other: &Self) -> f32 {
        let shared = self.intersection(other).map_or(0.0, |r| r.w * r.h);
        let union = self.w * self.h + other.w * other.h - shared;
        if union > 0.0 {
            shared / union
        } else {
            0.0
        }
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect {{ center: ({}, {}), size: {}x{} }}",
            self.xc, self.yc, self.w, self.h
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn intersection() {
        let outer = Rect::from_corners(0.0, 0.0, 10.0, 10.0);
        let inner = Rect::from_corners(5.0, 5.0, 6.0, 6.0);
        assert_eq!(outer.intersection(&inner), Some(inner));
        assert_eq!(inner.intersection(&outer), Some(inner));

        let apart = Rect::from_corners(7.0, 0.0, 10.0, 10.0);
        assert_eq!(inner.intersection(&apart), None);
    }

    #[test]
    fn iou() {
        let small = Rect::from_center(9.0, 9.0, 1.0, 1.0);
        let large = small.scale(2.0);
        assert_eq!(small.iou(&large), 0.25);
        assert_eq!(large.iou(&small), 0.25);

        let a = Rect::from_center(1.0, 0.0, 1.0, 1.0);
        assert_relative_eq!(a.iou(&a.move_by(0.5, 0.0)), 0.5 / 1.5);

        let point = Rect::from_center(0.0, 0.0, 0.0, 0.0);
        assert_eq!(point.iou(&point), 0.0);
    }

    #[test]
    fn bounding() {
        assert_eq!(
            Rect::bounding([(0.0, 0.0), (1.0, 1.0), (-1.0, -1.0)]),
            Some(Rect::from_corners(-1.0, -1.0, 1.0, 1.0)),
        );
        assert_eq!(
            Rect::bounding([(2.0, 3.0)]),
            Some(Rect::from_center(2.0, 3.0, 0.0, 0.0))
        );
        assert!(Rect::bounding([]).is_none());
    }

    #[test]
    fn grow() {
        let tall = Rect::from_center(10.0, 10.0, 50.0, 100.0);
        assert_eq!(
            tall.grow_to_fit_aspect(1.0),
            Rect::from_center(10.0, 10.0, 100.0, 100.0)
        );
        assert_eq!(
            tall.grow_to_fit_aspect(0.25),
            Rect::from_center(10.0, 10.0, 50.0, 200.0)
        );
        assert_eq!(
            Rect::from_center(0.0, 0.0, 10.0, 20.0).grow_rel(0.5),
            Rect::from_center(0.0, 0.0, 20.0, 40.0)
        );
    }
}
