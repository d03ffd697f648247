//! Overlay drawing.
//!
//! The functions in this module return guards. Nothing is drawn until the guard is dropped, so
//! color, stroke and alignment can be chained onto the call:
//!
//! ```no_run
//! # use handsign::image::{draw, Color, Image, Rect};
//! # let mut image = Image::new(64, 64);
//! draw::rect(&mut image, Rect::from_center(32.0, 32.0, 10.0, 10.0)).color(Color::MAGENTA);
//! ```

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use super::{AsImageViewMut, Color, ImageViewMut, Rect};

/// Size of one character cell of the overlay font.
pub const GLYPH_WIDTH: u32 = 10;
pub const GLYPH_HEIGHT: u32 = 20;

/// Half the width of the `X` drawn by [`marker`].
const MARKER_RADIUS: i32 = 2;

enum Shape {
    Outline(Rectangle),
    Filled(Rectangle),
    Segments(Vec<(Point, Point)>),
}

/// Pending rectangle, line or marker.
pub struct DrawShape<'a> {
    target: ImageViewMut<'a>,
    shape: Shape,
    color: Color,
    stroke: u32,
}

impl DrawShape<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Line thickness in pixels. Defaults to 1 and is ignored by filled rectangles.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke = width;
        self
    }
}

impl Drop for DrawShape<'_> {
    fn drop(&mut self) {
        let stroke = PrimitiveStyle::with_stroke(self.color, self.stroke);
        let result = match &self.shape {
            Shape::Outline(r) => r.into_styled(stroke).draw(&mut self.target),
            Shape::Filled(r) => r
                .into_styled(PrimitiveStyle::with_fill(self.color))
                .draw(&mut self.target),
            Shape::Segments(segments) => segments.iter().try_for_each(|&(a, b)| {
                Line::new(a, b).into_styled(stroke).draw(&mut self.target)
            }),
        };
        result.unwrap_or_else(|never| match never {});
    }
}

/// Pending text label.
pub struct DrawText<'a> {
    target: ImageViewMut<'a>,
    anchor: Point,
    text: &'a str,
    color: Color,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Puts the anchor point on the top edge of the text.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Puts the anchor point on the bottom edge of the text.
    pub fn align_bottom(&mut self) -> &mut Self {
        self.baseline = Baseline::Bottom;
        self
    }

    /// Puts the anchor point on the left edge of the text.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        // Non-ASCII characters come out as '?'.
        let style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        Text::with_text_style(
            self.text,
            self.anchor,
            MonoTextStyle::new(&FONT_10X20, self.color),
            style,
        )
        .draw(&mut self.target)
        .map(drop)
        .unwrap_or_else(|never| match never {});
    }
}

fn point(x: f32, y: f32) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

fn rectangle(rect: Rect) -> Rectangle {
    let size = Size::new(
        rect.width().round().max(0.0) as u32,
        rect.height().round().max(0.0) as u32,
    );
    Rectangle::new(point(rect.x(), rect.y()), size)
}

fn shape<I: AsImageViewMut>(image: &mut I, shape: Shape, color: Color) -> DrawShape<'_> {
    DrawShape {
        target: image.as_view_mut(),
        shape,
        color,
        stroke: 1,
    }
}

/// Outlines `rect` in red.
pub fn rect<I: AsImageViewMut>(image: &mut I, rect: Rect) -> DrawShape<'_> {
    shape(image, Shape::Outline(rectangle(rect)), Color::RED)
}

/// Fills `rect` with black.
pub fn filled_rect<I: AsImageViewMut>(image: &mut I, rect: Rect) -> DrawShape<'_> {
    shape(image, Shape::Filled(rectangle(rect)), Color::BLACK)
}

/// Marks a point with a small red `X`.
pub fn marker<I: AsImageViewMut>(image: &mut I, x: f32, y: f32) -> DrawShape<'_> {
    let c = point(x, y);
    let (dx, dy) = (Point::new(MARKER_RADIUS, 0), Point::new(0, MARKER_RADIUS));
    let segments = vec![(c - dx - dy, c + dx + dy), (c + dx - dy, c - dx + dy)];
    shape(image, Shape::Segments(segments), Color::RED)
}

/// Draws a blue line segment.
pub fn line<I: AsImageViewMut>(
    image: &mut I,
    start_x: f32,
    start_y: f32,
    end_x: f32,
    end_y: f32,
) -> DrawShape<'_> {
    let segment = (point(start_x, start_y), point(end_x, end_y));
    shape(image, Shape::Segments(vec![segment]), Color::BLUE)
}

/// Draws red text centered on `(x, y)` unless aligned otherwise.
pub fn text<'a, I: AsImageViewMut>(
    image: &'a mut I,
    x: f32,
    y: f32,
    text: &'a str,
) -> DrawText<'a> {
    DrawText {
        target: image.as_view_mut(),
        anchor: point(x, y),
        text,
        color: Color::RED,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

/// Pixel size of `text` when rendered by [`text`].
pub fn text_size(text: &str) -> (u32, u32) {
    (text.chars().count() as u32 * GLYPH_WIDTH, GLYPH_HEIGHT)
}

impl OriginDimensions for ImageViewMut<'_> {
    fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }
}

impl DrawTarget for ImageViewMut<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Infallible>
    where
        I: IntoIterator<Item = Pixel<Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
                self.set(x, y, color);
            }
        }
        Ok(())
    }
}
