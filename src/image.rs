//! RGBA frames and rectangular views into them.
//!
//! Detectors take any [`AsImageView`], so they can run on a whole [`Image`] or on a cropped
//! [`ImageView`] alike. Overlays are drawn through [`AsImageViewMut`] with the [`draw`] module.

pub mod draw;
mod jpeg;
mod rect;
mod resolution;


use std::fmt;

use anyhow::anyhow;
use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{Rgba, RgbaImage};

pub use rect::Rect;
pub use resolution::Resolution;

/// Owned 8-bit sRGB image with alpha.
#[derive(Clone)]
pub struct Image {
    // Row-major RGBA, uploaded to the window texture without conversion.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// A `width` by `height` image filled with [`Color::NULL`].
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: RgbaImage::new(width, height),
        }
    }

    /// Wraps decoded RGBA bytes. Fails unless `pixels.len() == 4 * width * height`.
    pub(crate) fn from_raw(res: Resolution, pixels: Vec<u8>) -> anyhow::Result<Self> {
        let len = pixels.len();
        let buf = RgbaImage::from_raw(res.width(), res.height(), pixels)
            .ok_or_else(|| anyhow!("{len} bytes of RGBA data do not fit a {res} image"))?;
        Ok(Self { buf })
    }

    /// Decodes a JPEG or MJPEG frame with the backend chosen by `HANDSIGN_JPEG_BACKEND`.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        jpeg::decode(data)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// The rectangle covering the whole image.
    pub fn rect(&self) -> Rect {
        self.resolution().rect()
    }

    /// Reads one pixel. Panics outside the image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf.get_pixel(x, y).0)
    }

    /// Writes one pixel. Panics outside the image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf.put_pixel(x, y, Rgba(color.0));
    }

    /// Borrows the area under `rect`, rounded to whole pixels.
    ///
    /// `rect` may extend past the image; the parts outside read as [`Color::NULL`].
    pub fn view(&self, rect: Rect) -> ImageView<'_> {
        ImageView {
            image: self,
            area: Area::of(self).sub(rect),
        }
    }

    /// Mutable version of [`Image::view`]. Writes outside the image are dropped.
    pub fn view_mut(&mut self, rect: Rect) -> ImageViewMut<'_> {
        ImageViewMut {
            area: Area::of(self).sub(rect),
            image: self,
        }
    }

    /// Mirrors the image left to right.
    pub fn flip_horizontal_in_place(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.buf);
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({})", self.resolution())
    }
}

impl Resolution {
    fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }
}

/// Pixel window of a view, in coordinates of the underlying [`Image`].
///
/// The origin may be negative and the size may exceed the image.
#[derive(Debug, Clone, Copy)]
struct Area {
    left: i64,
    top: i64,
    size: Resolution,
}

impl Area {
    fn of(image: &Image) -> Self {
        Self {
            left: 0,
            top: 0,
            size: image.resolution(),
        }
    }

    /// `rect` is relative to this area's origin.
    fn sub(&self, rect: Rect) -> Self {
        let px = |v: f32| v.round() as i64;
        let len = |v: f32| v.round().max(0.0) as u32;
        Self {
            left: self.left + px(rect.x()),
            top: self.top + px(rect.y()),
            size: Resolution::new(len(rect.width()), len(rect.height())),
        }
    }

    /// Maps view coordinates to image coordinates, if both are in bounds.
    fn locate(&self, x: u32, y: u32, image: &Image) -> Option<(u32, u32)> {
        if x >= self.size.width() || y >= self.size.height() {
            return None;
        }
        let ix = u32::try_from(self.left + i64::from(x)).ok()?;
        let iy = u32::try_from(self.top + i64::from(y)).ok()?;
        (ix < image.width() && iy < image.height()).then_some((ix, iy))
    }

    fn read(&self, x: u32, y: u32, image: &Image) -> Color {
        self.locate(x, y, image)
            .map_or(Color::NULL, |(x, y)| image.get(x, y))
    }
}

/// Read-only window into an [`Image`].
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    area: Area,
}

impl<'a> ImageView<'a> {
    pub fn width(&self) -> u32 {
        self.area.size.width()
    }

    pub fn height(&self) -> u32 {
        self.area.size.height()
    }

    pub fn resolution(&self) -> Resolution {
        self.area.size
    }

    /// The view's own bounds, with the origin at `(0, 0)`.
    pub fn rect(&self) -> Rect {
        self.area.size.rect()
    }

    /// Pixel at `(x, y)` relative to the view. [`Color::NULL`] outside the image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.area.read(x, y, self.image)
    }

    /// Narrows the view to `rect`, given relative to this view.
    pub fn view(&self, rect: Rect) -> ImageView<'a> {
        ImageView {
            image: self.image,
            area: self.area.sub(rect),
        }
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageView({})", self.resolution())
    }
}

/// Writable window into an [`Image`].
pub struct ImageViewMut<'a> {
    image: &'a mut Image,
    area: Area,
}

impl ImageViewMut<'_> {
    pub fn width(&self) -> u32 {
        self.area.size.width()
    }

    pub fn height(&self) -> u32 {
        self.area.size.height()
    }

    /// Writes the pixel at `(x, y)` relative to the view, if it lies inside the image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        if let Some((x, y)) = self.area.locate(x, y, self.image) {
            self.image.set(x, y, color);
        }
    }

    /// Shorter-lived copy of this view, like an implicit `&mut` reborrow.
    pub fn reborrow(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            image: self.image,
            area: self.area,
        }
    }
}

impl fmt::Debug for ImageViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageViewMut({})", self.area.size)
    }
}

/// Non-premultiplied sRGB color with alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Transparent black. Out-of-bounds view pixels read as this.
    pub const NULL: Self = Self([0; 4]);
    pub const BLACK: Self = Self::from_rgb8(0, 0, 0);
    pub const WHITE: Self = Self::from_rgb8(255, 255, 255);
    pub const RED: Self = Self::from_rgb8(255, 0, 0);
    pub const GREEN: Self = Self::from_rgb8(0, 255, 0);
    pub const BLUE: Self = Self::from_rgb8(0, 0, 255);
    pub const YELLOW: Self = Self::from_rgb8(255, 255, 0);
    pub const MAGENTA: Self = Self::from_rgb8(255, 0, 255);
    pub const CYAN: Self = Self::from_rgb8(0, 255, 255);

    /// An opaque color.
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    pub fn r(&self) -> u8 {
        self.0[0]
    }

    pub fn g(&self) -> u8 {
        self.0[1]
    }

    pub fn b(&self) -> u8 {
        self.0[2]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

/// Anything that can lend a read-only [`ImageView`] of itself.
pub trait AsImageView {
    fn as_view(&self) -> ImageView<'_>;
}

/// Anything that can lend an [`ImageViewMut`] of itself.
pub trait AsImageViewMut: AsImageView {
    fn as_view_mut(&mut self) -> ImageViewMut<'_>;
}

impl AsImageView for Image {
    fn as_view(&self) -> ImageView<'_> {
        self.view(self.rect())
    }
}

impl AsImageViewMut for Image {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.view_mut(self.rect())
    }
}

impl AsImageView for ImageView<'_> {
    fn as_view(&self) -> ImageView<'_> {
        *self
    }
}

impl AsImageView for ImageViewMut<'_> {
    fn as_view(&self) -> ImageView<'_> {
        ImageView {
            image: self.image,
            area: self.area,
        }
    }
}

impl AsImageViewMut for ImageViewMut<'_> {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.reborrow()
    }
}

impl<V: AsImageView> AsImageView for &V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageView> AsImageView for &mut V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageViewMut> AsImageViewMut for &mut V {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        (**self).as_view_mut()
    }
}
