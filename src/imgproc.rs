use crate::error::{Error, Result};
use crate::shapes::point::Point;
use crate::shapes::region::NormalizedBox;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{self, Interpolation, Projection};
use ndarray::{Array, Array4};
use tracing::{Level, span};

const FILL: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputRange {
    #[default]
    ZeroToOne,
    NegOneToOne,
}

impl OutputRange {
    fn convert(&self, v: u8) -> f32 {
        match self {
            Self::ZeroToOne => v as f32 / 255.,
            Self::NegOneToOne => v as f32 / 127.5 - 1.,
        }
    }
}

pub fn ensure_frame(img: &RgbImage) -> Result<()> {
    if img.width() == 0 || img.height() == 0 {
        return Err(Error::InvalidInput(format!(
            "frame has no pixels ({}x{})",
            img.width(),
            img.height()
        )));
    }
    Ok(())
}

/// Rotates the whole frame about `center`. A pixel at `p` lands at
/// `p.rotate(center, theta)`; uncovered corners are black.
pub fn rotate(img: &RgbImage, center: Point, theta: f64) -> RgbImage {
    let span = span!(Level::DEBUG, "rotate");
    let _guard = span.enter();

    geometric_transformations::rotate(
        img,
        (center.x as f32, center.y as f32),
        theta as f32,
        Interpolation::Bilinear,
        FILL,
    )
}

/// Samples the area under `bounds` into a `width` x `height` image.
/// Parts of the box outside the frame come out black.
pub fn crop_and_resize(
    img: &RgbImage,
    bounds: &NormalizedBox,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    let span = span!(Level::DEBUG, "crop_and_resize");
    let _guard = span.enter();

    ensure_frame(img)?;
    let region = bounds.to_pixels(img.width(), img.height());
    region.ensure_croppable()?;

    let projection = Projection::scale(
        (width as f64 / region.width()) as f32,
        (height as f64 / region.height()) as f32,
    ) * Projection::translate(-region.start.x as f32, -region.start.y as f32);

    let mut out = RgbImage::new(width, height);
    geometric_transformations::warp_into(
        img,
        &projection,
        Interpolation::Bilinear,
        FILL,
        &mut out,
    );

    Ok(out)
}

pub fn resize(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    imageops::resize(img, width, height, FilterType::Triangle)
}

/// NHWC tensor with a batch of one.
pub fn to_tensor(img: &RgbImage, range: OutputRange) -> Array4<f32> {
    let span = span!(Level::DEBUG, "to_tensor");
    let _guard = span.enter();

    Array::from_shape_fn(
        (1, img.height() as usize, img.width() as usize, 3),
        |(_, y, x, c)| range.convert(img.get_pixel(x as u32, y as u32)[c]),
    )
}
