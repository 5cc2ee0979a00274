/// Software rasterizer: paint commands onto an RGBA canvas, then PNG

use std::convert::Infallible;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, Rgba, RgbaImage};

use super::paint::PaintCommand;
use super::Screenshot;
use crate::error::Result;
use crate::fonts::{normalize_for_mono, FontFace};

/// Draws each font pixel as a `scale`x`scale` block at an offset on the image.
struct ScaledTarget<'a> {
    img: &'a mut RgbaImage,
    origin: (i32, i32),
    scale: u32,
}

impl OriginDimensions for ScaledTarget<'_> {
    fn size(&self) -> Size {
        let s = self.scale.max(1);
        Size::new(self.img.width() / s, self.img.height() / s)
    }
}

impl DrawTarget for ScaledTarget<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = (self.img.width() as i64, self.img.height() as i64);
        let s = self.scale.max(1) as i64;
        for Pixel(point, color) in pixels {
            let bx = self.origin.0 as i64 + point.x as i64 * s;
            let by = self.origin.1 as i64 + point.y as i64 * s;
            for dy in 0..s {
                for dx in 0..s {
                    let (x, y) = (bx + dx, by + dy);
                    if x >= 0 && y >= 0 && x < w && y < h {
                        self.img.put_pixel(
                            x as u32,
                            y as u32,
                            Rgba([color.r(), color.g(), color.b(), 255]),
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

fn fill_rect(img: &mut RgbaImage, x: i32, y: i32, width: u32, height: u32, rgba: (u8, u8, u8, u8)) {
    let x0 = x.max(0) as u32;
    let y0 = y.max(0) as u32;
    let x1 = (x as i64 + width as i64).clamp(0, img.width() as i64) as u32;
    let y1 = (y as i64 + height as i64).clamp(0, img.height() as i64) as u32;
    let px = Rgba([rgba.0, rgba.1, rgba.2, rgba.3]);
    for yy in y0..y1 {
        for xx in x0..x1 {
            img.put_pixel(xx, yy, px);
        }
    }
}

fn draw_text(img: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgb888, face: FontFace) {
    let mut target = ScaledTarget {
        img,
        origin: (x, y),
        scale: face.scale,
    };
    let style = MonoTextStyle::new(face.font, color);
    let normalized = normalize_for_mono(text);
    let _ = Text::with_baseline(normalized.as_ref(), Point::zero(), style, Baseline::Top)
        .draw(&mut target);
}

/// Execute `commands` on a `width`x`height` canvas.
pub fn paint(width: u32, height: u32, commands: &[PaintCommand]) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect {
                x,
                y,
                width,
                height,
                rgba,
            } => fill_rect(&mut img, *x, *y, *width, *height, *rgba),
            PaintCommand::Text {
                x,
                y,
                text,
                color,
                face,
            } => draw_text(
                &mut img,
                *x,
                *y,
                text,
                Rgb888::new(color.0, color.1, color.2),
                *face,
            ),
        }
    }
    img
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Fast, FilterType::Adaptive);
    encoder.write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Paint and encode in one step.
pub fn rasterize(width: u32, height: u32, commands: &[PaintCommand]) -> Result<Screenshot> {
    let rgba = paint(width, height, commands);
    let png_data = encode_png(&rgba)?;
    Ok(Screenshot {
        width,
        height,
        png_data,
        rgba,
    })
}
