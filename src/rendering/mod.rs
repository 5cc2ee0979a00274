//! Slide rendering: layout, display list and software rasterization.

pub mod layout;
pub mod paint;
pub mod raster;

use base64::Engine;
use image::RgbaImage;

use crate::css::Rgb;
use crate::dom::{Document, NodeId};
use crate::error::Result;
use layout::{layout_slide, LayoutOptions};

/// A rendered slide.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub png_data: Vec<u8>,
    pub rgba: RgbaImage,
}

impl Screenshot {
    /// Pixels without alpha, row-major.
    pub fn rgb_pixels(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity((self.width * self.height * 3) as usize);
        for px in self.rgba.pixels() {
            out.extend_from_slice(&px.0[..3]);
        }
        out
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png_data)
        )
    }
}

/// Lay out, paint and rasterize the subtree at `root`.
pub fn render_slide(
    doc: &Document,
    root: NodeId,
    options: &LayoutOptions,
    background: Rgb,
) -> Result<Screenshot> {
    let nodes = layout_slide(doc, root, *options);
    let cmds = paint::build_display_list(&nodes, options.width, options.height, background);
    raster::rasterize(options.width, options.height, &cmds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_slide_produces_png_of_canvas_size() {
        let doc = Document::from_html(&scraper::Html::parse_document(
            r#"<div style="background:#123456"><h1>Title</h1><p>Body</p></div>"#,
        ));
        let div = doc.find_tag(doc.root(), "div").unwrap();
        let opts = LayoutOptions {
            width: 320,
            height: 180,
            scale: 0.25,
            ..LayoutOptions::default()
        };
        let shot = render_slide(&doc, div, &opts, Rgb::WHITE).unwrap();
        assert_eq!((shot.width, shot.height), (320, 180));
        assert_eq!(shot.rgba.get_pixel(0, 0).0, [0x12, 0x34, 0x56, 255]);
        assert_eq!(shot.rgb_pixels().len(), 320 * 180 * 3);
        assert!(shot.to_data_url().starts_with("data:image/png;base64,iVBOR"));
    }
}
