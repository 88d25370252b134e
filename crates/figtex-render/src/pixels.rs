use crate::display::DisplayList;
use crate::{Error, Result};
use figtex_core::Color;
use image::RgbImage;

/// Draws a display list into an opaque RGB buffer.
///
/// `magnify` scales the canvas (screen pixels) to output pixels. The background color always
/// replaces the list's own background, which lets callers render the same content twice over
/// different backdrops.
pub trait PixelRenderer {
    fn render(&self, list: &DisplayList, magnify: f64, background: Color) -> Result<RgbImage>;
}

/// Renders through SVG with resvg/tiny-skia.
pub struct ResvgRenderer {
    options: usvg::Options<'static>,
}

impl Default for ResvgRenderer {
    fn default() -> Self {
        let mut options = usvg::Options::default();
        options.fontdb_mut().load_system_fonts();
        options.font_family = "Arial".to_string();
        Self { options }
    }
}

impl ResvgRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PixelRenderer for ResvgRenderer {
    fn render(&self, list: &DisplayList, magnify: f64, background: Color) -> Result<RgbImage> {
        let svg = crate::svg::to_svg(list);
        let tree = usvg::Tree::from_str(&svg, &self.options).map_err(|err| Error::SvgParse {
            message: err.to_string(),
        })?;

        let width = (list.width * magnify).ceil().max(1.0) as u32;
        let height = (list.height * magnify).ceil().max(1.0) as u32;
        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or(Error::PixmapAlloc { width, height })?;
        pixmap.fill(tiny_skia::Color::from_rgba8(
            background.r,
            background.g,
            background.b,
            255,
        ));

        let scale = magnify as f32;
        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );

        // The backdrop is opaque, so every pixel has alpha 255 and premultiplication is a no-op.
        let rgb: Vec<u8> = pixmap
            .data()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        RgbImage::from_raw(width, height, rgb).ok_or(Error::PixmapAlloc { width, height })
    }
}
