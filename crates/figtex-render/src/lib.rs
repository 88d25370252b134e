#![forbid(unsafe_code)]

//! Rendering backends for figtex scenes.
//!
//! Both backends consume the same [`display::DisplayList`]: the PostScript writer produces the
//! intermediate vector document that LaTeX/`psfrag` post-processes, and the resvg-based pixel
//! renderer feeds the alpha-channel rasterizer.

pub mod alpha;
pub mod colormap;
pub mod display;
pub mod downsample;
pub mod pixels;
pub mod postscript;
pub mod projection;
pub mod svg;

pub use alpha::{RasterizeOptions, RenderedLayer, enclosing_axes, rasterize, with_descendants};
pub use display::{DisplayList, RenderSettings, build_display_list};
pub use downsample::downsample;
pub use pixels::{PixelRenderer, ResvgRenderer};
pub use postscript::{EpsOptions, strip_background, write_eps};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse generated SVG: {message}")]
    SvgParse { message: String },
    #[error("failed to allocate a {width}x{height} pixmap for raster rendering")]
    PixmapAlloc { width: u32, height: u32 },
    #[error("white and black background passes differ in size ({white:?} vs {black:?})")]
    LayerMismatch {
        white: (u32, u32),
        black: (u32, u32),
    },
    #[error("failed to encode raster layer: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
