#![forbid(unsafe_code)]

//! Scene model and the scene-side half of the figtex export pipeline.
//!
//! Design goals:
//! - every mutation the exporter applies to a scene is reversible (see [`snapshot`])
//! - text is never rendered natively in final output; it is swapped for placeholder tags that
//!   LaTeX (`psfrag`) replaces at typesetting time (see [`text`])
//! - options are validated once, before the scene is touched (see [`options`])

pub mod color;
pub mod crop;
pub mod document;
pub mod error;
pub mod geom;
pub mod options;
pub mod scene;
pub mod snapshot;
pub mod text;

pub use color::{Color, Fill};
pub use crop::CropRect;
pub use error::{Error, Result};
pub use options::{ExportOptions, OutputFormat, RasterSelection, Renderer, resolve_output};
pub use scene::{
    Axes, DrawableObject, FaceFill, Figure, HAlign, Interpreter, Light, ObjectId, ObjectKind,
    PaperPositionMode, Scene, Shape, ShapeKind, TextContent, TextObject, Units, VAlign,
};
pub use snapshot::{SceneGuard, Snapshot};
pub use text::{TagSubstitution, substitute_text};
