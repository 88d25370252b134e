use crate::scene::ObjectId;

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and precondition failures. All of these are raised before the scene is mutated.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no output filename given")]
    MissingFilename,

    #[error("no output format selected (use -pdf/-eps/-png/-jpg/-tiff or a known file extension)")]
    NoFormat,

    #[error("unknown output format: {value}")]
    UnknownFormat { value: String },

    #[error("unknown renderer: {value} (expected opengl, painters or zbuffer)")]
    UnknownRenderer { value: String },

    #[error("malformed crop rectangle `{value}`: expected four finite numbers left,bottom,width,height with width and height > 0")]
    MalformedCrop { value: String },

    #[error("JPEG quality must be within 1..=100, got {value}")]
    InvalidQuality { value: i64 },

    #[error("resolution must be a positive number of pixels per inch, got {value}")]
    InvalidResolution { value: i64 },

    #[error("anti-alias factor must be >= 1, got {value}")]
    InvalidAntiAlias { value: i64 },

    #[error("rasterization requested with an empty object selection")]
    EmptyRasterSelection,

    #[error("no object named `{name}` in scene")]
    UnknownObject { name: String },

    #[error("object {id:?} is not part of the scene being exported")]
    ForeignObject { id: ObjectId },

    #[error("object {id:?} cannot hold children (only axes are containers)")]
    NotAContainer { id: ObjectId },

    #[error("invalid color `{value}`")]
    InvalidColor { value: String },

    #[error("no scene available")]
    NoScene,

    #[error("cannot read scene from {source_name}: {message}")]
    SceneRead { source_name: String, message: String },

    #[error("scene document error: {0}")]
    SceneJson(#[from] serde_json::Error),
}
