use crate::crop::CropRect;
use crate::error::{Error, Result};
use crate::scene::{ObjectId, Scene};
use indexmap::IndexSet;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputFormat {
    Pdf,
    Eps,
    Png,
    Jpeg,
    Tiff,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Pdf,
        OutputFormat::Eps,
        OutputFormat::Png,
        OutputFormat::Jpeg,
        OutputFormat::Tiff,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Eps => "eps",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Tiff => "tiff",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.parse().ok()
    }

    /// Pixel formats are produced by density-scaled conversion; the rest are vector documents.
    pub fn is_pixel(self) -> bool {
        matches!(
            self,
            OutputFormat::Png | OutputFormat::Jpeg | OutputFormat::Tiff
        )
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "eps" => Ok(Self::Eps),
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "tif" | "tiff" => Ok(Self::Tiff),
            _ => Err(Error::UnknownFormat {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Pixel renderer used for the rasterized layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Renderer {
    #[default]
    OpenGl,
    Painters,
    ZBuffer,
}

impl Renderer {
    /// Only the OpenGL-equivalent renderer blends translucent faces.
    pub fn supports_transparency(self) -> bool {
        matches!(self, Renderer::OpenGl)
    }
}

impl FromStr for Renderer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opengl" => Ok(Self::OpenGl),
            "painters" => Ok(Self::Painters),
            "zbuffer" => Ok(Self::ZBuffer),
            _ => Err(Error::UnknownRenderer {
                value: s.to_string(),
            }),
        }
    }
}

pub type RasterSelection = BTreeSet<ObjectId>;

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Output path without extension; each format writes `<basename>.<ext>`.
    pub basename: PathBuf,
    pub formats: IndexSet<OutputFormat>,
    pub crop: CropRect,
    pub transparent: bool,
    /// Objects rendered as pixels; `None` exports everything as vectors.
    pub rasterize: Option<RasterSelection>,
    /// Pixels per inch for pixel output and the raster layer; `None` uses the scene's density.
    pub resolution: Option<u32>,
    pub jpeg_quality: u8,
    pub anti_alias: u32,
    pub renderer: Renderer,
    /// Trim the output to drawn content instead of the full canvas.
    pub auto_crop: bool,
    /// Extra preamble lines inserted verbatim into generated LaTeX documents.
    pub preamble: Vec<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            basename: PathBuf::new(),
            formats: IndexSet::new(),
            crop: CropRect::FULL,
            transparent: false,
            rasterize: None,
            resolution: None,
            jpeg_quality: 90,
            anti_alias: 1,
            renderer: Renderer::OpenGl,
            auto_crop: true,
            preamble: Vec::new(),
        }
    }
}

impl ExportOptions {
    pub fn new(basename: impl Into<PathBuf>, formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        Self {
            basename: basename.into(),
            formats: formats.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Checks everything that can be checked without a scene.
    pub fn validate(&self) -> Result<()> {
        if self.basename.as_os_str().is_empty() {
            return Err(Error::MissingFilename);
        }
        if self.formats.is_empty() {
            return Err(Error::NoFormat);
        }
        self.crop.validate()?;
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::InvalidQuality {
                value: i64::from(self.jpeg_quality),
            });
        }
        if self.resolution == Some(0) {
            return Err(Error::InvalidResolution { value: 0 });
        }
        if self.anti_alias == 0 {
            return Err(Error::InvalidAntiAlias { value: 0 });
        }
        if self.rasterize.as_ref().is_some_and(|s| s.is_empty()) {
            return Err(Error::EmptyRasterSelection);
        }
        Ok(())
    }

    /// Scene-dependent preconditions: every raster selection member must belong to `scene`.
    pub fn validate_for(&self, scene: &Scene) -> Result<()> {
        self.validate()?;
        if let Some(selection) = &self.rasterize {
            if let Some(&id) = selection.iter().find(|id| !scene.contains(**id)) {
                return Err(Error::ForeignObject { id });
            }
        }
        Ok(())
    }

    pub fn resolution_ppi(&self, scene: &Scene) -> f64 {
        self.resolution
            .map(f64::from)
            .unwrap_or(scene.screen_ppi)
    }

    pub fn is_rasterizing(&self) -> bool {
        self.rasterize.is_some()
    }

    pub fn output_path(&self, format: OutputFormat) -> PathBuf {
        let mut name = self.basename.clone().into_os_string();
        name.push(".");
        name.push(format.extension());
        PathBuf::from(name)
    }
}

/// Splits an output filename into a base name and the format set.
///
/// A recognized extension is stripped and selects its format first; explicit flags follow in
/// the order given, duplicates dropped.
pub fn resolve_output(
    filename: &str,
    explicit: &[OutputFormat],
) -> Result<(PathBuf, IndexSet<OutputFormat>)> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(Error::MissingFilename);
    }
    let path = Path::new(filename);
    let mut formats = IndexSet::new();
    let base = match path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(OutputFormat::from_extension)
    {
        Some(format) => {
            formats.insert(format);
            path.with_extension("")
        }
        None => path.to_path_buf(),
    };
    formats.extend(explicit.iter().copied());
    if formats.is_empty() {
        return Err(Error::NoFormat);
    }
    Ok((base, formats))
}
