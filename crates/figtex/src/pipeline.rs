//! The export pipeline.
//!
//! Stages, in order: validate options, snapshot the scene, substitute text, crop, rasterize the
//! selection (optional), write the vector EPS, strip its background (optional), restore the
//! scene, typeset with `latex`, convert to every requested format, remove the work directory.
//!
//! Everything up to and including the primary `latex` run is fatal. Later failures only cost
//! the affected formats and are reported as [`ExportWarning`]s.

use crate::latex::{overlay_document, tag_document};
use crate::tools::{Invocation, ProcessRunner, SystemRunner, Toolchain};
use crate::{ExportError, Result};
use figtex_core::text::{DeterministicTextMeasurer, TextMeasurer};
use figtex_core::{
    Color, ExportOptions, Fill, ObjectKind, OutputFormat, PaperPositionMode, Scene, SceneGuard,
    TagSubstitution, crop, substitute_text,
};
use figtex_render::{
    EpsOptions, PixelRenderer, RasterizeOptions, RenderSettings, ResvgRenderer,
    build_display_list, enclosing_axes, rasterize, strip_background, with_descendants, write_eps,
};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const SOURCE_EPS: &str = "figure.eps";
const TAG_TEX: &str = "figtex.tex";
const TAG_DVI: &str = "figtex.dvi";
const TYPESET_PS: &str = "figtex.ps";
const TYPESET_EPS: &str = "figtex.eps";
const VECTOR_PDF: &str = "figtex.pdf";
const RASTER_PNG: &str = "raster.png";
const OVERLAY_TEX: &str = "overlay.tex";
const OVERLAY_PDF: &str = "overlay.pdf";
const OVERLAY_EPS: &str = "overlay.eps";
const PIXELS_PNG: &str = "pixels.png";

const LOG_LINES: usize = 20;

/// A stage failure that cost one format (or, with `format: None`, all of them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportWarning {
    pub format: Option<OutputFormat>,
    pub stage: &'static str,
    pub message: String,
}

impl fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format {
            Some(format) => write!(f, "{format}: {} failed: {}", self.stage, self.message),
            None => write!(f, "{} failed: {}", self.stage, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Files written, in the order the formats were requested.
    pub written: Vec<PathBuf>,
    pub warnings: Vec<ExportWarning>,
}

impl ExportReport {
    pub fn produced_any(&self) -> bool {
        !self.written.is_empty()
    }

    fn warn(&mut self, format: Option<OutputFormat>, stage: &'static str, message: String) {
        let warning = ExportWarning {
            format,
            stage,
            message,
        };
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }
}

/// Scratch directory for one export, removed on drop.
struct WorkDir {
    path: PathBuf,
    keep: bool,
}

impl WorkDir {
    fn create(root: &Path, keep: bool) -> Result<Self> {
        let path = root.join(format!("figtex-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&path).map_err(|source| ExportError::Io {
            action: "create work directory",
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "created work directory");
        Ok(Self { path, keep })
    }

    fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    fn write(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.file(name);
        fs::write(&path, contents).map_err(|source| ExportError::Io {
            action: "write",
            path,
            source,
        })
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.keep {
            tracing::info!(path = %self.path.display(), "keeping work directory");
        } else if let Err(err) = fs::remove_dir_all(&self.path) {
            tracing::warn!(path = %self.path.display(), %err, "failed to remove work directory");
        }
    }
}

/// What the scene-mutating stages hand to the typesetting stages.
struct Prepared {
    subs: Vec<TagSubstitution>,
    background: Option<Color>,
    rasterized: bool,
    /// Output density for pixel formats and the raster layer.
    ppi: f64,
}

pub struct Exporter {
    toolchain: Toolchain,
    runner: Box<dyn ProcessRunner>,
    pixels: Box<dyn PixelRenderer>,
    measurer: Box<dyn TextMeasurer>,
    temp_root: PathBuf,
    keep_temp: bool,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter {
    /// System tools configured from the environment, resvg for the raster layer.
    pub fn new() -> Self {
        Self {
            toolchain: Toolchain::from_env(),
            runner: Box::new(SystemRunner),
            pixels: Box::new(ResvgRenderer::new()),
            measurer: Box::new(DeterministicTextMeasurer::default()),
            temp_root: std::env::temp_dir(),
            keep_temp: std::env::var_os("FIGTEX_KEEP_TEMP").is_some_and(|v| !v.is_empty()),
        }
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_runner(mut self, runner: impl ProcessRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn with_pixel_renderer(mut self, pixels: impl PixelRenderer + 'static) -> Self {
        self.pixels = Box::new(pixels);
        self
    }

    /// Directory under which per-export work directories are created.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    pub fn keep_temp(mut self, keep: bool) -> Self {
        self.keep_temp = keep;
        self
    }

    /// Exports `scene` to every format in `options`.
    ///
    /// The scene is left exactly as it was found, whatever the outcome.
    pub fn export(&self, scene: &mut Scene, options: &ExportOptions) -> Result<ExportReport> {
        options.validate_for(scene)?;
        let work = WorkDir::create(&self.temp_root, self.keep_temp)?;
        let prepared = self.prepare(scene, options, &work)?;

        let mut report = ExportReport::default();
        self.typeset(&work, options, &prepared)?;
        let mut conversion = Conversion {
            exporter: self,
            work: &work,
            options,
            prepared: &prepared,
            memo: HashMap::new(),
        };
        for &format in &options.formats {
            conversion.produce(format, &mut report);
        }
        tracing::debug!(
            written = report.written.len(),
            warnings = report.warnings.len(),
            "export finished"
        );
        Ok(report)
    }

    /// Runs every scene-mutating stage under one guard and writes the source EPS.
    fn prepare(&self, scene: &mut Scene, options: &ExportOptions, work: &WorkDir) -> Result<Prepared> {
        let mut guard = SceneGuard::new(scene);
        guard.figure.paper_position_mode = PaperPositionMode::Auto;
        guard.figure.inverted_hardcopy = false;

        let subs = substitute_text(&mut guard, self.measurer.as_ref());
        tracing::debug!(tags = subs.len(), "substituted text");

        if !options.crop.is_full() {
            crop::apply(&mut guard, &options.crop);
        }
        let background = if options.transparent {
            None
        } else {
            guard.figure.color.color()
        };

        let ppi = options.resolution_ppi(&guard);
        let mut tight_bbox = options.auto_crop;
        let rasterized = if let Some(selection) = &options.rasterize {
            tight_bbox = false;
            let layer = rasterize(
                &mut guard,
                selection,
                &RasterizeOptions {
                    anti_alias: options.anti_alias,
                    ppi,
                    renderer: options.renderer,
                },
                self.pixels.as_ref(),
            )?;
            layer.write_png(&work.file(RASTER_PNG))?;
            tracing::debug!(size = ?layer.dimensions(), "wrote raster layer");

            let hidden = with_descendants(&guard, selection);
            let backdrops = enclosing_axes(&guard, selection);
            for (id, obj) in guard.objects_mut() {
                if hidden.contains(&id) && obj.as_text().is_none() {
                    obj.visible = false;
                }
                if backdrops.contains(&id) {
                    if let ObjectKind::Axes(axes) = &mut obj.kind {
                        axes.color = Fill::None;
                    }
                }
            }
            true
        } else {
            false
        };

        let settings = RenderSettings {
            opaque_faces: !options.renderer.supports_transparency(),
        };
        let list = build_display_list(&guard, &settings);
        let eps_options = EpsOptions {
            tight_bbox,
            pt_per_px: 72.0 / guard.screen_ppi,
        };
        let mut eps = write_eps(&list, &eps_options);
        if options.transparent || rasterized {
            eps = strip_background(&eps);
        }
        work.write(SOURCE_EPS, &eps)?;
        tracing::debug!(items = list.items.len(), tight_bbox, "wrote vector document");

        guard.restore();
        Ok(Prepared {
            subs,
            background,
            rasterized,
            ppi,
        })
    }

    fn invocation(&self, program: &str, work: &WorkDir) -> Invocation {
        Invocation::new(program, &work.path, self.toolchain.timeout())
    }

    /// Runs `invocation` and checks that it produced `output`.
    fn run_step(&self, invocation: &Invocation, output: &Path) -> std::result::Result<(), String> {
        let out = self
            .runner
            .run(invocation)
            .map_err(|err| format!("failed to start `{}`: {err}", invocation.program))?;
        if !out.success() {
            let tail = out.log_tail(LOG_LINES);
            return Err(format!("`{}` {}\n{tail}", invocation.command_line(), out.describe_failure()));
        }
        if !output.is_file() {
            return Err(format!(
                "`{}` did not produce {}",
                invocation.command_line(),
                output.display()
            ));
        }
        Ok(())
    }

    /// The primary `latex` compile; failing here aborts the export.
    fn typeset(&self, work: &WorkDir, options: &ExportOptions, prepared: &Prepared) -> Result<()> {
        work.write(
            TAG_TEX,
            &tag_document(&prepared.subs, &options.preamble, SOURCE_EPS),
        )?;
        let latex = self
            .invocation(&self.toolchain.latex, work)
            .args(["-interaction=nonstopmode", "-halt-on-error", TAG_TEX]);
        let out = self
            .runner
            .run(&latex)
            .map_err(|err| ExportError::Typeset {
                stage: "latex",
                message: format!("failed to start `{}`: {err}", latex.program),
                log: String::new(),
            })?;
        if !out.success() || !work.file(TAG_DVI).is_file() {
            return Err(ExportError::Typeset {
                stage: "latex",
                message: out.describe_failure(),
                log: out.log_tail(LOG_LINES),
            });
        }
        tracing::debug!("typeset tag document");
        Ok(())
    }
}

/// Lazily builds the intermediate files the requested formats need, each at most once.
struct Conversion<'a> {
    exporter: &'a Exporter,
    work: &'a WorkDir,
    options: &'a ExportOptions,
    prepared: &'a Prepared,
    memo: HashMap<&'static str, std::result::Result<PathBuf, (&'static str, String)>>,
}

impl Conversion<'_> {
    fn intermediate(&mut self, name: &'static str) -> std::result::Result<PathBuf, (&'static str, String)> {
        if let Some(done) = self.memo.get(name) {
            return done.clone();
        }
        let result = self.build(name);
        self.memo.insert(name, result.clone());
        result
    }

    fn build(&mut self, name: &'static str) -> std::result::Result<PathBuf, (&'static str, String)> {
        let exporter = self.exporter;
        let tc = &exporter.toolchain;
        let (stage, invocation) = match name {
            // The page size comes from the `papersize` special in the tag document.
            TYPESET_PS => (
                "dvips",
                exporter
                    .invocation(&tc.dvips, self.work)
                    .args(["-o", TYPESET_PS, TAG_DVI]),
            ),
            VECTOR_PDF => {
                self.intermediate(TYPESET_PS)?;
                (
                    "ps2pdf",
                    exporter
                        .invocation(&tc.ps2pdf, self.work)
                        .args([TYPESET_PS, VECTOR_PDF]),
                )
            }
            TYPESET_EPS => {
                self.intermediate(VECTOR_PDF)?;
                (
                    "pdftops",
                    exporter
                        .invocation(&tc.pdftops, self.work)
                        .args(["-eps", VECTOR_PDF, TYPESET_EPS]),
                )
            }
            OVERLAY_PDF => {
                self.intermediate(VECTOR_PDF)?;
                let doc = overlay_document(
                    VECTOR_PDF,
                    RASTER_PNG,
                    self.prepared.background,
                    &self.options.preamble,
                );
                self.work
                    .write(OVERLAY_TEX, &doc)
                    .map_err(|err| ("pdflatex", err.to_string()))?;
                (
                    "pdflatex",
                    exporter
                        .invocation(&tc.pdflatex, self.work)
                        .args(["-interaction=nonstopmode", "-halt-on-error", OVERLAY_TEX]),
                )
            }
            OVERLAY_EPS => {
                self.intermediate(OVERLAY_PDF)?;
                (
                    "pdftops",
                    exporter
                        .invocation(&tc.pdftops, self.work)
                        .args(["-eps", OVERLAY_PDF, OVERLAY_EPS]),
                )
            }
            PIXELS_PNG => {
                // Rasterized exports always render over white.
                let (source, device) = if self.prepared.rasterized {
                    (self.intermediate(OVERLAY_PDF)?, "png16m")
                } else if self.options.transparent {
                    (self.intermediate(TYPESET_PS)?, "pngalpha")
                } else {
                    (self.intermediate(TYPESET_PS)?, "png16m")
                };
                let source = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let ppi = self.prepared.ppi.round() as u32;
                (
                    "gs",
                    exporter
                        .invocation(&tc.gs, self.work)
                        .args(["-dSAFER", "-dBATCH", "-dNOPAUSE", "-dQUIET"])
                        .args([
                            format!("-sDEVICE={device}"),
                            format!("-r{ppi}"),
                            "-dTextAlphaBits=4".to_string(),
                            "-dGraphicsAlphaBits=4".to_string(),
                            format!("-sOutputFile={PIXELS_PNG}"),
                            source,
                        ]),
                )
            }
            other => return Err(("convert", format!("no recipe for {other}"))),
        };
        let path = self.work.file(name);
        exporter
            .run_step(&invocation, &path)
            .map_err(|message| (stage, message))?;
        tracing::debug!(file = name, "produced intermediate");
        Ok(path)
    }

    fn produce(&mut self, format: OutputFormat, report: &mut ExportReport) {
        let source = match (format, self.prepared.rasterized) {
            (OutputFormat::Eps, false) => TYPESET_EPS,
            (OutputFormat::Pdf, false) => VECTOR_PDF,
            (OutputFormat::Eps, true) => OVERLAY_EPS,
            (OutputFormat::Pdf, true) => OVERLAY_PDF,
            (OutputFormat::Png | OutputFormat::Jpeg | OutputFormat::Tiff, _) => PIXELS_PNG,
        };
        let source = match self.intermediate(source) {
            Ok(path) => path,
            Err((stage, message)) => {
                report.warn(Some(format), stage, message);
                return;
            }
        };

        let target = self.options.output_path(format);
        let written = match format {
            OutputFormat::Jpeg => write_jpeg(&source, &target, self.options.jpeg_quality),
            OutputFormat::Tiff => write_tiff(&source, &target),
            _ => fs::copy(&source, &target).map(|_| ()).map_err(|e| e.to_string()),
        };
        match written {
            Ok(()) => {
                tracing::debug!(%format, path = %target.display(), "wrote output");
                report.written.push(target);
            }
            Err(message) => report.warn(Some(format), "write", message),
        }
    }
}

fn write_jpeg(source: &Path, target: &Path, quality: u8) -> std::result::Result<(), String> {
    let rgba = image::open(source).map_err(|e| e.to_string())?.to_rgba8();
    let (w, h) = rgba.dimensions();
    // JPEG has no alpha; flatten over white.
    let rgb = image::RgbImage::from_fn(w, h, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let over = |c: u8| ((u32::from(c) * u32::from(a) + 255 * (255 - u32::from(a)) + 127) / 255) as u8;
        image::Rgb([over(r), over(g), over(b)])
    });
    let file = fs::File::create(target).map_err(|e| e.to_string())?;
    let mut enc = image::codecs::jpeg::JpegEncoder::new_with_quality(BufWriter::new(file), quality);
    enc.encode(rgb.as_raw(), w, h, image::ExtendedColorType::Rgb8)
        .map_err(|e| e.to_string())
}

fn write_tiff(source: &Path, target: &Path) -> std::result::Result<(), String> {
    image::open(source)
        .map_err(|e| e.to_string())?
        .save_with_format(target, image::ImageFormat::Tiff)
        .map_err(|e| e.to_string())
}
