use figtex::{
    CropRect, Error, ExportError, ExportOptions, Exporter, OutputFormat, RasterSelection, Renderer,
    Scene, resolve_output,
};
use std::io::Read;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Config(Error),
    Export(ExportError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Config(err) => write!(f, "error: {err}"),
            CliError::Export(err) => write!(f, "error: {err}"),
        }
    }
}

impl From<Error> for CliError {
    fn from(value: Error) -> Self {
        Self::Config(value)
    }
}

impl From<ExportError> for CliError {
    fn from(value: ExportError) -> Self {
        match value {
            ExportError::Config(err) => Self::Config(err),
            other => Self::Export(other),
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    output: Option<String>,
    scene: Option<String>,
    formats: Vec<OutputFormat>,
    quality: Option<i64>,
    resolution: Option<i64>,
    anti_alias: Option<i64>,
    loose: bool,
    transparent: bool,
    rasterize: Option<Vec<String>>,
    preamble: Vec<String>,
    crop: Option<CropRect>,
    renderer: Option<Renderer>,
}

fn usage() -> &'static str {
    "figtex\n\
\n\
USAGE:\n\
  figtex <output> [<scene.json>|-] [-pdf] [-eps] [-png] [-jpg] [-tiff] [-q<1-100>] [-r<ppi>] [-a<n>] [-nocrop|-loose] [-transparent] [-rasterize <name,name,..>] [-latexpackages <line>] [-crop <l,b,w,h>] [-renderer opengl|painters|zbuffer]\n\
\n\
NOTES:\n\
  - A known extension on <output> (.pdf .eps .png .jpg .tiff) selects that format and is stripped.\n\
  - If <scene.json> is omitted or '-', the scene is read from stdin.\n\
  - -latexpackages may be repeated; each line is added to the LaTeX preamble verbatim.\n\
  - Tools are taken from FIGTEX_LATEX, FIGTEX_PDFLATEX, FIGTEX_DVIPS, FIGTEX_PS2PDF, FIGTEX_PDFTOPS\n\
    and FIGTEX_GS when set; FIGTEX_TOOL_TIMEOUT_SECS bounds each run; FIGTEX_KEEP_TEMP keeps the\n\
    work directory.\n\
"
}

/// Integer value glued to a short flag (`-q90`), or a usage error.
fn glued_number(flag: &str, prefix: &str) -> Result<i64, CliError> {
    flag[prefix.len()..]
        .parse::<i64>()
        .map_err(|_| CliError::Usage(usage()))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "-pdf" => args.formats.push(OutputFormat::Pdf),
            "-eps" => args.formats.push(OutputFormat::Eps),
            "-png" => args.formats.push(OutputFormat::Png),
            "-jpg" | "-jpeg" => args.formats.push(OutputFormat::Jpeg),
            "-tif" | "-tiff" => args.formats.push(OutputFormat::Tiff),
            "-nocrop" | "-loose" => args.loose = true,
            "-transparent" => args.transparent = true,
            "-rasterize" => {
                let Some(names) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.rasterize = Some(
                    names
                        .split(',')
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string)
                        .collect(),
                );
            }
            "-latexpackages" => {
                let Some(line) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.preamble.push(line.clone());
            }
            "-crop" => {
                let Some(crop) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.crop = Some(crop.parse::<CropRect>()?);
            }
            "-renderer" => {
                let Some(renderer) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.renderer = Some(renderer.parse::<Renderer>()?);
            }
            q if q.starts_with("-q") => args.quality = Some(glued_number(q, "-q")?),
            r if r.starts_with("-r") => args.resolution = Some(glued_number(r, "-r")?),
            aa if aa.starts_with("-a") => args.anti_alias = Some(glued_number(aa, "-a")?),
            other if other.starts_with('-') && other.len() > 1 => {
                eprintln!("warning: ignoring unrecognized option {other}");
            }
            positional => {
                if args.output.is_none() {
                    args.output = Some(positional.to_string());
                } else if args.scene.is_none() {
                    args.scene = Some(positional.to_string());
                } else {
                    return Err(CliError::Usage(usage()));
                }
            }
        }
    }

    Ok(args)
}

/// Builds the export options from everything that does not need the scene.
fn build_options(args: &Args) -> Result<ExportOptions, CliError> {
    let Some(output) = args.output.as_deref() else {
        return Err(CliError::Usage(usage()));
    };
    let (basename, formats) = resolve_output(output, &args.formats)?;
    let mut options = ExportOptions {
        basename,
        formats,
        transparent: args.transparent,
        auto_crop: !args.loose,
        preamble: args.preamble.clone(),
        ..Default::default()
    };
    if let Some(crop) = args.crop {
        options.crop = crop;
    }
    if let Some(renderer) = args.renderer {
        options.renderer = renderer;
    }
    if let Some(q) = args.quality {
        options.jpeg_quality = u8::try_from(q)
            .ok()
            .filter(|q| (1..=100).contains(q))
            .ok_or(Error::InvalidQuality { value: q })?;
    }
    if let Some(r) = args.resolution {
        options.resolution = Some(
            u32::try_from(r)
                .ok()
                .filter(|r| *r > 0)
                .ok_or(Error::InvalidResolution { value: r })?,
        );
    }
    if let Some(a) = args.anti_alias {
        options.anti_alias = u32::try_from(a)
            .ok()
            .filter(|a| *a >= 1)
            .ok_or(Error::InvalidAntiAlias { value: a })?;
    }
    if args.rasterize.as_ref().is_some_and(|names| names.is_empty()) {
        return Err(Error::EmptyRasterSelection.into());
    }
    options.validate()?;
    Ok(options)
}

fn read_scene(input: Option<&str>) -> Result<Scene, CliError> {
    let text = match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|err| Error::SceneRead {
                    source_name: "stdin".to_string(),
                    message: err.to_string(),
                })?;
            buf
        }
        Some(path) => std::fs::read_to_string(path).map_err(|err| Error::SceneRead {
            source_name: path.to_string(),
            message: err.to_string(),
        })?,
    };
    if text.trim().is_empty() {
        return Err(Error::NoScene.into());
    }
    Ok(Scene::from_json(&text)?)
}

fn resolve_selection(scene: &Scene, names: &[String]) -> Result<RasterSelection, CliError> {
    names
        .iter()
        .map(|name| {
            scene
                .find(name)
                .ok_or_else(|| Error::UnknownObject { name: name.clone() }.into())
        })
        .collect()
}

/// Returns whether at least one output file was written.
fn run(args: Args) -> Result<bool, CliError> {
    let mut options = build_options(&args)?;
    let mut scene = read_scene(args.scene.as_deref())?;
    if let Some(names) = &args.rasterize {
        options.rasterize = Some(resolve_selection(&scene, names)?);
    }

    let report = Exporter::new().export(&mut scene, &options)?;
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    for path in &report.written {
        println!("{}", path.display());
    }
    Ok(report.produced_any())
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    match run(args) {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("error: no output file was produced");
            std::process::exit(1);
        }
        Err(err @ (CliError::Usage(_) | CliError::Config(_))) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
