#![forbid(unsafe_code)]

//! `figtex` exports figure scenes to print-quality PDF, EPS, PNG, JPEG and TIFF files with all
//! text typeset by LaTeX.
//!
//! The scene is drawn to an intermediate EPS in which every text object has been replaced by a
//! placeholder tag; `latex` + `psfrag` swap the tags for typeset markup, and the usual
//! PostScript/PDF tools convert the result. Selected objects can instead be rendered as a
//! pixel layer with a real alpha channel that sits beneath the vector layer.
//!
//! External programs: `latex`, `pdflatex`, `dvips`, `ps2pdf`, `pdftops` and Ghostscript (`gs`),
//! see [`tools::Toolchain`].

pub use figtex_core::*;
pub use figtex_render as render;

pub mod latex;
pub mod pipeline;
pub mod tools;

pub use pipeline::{ExportReport, ExportWarning, Exporter};
pub use tools::{Invocation, ProcessOutput, ProcessRunner, SystemRunner, Toolchain};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Config(#[from] figtex_core::Error),
    #[error(transparent)]
    Render(#[from] figtex_render::Error),
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} failed: {message}{}", log_suffix(.log))]
    Typeset {
        stage: &'static str,
        message: String,
        log: String,
    },
}

pub type Result<T> = std::result::Result<T, ExportError>;

fn log_suffix(log: &str) -> String {
    if log.is_empty() {
        String::new()
    } else {
        format!("\n{log}")
    }
}
