//! Generated LaTeX sources.
//!
//! Both documents reference their inputs by bare file name and are compiled with the work
//! directory as the current directory.

use figtex_core::{Color, TagSubstitution};
use std::fmt::Write as _;

/// Zero margins so the included figure sits at the top-left page corner.
const PAGE_SETUP: &str = "\
\\pagestyle{empty}
\\setlength{\\hoffset}{-1in}
\\setlength{\\voffset}{-1in}
\\setlength{\\oddsidemargin}{0pt}
\\setlength{\\evensidemargin}{0pt}
\\setlength{\\topmargin}{0pt}
\\setlength{\\headheight}{0pt}
\\setlength{\\headsep}{0pt}
\\setlength{\\topskip}{0pt}
\\setlength{\\parindent}{0pt}
";

/// Source for the `latex` pass that swaps every tag in `eps_name` for its typeset markup.
pub fn tag_document(subs: &[TagSubstitution], preamble: &[String], eps_name: &str) -> String {
    let mut out = String::from("\\documentclass{article}\n\\usepackage{graphicx,psfrag,color}\n");
    for line in preamble {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("\\newsavebox{\\figbox}\n");
    out.push_str(PAGE_SETUP);
    out.push_str("\\begin{document}\n");
    for sub in subs {
        let pos = sub.psfrag_position();
        let _ = writeln!(out, "\\psfrag{{{}}}[{pos}][{pos}]{{{}}}", sub.tag, sub.markup);
    }
    let _ = writeln!(out, "\\savebox{{\\figbox}}{{\\includegraphics{{{eps_name}}}}}");
    out.push_str("\\special{papersize=\\the\\wd\\figbox,\\the\\ht\\figbox}\n");
    out.push_str("\\noindent\\usebox{\\figbox}\n\\end{document}\n");
    out
}

/// Source for the `pdflatex` pass that stacks the raster layer beneath the vector layer.
///
/// The page takes the size of `vector_pdf`; `background` (when given) is painted first.
pub fn overlay_document(
    vector_pdf: &str,
    raster_png: &str,
    background: Option<Color>,
    preamble: &[String],
) -> String {
    let mut out = String::from("\\documentclass{article}\n\\usepackage{graphicx,color}\n");
    for line in preamble {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("\\newsavebox{\\figbox}\n");
    out.push_str(PAGE_SETUP);
    out.push_str("\\begin{document}\n");
    let _ = writeln!(out, "\\savebox{{\\figbox}}{{\\includegraphics{{{vector_pdf}}}}}");
    out.push_str("\\pdfpagewidth=\\wd\\figbox\n\\pdfpageheight=\\ht\\figbox\n");
    out.push_str("\\noindent\\raisebox{0pt}[\\ht\\figbox][0pt]{\\begin{picture}(0,0)\n");
    if let Some(bg) = background {
        let [r, g, b] = bg.unit();
        let _ = writeln!(
            out,
            "\\put(0,0){{\\color[rgb]{{{r:.4},{g:.4},{b:.4}}}\\rule{{\\wd\\figbox}}{{\\ht\\figbox}}}}"
        );
    }
    let _ = writeln!(
        out,
        "\\put(0,0){{\\includegraphics[width=\\wd\\figbox,height=\\ht\\figbox]{{{raster_png}}}}}"
    );
    out.push_str("\\put(0,0){\\usebox{\\figbox}}\n\\end{picture}}\n\\end{document}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use figtex_core::{HAlign, ObjectKind, Scene, VAlign};

    fn sub(tag: &str, markup: &str) -> TagSubstitution {
        let mut scene = Scene::default();
        TagSubstitution {
            object: scene
                .add(None, None, ObjectKind::Text(Default::default()))
                .unwrap(),
            tag: tag.into(),
            markup: markup.into(),
            halign: HAlign::Center,
            valign: VAlign::Bottom,
        }
    }

    #[test]
    fn tag_document_declares_replacements_before_the_figure() {
        let doc = tag_document(
            &[sub("tag_01", "\\Large Title"), sub("tag_02", "\\small $x^2$")],
            &["\\usepackage{amsmath}".to_string()],
            "figure.eps",
        );
        assert!(doc.starts_with("\\documentclass{article}\n\\usepackage{graphicx,psfrag,color}\n\\usepackage{amsmath}\n"));
        let first = doc.find("\\psfrag{tag_01}[bc][bc]{\\Large Title}").unwrap();
        let second = doc.find("\\psfrag{tag_02}[bc][bc]{\\small $x^2$}").unwrap();
        let figure = doc.find("\\includegraphics{figure.eps}").unwrap();
        assert!(first < second && second < figure);
        assert_eq!(doc.matches("\\includegraphics").count(), 1);
        assert!(doc.contains("\\special{papersize=\\the\\wd\\figbox,\\the\\ht\\figbox}"));
    }

    #[test]
    fn overlay_puts_raster_beneath_vector() {
        let doc = overlay_document("vector.pdf", "raster.png", Some(Color::rgb(255, 0, 0)), &[]);
        let bg = doc.find("\\color[rgb]{1.0000,0.0000,0.0000}").unwrap();
        let raster = doc.find("{raster.png}").unwrap();
        let vector = doc.find("\\put(0,0){\\usebox{\\figbox}}").unwrap();
        assert!(bg < raster && raster < vector);

        let transparent = overlay_document("vector.pdf", "raster.png", None, &[]);
        assert!(!transparent.contains("\\rule"));
    }
}
