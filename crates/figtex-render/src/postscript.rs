//! Encapsulated PostScript writer.
//!
//! The document is line oriented on purpose: the figure background is always written as
//! `r g b rgb`, then `0 0 W H re`, then `fill`, each on its own line, so
//! [`strip_background`] can blank it without a PostScript parser. Text is written with the
//! core Helvetica font; LaTeX/`psfrag` later swaps every tag for typeset markup, taking over
//! the position, alignment and rotation of the `show`.

use crate::display::{DisplayList, Item, Stroke, TextItem};
use figtex_core::geom::{Point, Rect};
use figtex_core::{Color, HAlign, VAlign};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsOptions {
    /// Bounding box around drawn content instead of the full canvas.
    pub tight_bbox: bool,
    /// Points per canvas pixel.
    pub pt_per_px: f64,
}

impl Default for EpsOptions {
    fn default() -> Self {
        Self {
            tight_bbox: true,
            pt_per_px: 72.0 / figtex_core::scene::DEFAULT_SCREEN_PPI,
        }
    }
}

const PROLOG: &str = "\
/m { moveto } bind def
/l { lineto } bind def
/cp { closepath } bind def
/rgb { setrgbcolor } bind def
/lw { setlinewidth } bind def
/re { 4 2 roll moveto 1 index 0 rlineto 0 exch rlineto neg 0 rlineto closepath } bind def
";

struct Writer {
    out: String,
    scale: f64,
    height_px: f64,
}

impl Writer {
    fn pt(&self, p: Point) -> (f64, f64) {
        (p.x * self.scale, (self.height_px - p.y) * self.scale)
    }

    fn color(&mut self, c: Color) {
        let [r, g, b] = c.unit();
        let _ = writeln!(self.out, "{r:.4} {g:.4} {b:.4} rgb");
    }

    fn path(&mut self, points: &[Point], close: bool) {
        self.out.push_str("newpath\n");
        for (i, p) in points.iter().enumerate() {
            let (x, y) = self.pt(*p);
            let op = if i == 0 { "m" } else { "l" };
            let _ = writeln!(self.out, "{x:.3} {y:.3} {op}");
        }
        if close {
            self.out.push_str("cp\n");
        }
    }

    fn stroke(&mut self, stroke: Stroke) {
        self.color(stroke.color);
        let _ = writeln!(self.out, "{:.3} lw", stroke.width * self.scale);
        self.out.push_str("stroke\n");
    }

    fn item(&mut self, item: &Item) {
        match item {
            Item::Polygon {
                points,
                fill,
                stroke,
            } => {
                self.path(points, true);
                // Level 2 PostScript has no opacity; translucent faces print opaque.
                if let Some((color, _)) = fill {
                    self.color(*color);
                    if stroke.is_some() {
                        self.out.push_str("gsave fill grestore\n");
                    } else {
                        self.out.push_str("fill\n");
                    }
                }
                if let Some(s) = stroke {
                    self.stroke(*s);
                }
            }
            Item::Polyline { points, stroke } => {
                self.path(points, false);
                self.stroke(*stroke);
            }
            Item::Text(t) => self.text(t),
        }
    }

    fn text(&mut self, t: &TextItem) {
        let size = t.font_size * self.scale;
        let ha = match t.halign {
            HAlign::Left => 0.0,
            HAlign::Center => 0.5,
            HAlign::Right => 1.0,
        };
        let baseline = match t.valign {
            VAlign::Top => 0.75,
            VAlign::Cap => 0.72,
            VAlign::Middle => 0.36,
            VAlign::Baseline => 0.0,
            VAlign::Bottom => -0.22,
        };
        let lines: Vec<&str> = t.text.lines().collect();
        let n = lines.len();
        let (x, y) = self.pt(t.at);
        self.color(t.color);
        for (i, line) in lines.iter().enumerate() {
            let shift = ((n as f64 - 1.0) / 2.0 - i as f64) * size * 1.2;
            let _ = writeln!(
                self.out,
                "gsave {x:.3} {y:.3} translate {rot:.3} rotate /Helvetica findfont {size:.3} scalefont setfont ({text}) dup stringwidth pop {ha} mul neg {dy:.3} moveto show grestore",
                rot = t.rotation,
                text = escape_ps_string(line),
                dy = shift - baseline * size,
            );
        }
    }
}

fn escape_ps_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            _ if ch.is_ascii() && !ch.is_ascii_control() => out.push(ch),
            _ => out.push('?'),
        }
    }
    out
}

/// Bounding box in points, `[llx, lly, urx, ury]`.
fn bounding_box(list: &DisplayList, options: &EpsOptions) -> [f64; 4] {
    let s = options.pt_per_px;
    let canvas: Rect = euclid::rect(0.0, 0.0, list.width, list.height);
    let area = if options.tight_bbox {
        list.content_bounds()
            .and_then(|b| b.intersection(&canvas))
            .unwrap_or(canvas)
    } else {
        canvas
    };
    [
        area.min_x() * s,
        (list.height - area.max_y()) * s,
        area.max_x() * s,
        (list.height - area.min_y()) * s,
    ]
}

/// Writes `list` as a single-page EPS document.
pub fn write_eps(list: &DisplayList, options: &EpsOptions) -> String {
    let s = options.pt_per_px;
    let (w_pt, h_pt) = (list.width * s, list.height * s);
    let [llx, lly, urx, ury] = bounding_box(list, options);

    let mut w = Writer {
        out: String::new(),
        scale: s,
        height_px: list.height,
    };
    w.out.push_str("%!PS-Adobe-3.0 EPSF-3.0\n%%Creator: figtex\n");
    let _ = writeln!(
        w.out,
        "%%BoundingBox: {} {} {} {}",
        llx.floor(),
        lly.floor(),
        urx.ceil(),
        ury.ceil()
    );
    let _ = writeln!(
        w.out,
        "%%HiResBoundingBox: {llx:.3} {lly:.3} {urx:.3} {ury:.3}"
    );
    let _ = writeln!(w.out, "%%DocumentMedia: canvas {w_pt:.2} {h_pt:.2} 0 () ()");
    w.out
        .push_str("%%LanguageLevel: 2\n%%Pages: 1\n%%EndComments\n%%BeginProlog\n");
    w.out.push_str(PROLOG);
    w.out.push_str("%%EndProlog\n%%Page: 1 1\ngsave\n1 setlinejoin 1 setlinecap\n");

    if let Some(bg) = list.background {
        w.color(bg);
        let _ = writeln!(w.out, "0 0 {w_pt:.2} {h_pt:.2} re");
        w.out.push_str("fill\n");
    }
    for item in &list.items {
        w.item(item);
    }
    w.out.push_str("grestore\nshowpage\n%%EOF\n");
    w.out
}

fn media_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^%%DocumentMedia: canvas ([0-9.]+) ([0-9.]+)")
            .expect("media regex must compile")
    })
}

fn rect_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^0 0 ([0-9.]+) ([0-9.]+) re\r?\n\s*fill\b")
            .expect("background regex must compile")
    })
}

/// Blanks the canvas background rectangle of an EPS document written by [`write_eps`].
///
/// Only a rectangle covering the whole canvas (within 0.01 pt) and directly followed by a `fill`
/// line qualifies; the line is overwritten with spaces so byte offsets are kept. Documents
/// without such a line are returned unchanged.
pub fn strip_background(eps: &str) -> String {
    let Some(media) = media_re().captures(eps) else {
        tracing::debug!("no canvas media line; background left in place");
        return eps.to_string();
    };
    let canvas: Option<(f64, f64)> = media[1].parse().ok().zip(media[2].parse().ok());
    let Some((cw, ch)) = canvas else {
        return eps.to_string();
    };

    let found = rect_re().captures_iter(eps).find(|caps| {
        let w: Option<f64> = caps[1].parse().ok();
        let h: Option<f64> = caps[2].parse().ok();
        matches!((w, h), (Some(w), Some(h)) if (w - cw).abs() <= 0.01 && (h - ch).abs() <= 0.01)
    });
    let Some(caps) = found else {
        tracing::debug!("no canvas background rectangle found");
        return eps.to_string();
    };
    let whole = caps.get(0).map(|m| m.start()).unwrap_or(0);
    let line_end = eps[whole..].find('\n').map_or(eps.len(), |i| whole + i);

    let mut out = String::with_capacity(eps.len());
    out.push_str(&eps[..whole]);
    out.extend(std::iter::repeat_n(' ', line_end - whole));
    out.push_str(&eps[line_end..]);
    out
}
