//! Text extraction and placeholder-tag substitution.
//!
//! Every non-blank text object is converted to a LaTeX markup string and its on-scene content is
//! replaced by a short literal tag (`tag_01`, `tag_02`, ...). The intermediate PostScript then
//! carries only tags, and `psfrag` swaps each tag for its typeset markup.

use crate::scene::{HAlign, Interpreter, ObjectId, ObjectKind, Scene, TextContent, TextObject, VAlign};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self { font_size: 10.0 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TextMetrics {
    pub width: f64,
}

pub trait TextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics;
}

/// Fixed per-character advance; good enough to size centering boxes for multi-line labels.
#[derive(Debug, Clone, Default)]
pub struct DeterministicTextMeasurer {
    pub char_width_factor: f64,
}

impl TextMeasurer for DeterministicTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let char_width_factor = if self.char_width_factor == 0.0 {
            0.6
        } else {
            self.char_width_factor
        };

        let font_size = style.font_size.max(1.0);
        let max_chars = text
            .split('\n')
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);

        TextMetrics {
            width: max_chars as f64 * font_size * char_width_factor,
        }
    }
}

/// One replaced text object: `psfrag` binds `tag` to `markup` with the given alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct TagSubstitution {
    pub object: ObjectId,
    pub tag: String,
    pub markup: String,
    pub halign: HAlign,
    pub valign: VAlign,
}

impl TagSubstitution {
    /// `psfrag` position letters, vertical then horizontal (e.g. `Bl`, `cc`).
    pub fn psfrag_position(&self) -> String {
        let v = match self.valign {
            VAlign::Top | VAlign::Cap => 't',
            VAlign::Middle => 'c',
            VAlign::Baseline => 'B',
            VAlign::Bottom => 'b',
        };
        let h = match self.halign {
            HAlign::Left => 'l',
            HAlign::Center => 'c',
            HAlign::Right => 'r',
        };
        format!("{v}{h}")
    }
}

/// LaTeX size switch for a font size in points.
pub fn size_command(points: f64) -> &'static str {
    const TABLE: [(f64, &str); 9] = [
        (20.75, "\\Huge"),
        (17.28, "\\huge"),
        (14.4, "\\LARGE"),
        (12.0, "\\Large"),
        (10.95, "\\large"),
        (10.0, "\\normalsize"),
        (9.0, "\\small"),
        (8.0, "\\footnotesize"),
        (7.5, "\\scriptsize"),
    ];
    TABLE
        .iter()
        .find(|(min, _)| points >= *min)
        .map(|(_, cmd)| *cmd)
        .unwrap_or("\\tiny")
}

/// Escapes LaTeX specials in literal text.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' | '}' | '$' | '&' | '#' | '%' | '_' => {
                out.push('\\');
                out.push(ch);
            }
            '^' => out.push_str("\\^{}"),
            '~' => out.push_str("\\~{}"),
            _ => out.push(ch),
        }
    }
    out
}

fn line_markup(line: &str, interpreter: Interpreter) -> String {
    match interpreter {
        Interpreter::None => escape_latex(line),
        Interpreter::Tex | Interpreter::Latex => line.to_string(),
    }
}

/// Converts a text object to the markup `psfrag` typesets in its place.
pub fn markup(text: &TextObject, measurer: &dyn TextMeasurer) -> String {
    let size = size_command(text.font_size);
    let lines = text.content.lines();
    if lines.len() <= 1 {
        let line = lines.first().copied().unwrap_or_default();
        return format!("{size} {}", line_markup(line, text.interpreter));
    }

    let style = TextStyle {
        font_size: text.font_size,
    };
    let width = lines
        .iter()
        .map(|l| measurer.measure(l, &style).width)
        .fold(0.0_f64, f64::max);
    let rows = lines
        .iter()
        .map(|l| {
            format!(
                "\\makebox[{width:.2}pt][c]{{{}}}",
                line_markup(l, text.interpreter)
            )
        })
        .collect::<Vec<_>>()
        .join("\\\\");
    format!("{size} \\shortstack{{{rows}}}")
}

/// Replaces every non-blank text object's content with a placeholder tag.
///
/// Returns the substitutions in tree pre-order. The caller is expected to hold a
/// [`SceneGuard`](crate::snapshot::SceneGuard) so the original content comes back.
pub fn substitute_text(scene: &mut Scene, measurer: &dyn TextMeasurer) -> Vec<TagSubstitution> {
    let targets: Vec<ObjectId> = scene
        .walk()
        .into_iter()
        .filter(|id| {
            scene
                .get(*id)
                .and_then(|o| o.as_text())
                .is_some_and(|t| !t.content.is_blank())
        })
        .collect();

    let digits = targets.len().to_string().len().max(2);
    let mut out = Vec::with_capacity(targets.len());
    for (i, id) in targets.into_iter().enumerate() {
        let Some(obj) = scene.get_mut(id) else {
            continue;
        };
        let ObjectKind::Text(text) = &mut obj.kind else {
            continue;
        };
        let tag = format!("tag_{:0digits$}", i + 1);
        let text_markup = markup(text, measurer);
        tracing::trace!(%tag, markup = %text_markup, "substituting text");

        text.content = TextContent::Single(tag.clone());
        text.interpreter = Interpreter::None;
        out.push(TagSubstitution {
            object: id,
            tag,
            markup: text_markup,
            halign: text.halign,
            valign: text.valign,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Axes;

    fn text(content: TextContent, font_size: f64) -> ObjectKind {
        ObjectKind::Text(TextObject {
            content,
            font_size,
            ..Default::default()
        })
    }

    #[test]
    fn size_table_buckets() {
        assert_eq!(size_command(24.0), "\\Huge");
        assert_eq!(size_command(20.75), "\\Huge");
        assert_eq!(size_command(20.7), "\\huge");
        assert_eq!(size_command(12.0), "\\Large");
        assert_eq!(size_command(11.0), "\\large");
        assert_eq!(size_command(10.0), "\\normalsize");
        assert_eq!(size_command(7.5), "\\scriptsize");
        assert_eq!(size_command(7.4), "\\tiny");
    }

    #[test]
    fn literal_text_is_escaped() {
        assert_eq!(escape_latex("50% of a_b"), "50\\% of a\\_b");
        assert_eq!(escape_latex("x^2~"), "x\\^{}2\\~{}");
    }

    #[test]
    fn multi_line_blocks_are_stacked_in_equal_boxes() {
        let t = TextObject {
            content: TextContent::Lines(vec!["ab".into(), "abcd".into()]),
            font_size: 10.0,
            ..Default::default()
        };
        let m = markup(&t, &DeterministicTextMeasurer::default());
        assert_eq!(
            m,
            "\\normalsize \\shortstack{\\makebox[24.00pt][c]{ab}\\\\\\makebox[24.00pt][c]{abcd}}"
        );

        let embedded = TextObject {
            content: TextContent::Single("one\ntwo".into()),
            ..t
        };
        assert!(markup(&embedded, &DeterministicTextMeasurer::default()).contains("\\shortstack"));
    }

    struct PerByte(f64);

    impl TextMeasurer for PerByte {
        fn measure(&self, text: &str, _style: &TextStyle) -> TextMetrics {
            TextMetrics {
                width: self.0 * text.len() as f64,
            }
        }
    }

    #[test]
    fn box_width_comes_from_the_measurer() {
        let t = TextObject {
            content: TextContent::Lines(vec!["a".into(), "abc".into()]),
            font_size: 10.0,
            ..Default::default()
        };
        let m = markup(&t, &PerByte(5.5));
        assert!(m.contains("\\makebox[16.50pt][c]{a}"), "{m}");
        assert!(m.contains("\\makebox[16.50pt][c]{abc}"), "{m}");
    }

    #[test]
    fn substitution_tags_non_blank_text_in_tree_order() {
        let mut scene = Scene::default();
        let ax = scene
            .add(None, None, ObjectKind::Axes(Axes::default()))
            .unwrap();
        let title = scene
            .add(Some(ax), None, text(TextContent::Single("Title".into()), 12.0))
            .unwrap();
        scene
            .add(Some(ax), None, text(TextContent::Single("   ".into()), 10.0))
            .unwrap();
        let note = scene
            .add(None, None, text(TextContent::Single("50%".into()), 8.0))
            .unwrap();
        if let Some(ObjectKind::Text(t)) = scene.get_mut(note).map(|o| &mut o.kind) {
            t.interpreter = Interpreter::None;
        }

        let subs = substitute_text(&mut scene, &DeterministicTextMeasurer::default());
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].object, title);
        assert_eq!(subs[0].tag, "tag_01");
        assert_eq!(subs[0].markup, "\\Large Title");
        assert_eq!(subs[1].tag, "tag_02");
        assert_eq!(subs[1].markup, "\\footnotesize 50\\%");

        let t = scene.get(title).unwrap().as_text().unwrap();
        assert_eq!(t.content, TextContent::Single("tag_01".into()));
        assert_eq!(t.interpreter, Interpreter::None);
    }

    #[test]
    fn tags_widen_past_99_objects() {
        let mut scene = Scene::default();
        for i in 0..120 {
            scene
                .add(None, None, text(TextContent::Single(format!("t{i}")), 10.0))
                .unwrap();
        }
        let subs = substitute_text(&mut scene, &DeterministicTextMeasurer::default());
        assert_eq!(subs[0].tag, "tag_001");
        assert_eq!(subs[119].tag, "tag_120");
    }

    #[test]
    fn psfrag_position_letters() {
        let s = TagSubstitution {
            object: ObjectId(0),
            tag: "tag_01".into(),
            markup: String::new(),
            halign: HAlign::Center,
            valign: VAlign::Baseline,
        };
        assert_eq!(s.psfrag_position(), "Bc");
    }
}
