//! SVG serialization of a display list, the input of the resvg pixel renderer.

use crate::display::{DisplayList, Item, Stroke, TextItem};
use figtex_core::geom::Point;
use figtex_core::{HAlign, VAlign};
use std::fmt::Write as _;

pub(crate) fn escape_xml_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{:.3},{:.3}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn stroke_attrs(stroke: Option<Stroke>) -> String {
    match stroke {
        Some(s) => format!(
            r#" stroke="{}" stroke-width="{:.3}" stroke-linejoin="round""#,
            s.color.to_hex(),
            s.width
        ),
        None => r#" stroke="none""#.to_string(),
    }
}

fn text_element(out: &mut String, t: &TextItem) {
    let anchor = match t.halign {
        HAlign::Left => "start",
        HAlign::Center => "middle",
        HAlign::Right => "end",
    };
    let baseline = match t.valign {
        VAlign::Top | VAlign::Cap => "hanging",
        VAlign::Middle => "central",
        VAlign::Baseline => "alphabetic",
        VAlign::Bottom => "text-after-edge",
    };
    let lines: Vec<&str> = t.text.lines().collect();
    let n = lines.len().max(1) as f64;
    let _ = write!(
        out,
        r#"<text x="{x:.3}" y="{y:.3}" fill="{fill}" font-family="Arial" font-size="{size:.3}" text-anchor="{anchor}" dominant-baseline="{baseline}" transform="rotate({rot:.3} {x:.3} {y:.3})">"#,
        x = t.at.x,
        y = t.at.y,
        fill = t.color.to_hex(),
        size = t.font_size,
        rot = -t.rotation,
    );
    for (idx, line) in lines.iter().enumerate() {
        let dy = (idx as f64) * t.font_size * 1.2 - (t.font_size * 1.2 * (n - 1.0)) / 2.0;
        let _ = write!(
            out,
            r#"<tspan x="{:.3}" y="{:.3}">{}</tspan>"#,
            t.at.x,
            t.at.y + dy,
            escape_xml_text(line)
        );
    }
    out.push_str("</text>");
}

/// Serializes `list` without its background; the pixel renderer fills the pixmap instead.
pub fn to_svg(list: &DisplayList) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.3}" height="{h:.3}" viewBox="0 0 {w:.3} {h:.3}">"#,
        w = list.width,
        h = list.height
    );
    for item in &list.items {
        match item {
            Item::Polygon {
                points,
                fill,
                stroke,
            } => {
                let fill_attrs = match fill {
                    Some((color, alpha)) => format!(
                        r#"fill="{}" fill-opacity="{:.4}""#,
                        color.to_hex(),
                        alpha
                    ),
                    None => r#"fill="none""#.to_string(),
                };
                let _ = write!(
                    out,
                    r#"<polygon points="{}" {}{}/>"#,
                    points_attr(points),
                    fill_attrs,
                    stroke_attrs(*stroke)
                );
            }
            Item::Polyline { points, stroke } => {
                let _ = write!(
                    out,
                    r#"<polyline points="{}" fill="none"{}/>"#,
                    points_attr(points),
                    stroke_attrs(Some(*stroke))
                );
            }
            Item::Text(t) => text_element(&mut out, t),
        }
    }
    out.push_str("</svg>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use figtex_core::Color;

    #[test]
    fn serializes_items_in_order() {
        let list = DisplayList {
            width: 10.0,
            height: 10.0,
            background: None,
            items: vec![
                Item::Polygon {
                    points: vec![euclid::point2(0.0, 0.0), euclid::point2(5.0, 0.0), euclid::point2(5.0, 5.0)],
                    fill: Some((Color::rgb(255, 0, 0), 0.5)),
                    stroke: None,
                },
                Item::Text(TextItem {
                    at: euclid::point2(1.0, 2.0),
                    text: "a<b".into(),
                    font_size: 12.0,
                    halign: HAlign::Center,
                    valign: VAlign::Middle,
                    rotation: 90.0,
                    color: Color::BLACK,
                }),
            ],
        };
        let svg = to_svg(&list);
        let poly = svg.find("<polygon").unwrap();
        let text = svg.find("<text").unwrap();
        assert!(poly < text);
        assert!(svg.contains(r##"fill="#ff0000" fill-opacity="0.5000""##));
        assert!(svg.contains("a&lt;b"));
        assert!(svg.contains("rotate(-90.000"));
    }
}
