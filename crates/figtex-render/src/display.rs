//! Flattens the visible part of a scene into canvas-space drawing primitives.

use crate::colormap;
use crate::projection::{Projection, canvas_rect, point_in, shade};
use figtex_core::geom::{Point, Point3, Rect};
use figtex_core::{
    Axes, Color, FaceFill, HAlign, Light, ObjectId, ObjectKind, Scene, Shape, ShapeKind,
    TextObject, VAlign,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    /// Pixels.
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub at: Point,
    pub text: String,
    /// Pixels.
    pub font_size: f64,
    pub halign: HAlign,
    pub valign: VAlign,
    pub rotation: f64,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Polygon {
        points: Vec<Point>,
        /// Color and opacity.
        fill: Option<(Color, f64)>,
        stroke: Option<Stroke>,
    },
    Polyline {
        points: Vec<Point>,
        stroke: Stroke,
    },
    Text(TextItem),
}

/// Canvas in screen pixels, top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayList {
    pub width: f64,
    pub height: f64,
    pub background: Option<Color>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderSettings {
    /// Draw translucent faces opaque (renderers without blending support).
    pub opaque_faces: bool,
}

struct Builder<'a> {
    scene: &'a Scene,
    settings: RenderSettings,
    lights: Vec<Light>,
    px_per_pt: f64,
    width: f64,
    height: f64,
    items: Vec<Item>,
}

pub fn build_display_list(scene: &Scene, settings: &RenderSettings) -> DisplayList {
    let size = scene.size_px();
    let lights = scene
        .objects()
        .filter(|(_, o)| o.visible)
        .filter_map(|(_, o)| match &o.kind {
            ObjectKind::Light(l) => Some(l.clone()),
            _ => None,
        })
        .collect();
    let mut b = Builder {
        scene,
        settings: *settings,
        lights,
        px_per_pt: scene.screen_ppi / 72.0,
        width: size.width,
        height: size.height,
        items: Vec::new(),
    };

    let figure_frame = euclid::rect(0.0, 0.0, size.width, size.height);
    let figure_projection = Projection::for_figure(figure_frame);
    let mut loose = Vec::new();
    for &id in scene.roots() {
        b.object(id, figure_frame, &figure_projection, &mut loose);
    }
    b.flush_sorted(&mut loose);

    let background = match scene.figure.color.color() {
        Some(_) if scene.figure.inverted_hardcopy => Some(Color::WHITE),
        other => other,
    };
    DisplayList {
        width: size.width,
        height: size.height,
        background,
        items: b.items,
    }
}

impl Builder<'_> {
    fn object(
        &mut self,
        id: ObjectId,
        frame: Rect,
        projection: &Projection,
        depth_sorted: &mut Vec<(f64, Item)>,
    ) {
        let scene = self.scene;
        let Some(obj) = scene.get(id) else {
            return;
        };
        match &obj.kind {
            ObjectKind::Axes(axes) => {
                self.flush_sorted(depth_sorted);
                self.axes(id, axes, obj.visible);
            }
            ObjectKind::Shape(shape) if obj.visible => {
                self.shape(shape, projection, depth_sorted);
            }
            ObjectKind::Text(text) if obj.visible => {
                self.flush_sorted(depth_sorted);
                self.text(text, frame);
            }
            ObjectKind::Shape(_) | ObjectKind::Text(_) | ObjectKind::Light(_) => {}
        }
    }

    fn flush_sorted(&mut self, pending: &mut Vec<(f64, Item)>) {
        pending.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.items.extend(pending.drain(..).map(|(_, item)| item));
    }

    fn axes(&mut self, id: ObjectId, axes: &Axes, visible: bool) {
        let frame = canvas_rect(axes.position, self.width, self.height);
        let corners = vec![
            frame.origin,
            euclid::point2(frame.max_x(), frame.min_y()),
            euclid::point2(frame.max_x(), frame.max_y()),
            euclid::point2(frame.min_x(), frame.max_y()),
        ];
        if visible {
            if let Some(bg) = axes.color.color() {
                self.items.push(Item::Polygon {
                    points: corners.clone(),
                    fill: Some((bg, 1.0)),
                    stroke: None,
                });
            }
        }

        let projection = Projection::for_axes(axes, frame);
        let children = self
            .scene
            .get(id)
            .map(|o| o.children.clone())
            .unwrap_or_default();
        let mut faces = Vec::new();
        for child in children {
            self.object(child, frame, &projection, &mut faces);
        }
        self.flush_sorted(&mut faces);

        if visible && axes.frame {
            self.items.push(Item::Polygon {
                points: corners,
                fill: None,
                stroke: Some(Stroke {
                    color: axes.line_color,
                    width: 0.5 * self.px_per_pt,
                }),
            });
        }
    }

    fn edge(&self, shape: &Shape) -> Option<Stroke> {
        shape.edge.color().map(|color| Stroke {
            color,
            width: shape.line_width * self.px_per_pt,
        })
    }

    fn face_alpha(&self, shape: &Shape) -> f64 {
        if self.settings.opaque_faces {
            1.0
        } else {
            shape.face_alpha
        }
    }

    fn shape(&mut self, shape: &Shape, projection: &Projection, out: &mut Vec<(f64, Item)>) {
        let project_all = |pts: &[Point3]| -> (Vec<Point>, f64) {
            let mut depth = 0.0;
            let points = pts
                .iter()
                .map(|p| {
                    let (c, d) = projection.project(*p);
                    depth += d;
                    c
                })
                .collect();
            (points, depth / pts.len().max(1) as f64)
        };

        match &shape.kind {
            ShapeKind::Line { points } => {
                let Some(stroke) = self.edge(shape) else {
                    return;
                };
                if points.len() < 2 {
                    return;
                }
                let (points, depth) = project_all(points);
                out.push((depth, Item::Polyline { points, stroke }));
            }
            ShapeKind::Patch { vertices } => {
                if vertices.len() < 3 {
                    return;
                }
                let centroid_z = vertices.iter().map(|v| v.z).sum::<f64>() / vertices.len() as f64;
                let t = projection.normalize(figtex_core::geom::point3(0.0, 0.0, centroid_z))[2] + 0.5;
                let fill = face_color(shape.face, t).map(|c| (c, self.face_alpha(shape)));
                let (points, depth) = project_all(vertices);
                out.push((
                    depth,
                    Item::Polygon {
                        points,
                        fill,
                        stroke: self.edge(shape),
                    },
                ));
            }
            ShapeKind::Surface { x, y, z } => {
                let (zmin, zmax) = z
                    .iter()
                    .flatten()
                    .filter(|v| v.is_finite())
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                        (lo.min(*v), hi.max(*v))
                    });
                let zspan = if zmax > zmin { zmax - zmin } else { 1.0 };
                let at = |row: usize, col: usize| -> Option<Point3> {
                    let v = *z.get(row)?.get(col)?;
                    if !v.is_finite() {
                        return None;
                    }
                    Some(figtex_core::geom::point3(*x.get(col)?, *y.get(row)?, v))
                };
                let alpha = self.face_alpha(shape);
                let stroke = self.edge(shape);
                for row in 0..y.len().saturating_sub(1) {
                    for col in 0..x.len().saturating_sub(1) {
                        let (Some(a), Some(b), Some(c), Some(d)) = (
                            at(row, col),
                            at(row, col + 1),
                            at(row + 1, col + 1),
                            at(row + 1, col),
                        ) else {
                            continue;
                        };
                        let corners = [a, b, c, d];
                        let mean_z = (a.z + b.z + c.z + d.z) / 4.0;
                        let k = shade(projection, &corners, &self.lights);
                        let fill = face_color(shape.face, (mean_z - zmin) / zspan)
                            .map(|color| (color.scaled(k), alpha));
                        let (points, depth) = project_all(&corners);
                        out.push((depth, Item::Polygon { points, fill, stroke }));
                    }
                }
            }
        }
    }

    fn text(&mut self, text: &TextObject, frame: Rect) {
        let content = text.content.lines().join("\n");
        if content.trim().is_empty() {
            return;
        }
        self.items.push(Item::Text(TextItem {
            at: point_in(frame, text.position),
            text: content,
            font_size: text.font_size * self.px_per_pt,
            halign: text.halign,
            valign: text.valign,
            rotation: text.rotation,
            color: text.color,
        }));
    }
}

fn face_color(face: FaceFill, t: f64) -> Option<Color> {
    match face {
        FaceFill::None => None,
        FaceFill::Solid(c) => Some(c),
        FaceFill::Colormap => Some(colormap::sample(t)),
    }
}

impl DisplayList {
    /// Canvas-space bounds of everything drawn, ignoring the background.
    pub fn content_bounds(&self) -> Option<Rect> {
        let mut pts: Vec<Point> = Vec::new();
        for item in &self.items {
            match item {
                Item::Polygon { points, .. } | Item::Polyline { points, .. } => {
                    pts.extend(points.iter().copied())
                }
                Item::Text(t) => {
                    let lines = t.text.lines().count().max(1) as f64;
                    let chars = t.text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
                    let w = chars as f64 * t.font_size * 0.6;
                    let h = lines * t.font_size * 1.2;
                    let r = w.max(h);
                    pts.push(euclid::point2(t.at.x - r, t.at.y - r));
                    pts.push(euclid::point2(t.at.x + r, t.at.y + r));
                }
            }
        }
        if pts.is_empty() {
            return None;
        }
        Some(euclid::Box2D::from_points(pts).to_rect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figtex_core::{Fill, TextContent};

    fn surface_scene() -> Scene {
        let mut scene = Scene::default();
        let ax = scene
            .add(None, None, ObjectKind::Axes(Axes::default()))
            .unwrap();
        scene
            .add(
                Some(ax),
                Some("s"),
                ObjectKind::Shape(Shape {
                    kind: ShapeKind::Surface {
                        x: vec![0.0, 0.5, 1.0],
                        y: vec![0.0, 1.0],
                        z: vec![vec![0.0, 0.5, 0.0], vec![0.5, 1.0, 0.5]],
                    },
                    face: FaceFill::Colormap,
                    face_alpha: 0.5,
                    edge: Fill::None,
                    line_width: 0.5,
                }),
            )
            .unwrap();
        scene
            .add(
                Some(ax),
                None,
                ObjectKind::Text(TextObject {
                    content: TextContent::Single("Title".into()),
                    ..Default::default()
                }),
            )
            .unwrap();
        scene
    }

    #[test]
    fn axes_draw_background_faces_frame_and_text() {
        let scene = surface_scene();
        let list = build_display_list(&scene, &RenderSettings::default());
        assert_eq!(list.items.len(), 1 + 2 + 1 + 1);
        assert!(matches!(list.items[0], Item::Polygon { fill: Some((Color::WHITE, _)), .. }));
        assert!(matches!(list.items[1], Item::Polygon { fill: Some((_, a)), .. } if a == 0.5));
        assert!(matches!(&list.items[3], Item::Text(t) if t.text == "Title"));
        assert!(matches!(list.items[4], Item::Polygon { fill: None, stroke: Some(_), .. }));
    }

    #[test]
    fn hidden_axes_still_draw_children() {
        let mut scene = surface_scene();
        let ax = scene.roots()[0];
        scene.get_mut(ax).unwrap().visible = false;
        let list = build_display_list(&scene, &RenderSettings { opaque_faces: true });
        assert_eq!(list.items.len(), 3);
        assert!(matches!(list.items[0], Item::Polygon { fill: Some((_, a)), .. } if a == 1.0));
    }

    #[test]
    fn inverted_hardcopy_prints_white() {
        let mut scene = Scene::default();
        scene.figure.color = Fill::Color(Color::rgb(10, 20, 30));
        scene.figure.inverted_hardcopy = true;
        assert_eq!(
            build_display_list(&scene, &RenderSettings::default()).background,
            Some(Color::WHITE)
        );
        scene.figure.inverted_hardcopy = false;
        assert_eq!(
            build_display_list(&scene, &RenderSettings::default()).background,
            Some(Color::rgb(10, 20, 30))
        );
    }
}
