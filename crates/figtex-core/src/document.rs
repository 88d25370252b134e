//! JSON scene documents.
//!
//! ```json
//! {
//!   "figure": { "position": [0, 0, 560, 420], "color": "white" },
//!   "children": [
//!     { "type": "axes", "name": "ax", "view": [-37.5, 30], "children": [
//!       { "type": "surface", "name": "peaks", "x": [0, 1], "y": [0, 1], "z": [[0, 1], [1, 0]] },
//!       { "type": "text", "content": "Title", "font_size": 12, "position": [0.5, 1.02] }
//!     ] }
//!   ]
//! }
//! ```

use crate::color::{Color, Fill};
use crate::error::Result;
use crate::geom::{point, point3, rect, size};
use crate::scene::{
    Axes, FaceFill, Figure, HAlign, Interpreter, Light, ObjectId, ObjectKind, PaperPositionMode,
    Scene, Shape, ShapeKind, TextContent, TextObject, Units, VAlign,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub figure: FigureDocument,
    #[serde(default)]
    pub screen_ppi: Option<f64>,
    #[serde(default)]
    pub children: Vec<ObjectDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FigureDocument {
    pub position: [f64; 4],
    pub units: Units,
    pub color: Fill,
    pub paper_position_mode: PaperPositionMode,
    pub paper_size: [f64; 2],
    pub inverted_hardcopy: bool,
}

impl Default for FigureDocument {
    fn default() -> Self {
        let f = Figure::default();
        Self {
            position: [
                f.position.origin.x,
                f.position.origin.y,
                f.position.size.width,
                f.position.size.height,
            ],
            units: f.units,
            color: f.color,
            paper_position_mode: f.paper_position_mode,
            paper_size: [f.paper_size.width, f.paper_size.height],
            inverted_hardcopy: f.inverted_hardcopy,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectDocument {
    Text {
        #[serde(flatten)]
        common: CommonDocument,
        content: TextContent,
        #[serde(default = "default_font_size")]
        font_size: f64,
        #[serde(default)]
        halign: HAlign,
        #[serde(default)]
        valign: VAlign,
        #[serde(default)]
        interpreter: Interpreter,
        #[serde(default)]
        position: [f64; 2],
        #[serde(default)]
        rotation: f64,
        #[serde(default = "default_text_color")]
        color: Color,
    },
    Line {
        #[serde(flatten)]
        common: CommonDocument,
        points: Vec<[f64; 3]>,
        #[serde(default = "default_edge")]
        color: Fill,
        #[serde(default = "default_line_width")]
        line_width: f64,
    },
    Patch {
        #[serde(flatten)]
        common: CommonDocument,
        vertices: Vec<[f64; 3]>,
        #[serde(flatten)]
        style: FaceStyle,
    },
    Surface {
        #[serde(flatten)]
        common: CommonDocument,
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<Vec<f64>>,
        #[serde(flatten)]
        style: FaceStyle,
    },
    Light {
        #[serde(flatten)]
        common: CommonDocument,
        #[serde(default = "default_light_direction")]
        direction: [f64; 3],
        #[serde(default = "default_light_color")]
        color: Color,
    },
    Axes {
        #[serde(flatten)]
        common: CommonDocument,
        #[serde(default)]
        position: Option<[f64; 4]>,
        #[serde(default)]
        color: Option<Fill>,
        #[serde(default)]
        xlim: Option<[f64; 2]>,
        #[serde(default)]
        ylim: Option<[f64; 2]>,
        #[serde(default)]
        zlim: Option<[f64; 2]>,
        #[serde(default)]
        view: Option<[f64; 2]>,
        #[serde(default = "default_true")]
        frame: bool,
        #[serde(default)]
        children: Vec<ObjectDocument>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommonDocument {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaceStyle {
    /// `"colormap"`, `"none"` or a color.
    #[serde(default)]
    pub face: Option<String>,
    #[serde(default = "default_alpha")]
    pub face_alpha: f64,
    #[serde(default = "default_edge")]
    pub edge: Fill,
    #[serde(default = "default_line_width")]
    pub line_width: f64,
}

impl FaceStyle {
    fn face_fill(&self) -> Result<FaceFill> {
        Ok(match self.face.as_deref().map(str::trim) {
            None | Some("colormap") | Some("interp") | Some("flat") => FaceFill::Colormap,
            Some(other) => match other.parse::<Fill>()? {
                Fill::None => FaceFill::None,
                Fill::Color(c) => FaceFill::Solid(c),
            },
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_font_size() -> f64 {
    10.0
}

fn default_text_color() -> Color {
    Color::BLACK
}

fn default_edge() -> Fill {
    Fill::Color(Color::BLACK)
}

fn default_line_width() -> f64 {
    0.5
}

fn default_alpha() -> f64 {
    1.0
}

fn default_light_direction() -> [f64; 3] {
    [1.0, 0.0, 1.0]
}

fn default_light_color() -> Color {
    Color::WHITE
}

impl SceneDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn into_scene(self) -> Result<Scene> {
        let f = &self.figure;
        let mut scene = Scene::new(Figure {
            position: rect(f.position),
            units: f.units,
            color: f.color,
            paper_position_mode: f.paper_position_mode,
            paper_size: size(f.paper_size[0], f.paper_size[1]),
            inverted_hardcopy: f.inverted_hardcopy,
        });
        if let Some(ppi) = self.screen_ppi.filter(|p| p.is_finite() && *p > 0.0) {
            scene.screen_ppi = ppi;
        }
        for child in self.children {
            add_object(&mut scene, None, child)?;
        }
        Ok(scene)
    }
}

fn add_object(scene: &mut Scene, parent: Option<ObjectId>, doc: ObjectDocument) -> Result<()> {
    let (common, kind, children) = match doc {
        ObjectDocument::Text {
            common,
            content,
            font_size,
            halign,
            valign,
            interpreter,
            position,
            rotation,
            color,
        } => (
            common,
            ObjectKind::Text(TextObject {
                content,
                font_size,
                halign,
                valign,
                interpreter,
                position: point(position[0], position[1]),
                rotation,
                color,
            }),
            Vec::new(),
        ),
        ObjectDocument::Line {
            common,
            points,
            color,
            line_width,
        } => (
            common,
            ObjectKind::Shape(Shape {
                kind: ShapeKind::Line {
                    points: points.iter().map(|p| point3(p[0], p[1], p[2])).collect(),
                },
                face: FaceFill::None,
                face_alpha: 1.0,
                edge: color,
                line_width,
            }),
            Vec::new(),
        ),
        ObjectDocument::Patch {
            common,
            vertices,
            style,
        } => (
            common,
            ObjectKind::Shape(Shape {
                kind: ShapeKind::Patch {
                    vertices: vertices.iter().map(|p| point3(p[0], p[1], p[2])).collect(),
                },
                face: style.face_fill()?,
                face_alpha: style.face_alpha.clamp(0.0, 1.0),
                edge: style.edge,
                line_width: style.line_width,
            }),
            Vec::new(),
        ),
        ObjectDocument::Surface {
            common,
            x,
            y,
            z,
            style,
        } => (
            common,
            ObjectKind::Shape(Shape {
                kind: ShapeKind::Surface { x, y, z },
                face: style.face_fill()?,
                face_alpha: style.face_alpha.clamp(0.0, 1.0),
                edge: style.edge,
                line_width: style.line_width,
            }),
            Vec::new(),
        ),
        ObjectDocument::Light {
            common,
            direction,
            color,
        } => (
            common,
            ObjectKind::Light(Light {
                direction: euclid::vec3(direction[0], direction[1], direction[2]),
                color,
            }),
            Vec::new(),
        ),
        ObjectDocument::Axes {
            common,
            position,
            color,
            xlim,
            ylim,
            zlim,
            view,
            frame,
            children,
        } => {
            let d = Axes::default();
            let axes = Axes {
                position: position.map(rect).unwrap_or(d.position),
                color: color.unwrap_or(d.color),
                xlim: xlim.unwrap_or(d.xlim),
                ylim: ylim.unwrap_or(d.ylim),
                zlim: zlim.unwrap_or(d.zlim),
                view: view.unwrap_or(d.view),
                frame,
                line_color: d.line_color,
            };
            (common, ObjectKind::Axes(axes), children)
        }
    };

    let id = scene.add(parent, common.name.as_deref(), kind)?;
    if let Some(obj) = scene.get_mut(id) {
        obj.visible = common.visible;
    }
    for child in children {
        add_object(scene, Some(id), child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_nested_scene_document() {
        let json = r##"{
            "figure": { "position": [0, 0, 400, 300], "color": "#eeeeee" },
            "children": [
                { "type": "axes", "name": "ax", "view": [-37.5, 30], "children": [
                    { "type": "surface", "name": "s", "x": [0, 1], "y": [0, 1], "z": [[0, 1], [1, 0]], "face_alpha": 0.5 },
                    { "type": "light" },
                    { "type": "text", "content": ["a", "b"], "font_size": 12, "halign": "center" }
                ] },
                { "type": "text", "content": "note", "visible": false }
            ]
        }"##;
        let scene = Scene::from_json(json).unwrap();
        assert_eq!(scene.len(), 5);
        assert_eq!(scene.figure.color, Fill::Color(Color::rgb(0xee, 0xee, 0xee)));
        let ax = scene.find("ax").unwrap();
        assert_eq!(scene.get(ax).unwrap().children.len(), 3);
        let s = scene.find("s").unwrap();
        let ObjectKind::Shape(shape) = &scene.get(s).unwrap().kind else {
            panic!("expected shape");
        };
        assert_eq!(shape.face, FaceFill::Colormap);
        assert_eq!(shape.face_alpha, 0.5);
        let note = scene.roots()[1];
        assert!(!scene.get(note).unwrap().visible);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(Scene::from_json(r#"{"children": [{"type": "blob"}]}"#).is_err());
    }
}
