use crate::color::{Color, Fill};
use crate::error::{Error, Result};
use crate::geom::{Point, Point3, Rect, Size, Vector3};
use serde::{Deserialize, Serialize};

/// Density assumed for screen-unit figures when a scene does not say otherwise.
pub const DEFAULT_SCREEN_PPI: f64 = 96.0;

/// Stable handle for an object inside one [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) usize);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Pixels,
    Points,
    Inches,
    Centimeters,
}

impl Units {
    pub fn to_pixels(self, value: f64, screen_ppi: f64) -> f64 {
        match self {
            Units::Pixels => value,
            Units::Points => value * screen_ppi / 72.0,
            Units::Inches => value * screen_ppi,
            Units::Centimeters => value * screen_ppi / 2.54,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperPositionMode {
    /// The printed size follows the on-screen size.
    #[default]
    Auto,
    /// The printed size is `Figure::paper_size`.
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    /// Position and size in `units`.
    pub position: Rect,
    pub units: Units,
    pub color: Fill,
    pub paper_position_mode: PaperPositionMode,
    /// Printed size in points, used when `paper_position_mode` is manual.
    pub paper_size: Size,
    /// Print with a white background regardless of `color`.
    pub inverted_hardcopy: bool,
}

impl Default for Figure {
    fn default() -> Self {
        Self {
            position: crate::geom::rect([0.0, 0.0, 560.0, 420.0]),
            units: Units::Pixels,
            color: Fill::Color(Color::WHITE),
            paper_position_mode: PaperPositionMode::Auto,
            paper_size: crate::geom::size(420.0, 315.0),
            inverted_hardcopy: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Top,
    Cap,
    #[default]
    Middle,
    Baseline,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpreter {
    /// Literal text; LaTeX specials are escaped before typesetting.
    None,
    /// TeX-like markup passed through verbatim.
    #[default]
    Tex,
    /// Full LaTeX markup passed through verbatim.
    Latex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextContent {
    Single(String),
    Lines(Vec<String>),
}

impl Default for TextContent {
    fn default() -> Self {
        TextContent::Single(String::new())
    }
}

impl TextContent {
    pub fn is_blank(&self) -> bool {
        match self {
            TextContent::Single(s) => s.trim().is_empty(),
            TextContent::Lines(lines) => lines.iter().all(|l| l.trim().is_empty()),
        }
    }

    /// Lines of the block; a single string splits on embedded newlines.
    pub fn lines(&self) -> Vec<&str> {
        match self {
            TextContent::Single(s) => s.lines().collect(),
            TextContent::Lines(lines) => lines.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextObject {
    pub content: TextContent,
    /// Font size in points.
    pub font_size: f64,
    pub halign: HAlign,
    pub valign: VAlign,
    pub interpreter: Interpreter,
    /// Anchor in normalized units of the parent container (axes box or figure).
    pub position: Point,
    /// Counter-clockwise rotation in degrees.
    pub rotation: f64,
    pub color: Color,
}

impl Default for TextObject {
    fn default() -> Self {
        Self {
            content: TextContent::default(),
            font_size: 10.0,
            halign: HAlign::Left,
            valign: VAlign::Middle,
            interpreter: Interpreter::Tex,
            position: crate::geom::point(0.0, 0.0),
            rotation: 0.0,
            color: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// Open polyline through data-space points.
    Line { points: Vec<Point3> },
    /// Closed polygon through data-space vertices.
    Patch { vertices: Vec<Point3> },
    /// Grid surface: `z[row][col]` sampled at `(x[col], y[row])`.
    Surface {
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<Vec<f64>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FaceFill {
    None,
    Solid(Color),
    /// Faces colored by height through the built-in colormap.
    #[default]
    Colormap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub face: FaceFill,
    /// Face opacity in `0.0..=1.0`.
    pub face_alpha: f64,
    pub edge: Fill,
    pub line_width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Direction towards the light in normalized data space.
    pub direction: Vector3,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axes {
    /// Normalized figure units, origin bottom-left.
    pub position: Rect,
    /// Background; `None` lets the figure show through.
    pub color: Fill,
    pub xlim: [f64; 2],
    pub ylim: [f64; 2],
    pub zlim: [f64; 2],
    /// Azimuth and elevation in degrees; `[0, 90]` is the 2-D view.
    pub view: [f64; 2],
    /// Draw the axes box outline.
    pub frame: bool,
    pub line_color: Color,
}

impl Default for Axes {
    fn default() -> Self {
        Self {
            position: crate::geom::rect([0.13, 0.11, 0.775, 0.815]),
            color: Fill::Color(Color::WHITE),
            xlim: [0.0, 1.0],
            ylim: [0.0, 1.0],
            zlim: [-1.0, 1.0],
            view: [0.0, 90.0],
            frame: true,
            line_color: Color::rgb(38, 38, 38),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Text(TextObject),
    Shape(Shape),
    Light(Light),
    Axes(Axes),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawableObject {
    pub name: Option<String>,
    /// Hides this object's own drawing. Children of a hidden axes still draw.
    pub visible: bool,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
    pub kind: ObjectKind,
}

impl DrawableObject {
    pub fn as_text(&self) -> Option<&TextObject> {
        match &self.kind {
            ObjectKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_axes(&self) -> Option<&Axes> {
        match &self.kind {
            ObjectKind::Axes(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_light(&self) -> bool {
        matches!(self.kind, ObjectKind::Light(_))
    }
}

/// The figure being exported: figure properties plus an arena of objects forming a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub figure: Figure,
    pub screen_ppi: f64,
    objects: Vec<DrawableObject>,
    roots: Vec<ObjectId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(Figure::default())
    }
}

impl Scene {
    pub fn new(figure: Figure) -> Self {
        Self {
            figure,
            screen_ppi: DEFAULT_SCREEN_PPI,
            objects: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Adds an object under `parent` (or directly under the figure) and returns its id.
    pub fn add(
        &mut self,
        parent: Option<ObjectId>,
        name: Option<&str>,
        kind: ObjectKind,
    ) -> Result<ObjectId> {
        if let Some(p) = parent {
            let obj = self.get(p).ok_or(Error::ForeignObject { id: p })?;
            if obj.as_axes().is_none() {
                return Err(Error::NotAContainer { id: p });
            }
        }
        let id = ObjectId(self.objects.len());
        self.objects.push(DrawableObject {
            name: name.map(str::to_string),
            visible: true,
            parent,
            children: Vec::new(),
            kind,
        });
        match parent {
            Some(p) => self.objects[p.0].children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&DrawableObject> {
        self.objects.get(id.0)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut DrawableObject> {
        self.objects.get_mut(id.0)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        id.0 < self.objects.len()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Direct children of the figure.
    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &DrawableObject)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, o)| (ObjectId(i), o))
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = (ObjectId, &mut DrawableObject)> {
        self.objects
            .iter_mut()
            .enumerate()
            .map(|(i, o)| (ObjectId(i), o))
    }

    /// Depth-first pre-order over the tree, children in insertion order.
    pub fn walk(&self) -> Vec<ObjectId> {
        let mut out = Vec::with_capacity(self.objects.len());
        let mut stack: Vec<ObjectId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.objects[id.0].children.iter().rev().copied());
        }
        out
    }

    /// `id` followed by everything beneath it, pre-order. Empty for foreign ids.
    pub fn subtree(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(obj) = self.get(id) else {
                continue;
            };
            out.push(id);
            stack.extend(obj.children.iter().rev().copied());
        }
        out
    }

    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.objects()
            .find(|(_, o)| o.name.as_deref() == Some(name))
            .map(|(id, _)| id)
    }

    /// Nearest enclosing axes of `id`, if any.
    pub fn parent_axes(&self, id: ObjectId) -> Option<(ObjectId, &Axes)> {
        let parent = self.get(id)?.parent?;
        let axes = self.get(parent)?.as_axes()?;
        Some((parent, axes))
    }

    /// Figure size in screen pixels.
    pub fn size_px(&self) -> Size {
        let units = self.figure.units;
        let ppi = self.screen_ppi;
        crate::geom::size(
            units.to_pixels(self.figure.position.size.width, ppi),
            units.to_pixels(self.figure.position.size.height, ppi),
        )
    }

    /// Printed canvas size in points, honoring the paper position mode.
    pub fn paper_size_pt(&self) -> Size {
        match self.figure.paper_position_mode {
            PaperPositionMode::Manual => self.figure.paper_size,
            PaperPositionMode::Auto => self.size_px() * (72.0 / self.screen_ppi),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        crate::document::SceneDocument::from_json(text)?.into_scene()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> ObjectKind {
        ObjectKind::Text(TextObject {
            content: TextContent::Single(s.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn walk_is_preorder_in_insertion_order() {
        let mut scene = Scene::default();
        let ax = scene
            .add(None, Some("ax"), ObjectKind::Axes(Axes::default()))
            .unwrap();
        let a = scene.add(Some(ax), None, text("a")).unwrap();
        let b = scene.add(Some(ax), None, text("b")).unwrap();
        let top = scene.add(None, None, text("top")).unwrap();
        assert_eq!(scene.walk(), vec![ax, a, b, top]);
        assert_eq!(scene.get(a).unwrap().parent, Some(ax));
        assert_eq!(scene.find("ax"), Some(ax));
        assert_eq!(scene.subtree(ax), vec![ax, a, b]);
        assert_eq!(scene.subtree(top), vec![top]);
    }

    #[test]
    fn only_axes_hold_children() {
        let mut scene = Scene::default();
        let t = scene.add(None, None, text("x")).unwrap();
        let err = scene.add(Some(t), None, text("y")).unwrap_err();
        assert!(matches!(err, Error::NotAContainer { .. }));
    }

    #[test]
    fn paper_size_follows_screen_size_in_auto_mode() {
        let scene = Scene::default();
        let pt = scene.paper_size_pt();
        assert!((pt.width - 420.0).abs() < 1e-9);
        assert!((pt.height - 315.0).abs() < 1e-9);
    }
}
