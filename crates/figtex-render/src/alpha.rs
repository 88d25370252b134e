//! Alpha-channel rasterization by differential backgrounds.
//!
//! The selection is drawn twice, over white and over black. A pixel covered with opacity `a`
//! by color `c` comes out as `a*c + (1-a)*255` and `a*c`, so the difference of the two passes
//! is `(1-a)*255` and the black pass holds the premultiplied color.

use crate::display::{RenderSettings, build_display_list};
use crate::downsample::downsample;
use crate::pixels::PixelRenderer;
use crate::{Error, Result};
use figtex_core::{
    Color, ObjectId, ObjectKind, RasterSelection, Renderer, Scene, SceneGuard, ShapeKind,
};
use image::{GrayImage, RgbImage, RgbaImage};
use std::collections::BTreeSet;
use std::path::Path;

/// Straight (non-premultiplied) color plus coverage.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLayer {
    pub rgb: RgbImage,
    pub alpha: GrayImage,
}

impl RenderedLayer {
    pub fn dimensions(&self) -> (u32, u32) {
        self.rgb.dimensions()
    }

    pub fn to_rgba(&self) -> RgbaImage {
        RgbaImage::from_fn(self.rgb.width(), self.rgb.height(), |x, y| {
            let [r, g, b] = self.rgb.get_pixel(x, y).0;
            image::Rgba([r, g, b, self.alpha.get_pixel(x, y).0[0]])
        })
    }

    pub fn write_png(&self, path: &Path) -> Result<()> {
        self.to_rgba()
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RasterizeOptions {
    pub anti_alias: u32,
    pub ppi: f64,
    pub renderer: Renderer,
}

/// Selected objects plus everything beneath them.
pub fn with_descendants(scene: &Scene, selection: &RasterSelection) -> BTreeSet<ObjectId> {
    selection.iter().flat_map(|id| scene.subtree(*id)).collect()
}

/// Unselected axes that contain a selected object. Their backgrounds belong to the raster layer.
pub fn enclosing_axes(scene: &Scene, selection: &RasterSelection) -> BTreeSet<ObjectId> {
    let covered = with_descendants(scene, selection);
    let mut out = BTreeSet::new();
    for &id in selection {
        let mut parent = scene.get(id).and_then(|o| o.parent);
        while let Some(p) = parent {
            let Some(obj) = scene.get(p) else {
                break;
            };
            if obj.as_axes().is_some() && !covered.contains(&p) {
                out.insert(p);
            }
            parent = obj.parent;
        }
    }
    out
}

fn has_translucent_faces(scene: &Scene, shown: &BTreeSet<ObjectId>) -> bool {
    shown.iter().filter_map(|id| scene.get(*id)).any(|obj| {
        matches!(&obj.kind, ObjectKind::Shape(s)
            if s.face_alpha < 1.0 && !matches!(s.kind, ShapeKind::Line { .. }))
    })
}

/// Renders only `selection` and its visible descendants, lit by the scene's lights, into a layer
/// with a real alpha channel. Backgrounds of the axes holding the selection are drawn too,
/// without their frames. Text objects are never rasterized.
///
/// The scene is changed while rendering and restored before returning, on success or error.
pub fn rasterize(
    scene: &mut Scene,
    selection: &RasterSelection,
    options: &RasterizeOptions,
    pixels: &dyn PixelRenderer,
) -> Result<RenderedLayer> {
    let mut guard = SceneGuard::new(scene);
    let shown = with_descendants(&guard, selection);
    let backdrops = enclosing_axes(&guard, selection);
    for (id, obj) in guard.objects_mut() {
        obj.visible = if obj.is_light() {
            true
        } else if obj.as_text().is_some() {
            // Text always goes through the vector layer.
            false
        } else if selection.contains(&id) {
            true
        } else {
            // Descendants and enclosing axes keep the caller's visibility.
            obj.visible && (shown.contains(&id) || backdrops.contains(&id))
        };
        if backdrops.contains(&id) {
            if let ObjectKind::Axes(axes) = &mut obj.kind {
                axes.frame = false;
            }
        }
    }
    guard.figure.inverted_hardcopy = false;

    let settings = RenderSettings {
        opaque_faces: !options.renderer.supports_transparency(),
    };
    if settings.opaque_faces && has_translucent_faces(&guard, &shown) {
        tracing::warn!(
            renderer = ?options.renderer,
            "renderer cannot draw partial transparency; translucent faces will be opaque"
        );
    }

    let aa = options.anti_alias.max(1);
    let magnify = f64::from(aa) * options.ppi / guard.screen_ppi;
    let list = build_display_list(&guard, &settings);
    tracing::debug!(magnify, anti_alias = aa, items = list.items.len(), "rasterizing selection");

    let white = downsample(&pixels.render(&list, magnify, Color::WHITE)?, aa);
    let black = downsample(&pixels.render(&list, magnify, Color::BLACK)?, aa);
    drop(guard);

    if white.dimensions() != black.dimensions() {
        return Err(Error::LayerMismatch {
            white: white.dimensions(),
            black: black.dimensions(),
        });
    }
    Ok(combine(&white, &black))
}

fn combine(white: &RgbImage, black: &RgbImage) -> RenderedLayer {
    let (w, h) = white.dimensions();
    let mut rgb = RgbImage::new(w, h);
    let mut alpha = GrayImage::new(w, h);
    for (x, y, wp) in white.enumerate_pixels() {
        let bp = black.get_pixel(x, y).0;
        let diff: u32 = wp
            .0
            .iter()
            .zip(bp)
            .map(|(w, b)| u32::from(w.saturating_sub(b)))
            .sum();
        let a = 255 - ((diff as f64 / 3.0).round() as u32).min(255);
        let color = if a == 0 {
            [0, 0, 0]
        } else {
            bp.map(|c| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8)
        };
        rgb.put_pixel(x, y, image::Rgb(color));
        alpha.put_pixel(x, y, image::Luma([a as u8]));
    }
    RenderedLayer { rgb, alpha }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayList, Item};
    use crate::pixels::ResvgRenderer;
    use figtex_core::{Axes, FaceFill, Fill, Light, Shape, geom::point3};

    /// Paints the bounding box of every filled polygon, opaque.
    struct BoxPainter;

    impl PixelRenderer for BoxPainter {
        fn render(&self, list: &DisplayList, magnify: f64, background: Color) -> Result<RgbImage> {
            let w = (list.width * magnify).ceil() as u32;
            let h = (list.height * magnify).ceil() as u32;
            let mut img = RgbImage::from_pixel(w, h, image::Rgb([background.r, background.g, background.b]));
            for item in &list.items {
                if let Item::Polygon { points, fill: Some((c, _)), .. } = item {
                    let b = euclid::Box2D::from_points(points.iter().copied());
                    for y in (b.min.y * magnify) as u32..(b.max.y * magnify) as u32 {
                        for x in (b.min.x * magnify) as u32..(b.max.x * magnify) as u32 {
                            img.put_pixel(x.min(w - 1), y.min(h - 1), image::Rgb([c.r, c.g, c.b]));
                        }
                    }
                }
            }
            Ok(img)
        }
    }

    fn scene_with_patch(color: Color) -> (Scene, ObjectId) {
        let mut scene = Scene::default();
        scene.figure.color = Fill::Color(Color::rgb(30, 30, 30));
        let ax = scene
            .add(None, None, ObjectKind::Axes(Axes::default()))
            .unwrap();
        let patch = scene
            .add(
                Some(ax),
                Some("patch"),
                ObjectKind::Shape(Shape {
                    kind: ShapeKind::Patch {
                        vertices: vec![
                            point3(0.2, 0.2, 0.0),
                            point3(0.8, 0.2, 0.0),
                            point3(0.8, 0.8, 0.0),
                            point3(0.2, 0.8, 0.0),
                        ],
                    },
                    face: FaceFill::Solid(color),
                    face_alpha: 1.0,
                    edge: Fill::None,
                    line_width: 0.5,
                }),
            )
            .unwrap();
        (scene, patch)
    }

    fn opts(renderer: Renderer) -> RasterizeOptions {
        RasterizeOptions {
            anti_alias: 1,
            ppi: 96.0,
            renderer,
        }
    }

    #[test]
    fn opaque_shape_of_any_color_gets_full_alpha() {
        for color in [Color::rgb(200, 40, 90), Color::WHITE, Color::BLACK, Color::rgb(1, 254, 128)] {
            let (mut scene, patch) = scene_with_patch(color);
            let layer = rasterize(
                &mut scene,
                &RasterSelection::from([patch]),
                &opts(Renderer::OpenGl),
                &BoxPainter,
            )
            .unwrap();
            assert_eq!(layer.dimensions(), (560, 420));
            // The patch covers roughly x 160..420, y 100..305.
            assert_eq!(layer.alpha.get_pixel(280, 210).0, [255]);
            assert_eq!(layer.rgb.get_pixel(280, 210).0, [color.r, color.g, color.b]);
            assert_eq!(layer.alpha.get_pixel(5, 5).0, [0]);
        }
    }

    #[test]
    fn scene_is_restored_after_rasterizing() {
        let (mut scene, patch) = scene_with_patch(Color::rgb(10, 20, 30));
        scene
            .add(
                None,
                None,
                ObjectKind::Light(Light {
                    direction: euclid::vec3(1.0, 0.0, 1.0),
                    color: Color::WHITE,
                }),
            )
            .unwrap();
        let before = scene.clone();
        rasterize(
            &mut scene,
            &RasterSelection::from([patch]),
            &opts(Renderer::Painters),
            &BoxPainter,
        )
        .unwrap();
        assert_eq!(scene, before);
    }

    fn set_axes_color(scene: &mut Scene, child: ObjectId, color: Fill) -> ObjectId {
        let ax = scene.get(child).unwrap().parent.unwrap();
        if let ObjectKind::Axes(axes) = &mut scene.get_mut(ax).unwrap().kind {
            axes.color = color;
        }
        ax
    }

    #[test]
    fn hidden_descendants_stay_out_of_the_layer() {
        let (mut scene, patch) = scene_with_patch(Color::rgb(200, 0, 0));
        let ax = set_axes_color(&mut scene, patch, Fill::None);
        let hidden = scene
            .add(
                Some(ax),
                Some("hidden"),
                ObjectKind::Shape(Shape {
                    kind: ShapeKind::Patch {
                        vertices: vec![
                            point3(0.85, 0.85, 0.0),
                            point3(0.95, 0.85, 0.0),
                            point3(0.95, 0.95, 0.0),
                            point3(0.85, 0.95, 0.0),
                        ],
                    },
                    face: FaceFill::Solid(Color::rgb(0, 0, 200)),
                    face_alpha: 1.0,
                    edge: Fill::None,
                    line_width: 0.5,
                }),
            )
            .unwrap();
        scene.get_mut(hidden).unwrap().visible = false;
        let before = scene.clone();

        let layer = rasterize(
            &mut scene,
            &RasterSelection::from([ax]),
            &opts(Renderer::OpenGl),
            &BoxPainter,
        )
        .unwrap();

        // The hidden patch covers roughly x 442..485, y 49..83.
        assert_eq!(layer.alpha.get_pixel(463, 65).0, [0]);
        assert_eq!(layer.alpha.get_pixel(280, 210).0, [255]);
        assert_eq!(layer.rgb.get_pixel(280, 210).0, [200, 0, 0]);
        assert_eq!(scene, before);
    }

    #[test]
    fn enclosing_axes_background_is_part_of_the_layer() {
        let (mut scene, patch) = scene_with_patch(Color::rgb(200, 0, 0));
        let ax = set_axes_color(&mut scene, patch, Fill::Color(Color::rgb(0, 200, 0)));
        let selection = RasterSelection::from([patch]);
        assert_eq!(enclosing_axes(&scene, &selection), BTreeSet::from([ax]));
        let before = scene.clone();

        let layer = rasterize(&mut scene, &selection, &opts(Renderer::OpenGl), &BoxPainter).unwrap();

        // Inside the axes box, outside the patch.
        assert_eq!(layer.alpha.get_pixel(100, 60).0, [255]);
        assert_eq!(layer.rgb.get_pixel(100, 60).0, [0, 200, 0]);
        assert_eq!(layer.rgb.get_pixel(280, 210).0, [200, 0, 0]);
        assert_eq!(layer.alpha.get_pixel(5, 5).0, [0]);
        assert_eq!(scene, before);
    }

    #[test]
    fn selected_axes_are_not_their_own_backdrop() {
        let (scene, patch) = scene_with_patch(Color::WHITE);
        let ax = scene.get(patch).unwrap().parent.unwrap();
        assert!(enclosing_axes(&scene, &RasterSelection::from([ax, patch])).is_empty());
    }

    #[test]
    fn half_transparent_pixels_recover_straight_color() {
        let white = RgbImage::from_pixel(1, 1, image::Rgb([227, 147, 127]));
        let black = RgbImage::from_pixel(1, 1, image::Rgb([100, 20, 0]));
        let layer = combine(&white, &black);
        assert_eq!(layer.alpha.get_pixel(0, 0).0, [128]);
        assert_eq!(layer.rgb.get_pixel(0, 0).0, [199, 40, 0]);
    }

    #[test]
    fn resvg_interior_pixels_are_opaque() {
        let (mut scene, patch) = scene_with_patch(Color::rgb(200, 40, 90));
        let layer = rasterize(
            &mut scene,
            &RasterSelection::from([patch]),
            &RasterizeOptions {
                anti_alias: 2,
                ppi: 48.0,
                renderer: Renderer::OpenGl,
            },
            &ResvgRenderer::new(),
        )
        .unwrap();
        assert_eq!(layer.dimensions(), (280, 210));
        assert_eq!(layer.alpha.get_pixel(140, 105).0, [255]);
        assert_eq!(layer.rgb.get_pixel(140, 105).0, [200, 40, 90]);
        assert_eq!(layer.alpha.get_pixel(2, 2).0, [0]);
    }
}
