//! Reversible scene mutation.
//!
//! Every property the exporter touches is captured up front in a [`Snapshot`]. A
//! [`SceneGuard`] holds the scene for the duration of an export stage and writes the snapshot
//! back when dropped, so every exit path (success, `?` propagation, unwinding) restores the
//! caller's scene.

use crate::color::Fill;
use crate::geom::{Point, Rect};
use crate::scene::{Figure, HAlign, Interpreter, ObjectKind, Scene, TextContent, VAlign};
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, PartialEq)]
struct TextState {
    content: TextContent,
    interpreter: Interpreter,
    halign: HAlign,
    valign: VAlign,
    font_size: f64,
    position: Point,
}

#[derive(Debug, Clone, PartialEq)]
enum Detail {
    Text(TextState),
    Axes {
        position: Rect,
        color: Fill,
        frame: bool,
    },
    Plain,
}

#[derive(Debug, Clone, PartialEq)]
struct ObjectState {
    visible: bool,
    detail: Detail,
}

/// Value copy of every mutable scene property the export pipeline may change.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    figure: Figure,
    objects: Vec<ObjectState>,
}

impl Snapshot {
    pub fn capture(scene: &Scene) -> Self {
        let objects = scene
            .objects()
            .map(|(_, obj)| ObjectState {
                visible: obj.visible,
                detail: match &obj.kind {
                    ObjectKind::Text(t) => Detail::Text(TextState {
                        content: t.content.clone(),
                        interpreter: t.interpreter,
                        halign: t.halign,
                        valign: t.valign,
                        font_size: t.font_size,
                        position: t.position,
                    }),
                    ObjectKind::Axes(a) => Detail::Axes {
                        position: a.position,
                        color: a.color,
                        frame: a.frame,
                    },
                    ObjectKind::Shape(_) | ObjectKind::Light(_) => Detail::Plain,
                },
            })
            .collect();
        Self {
            figure: scene.figure.clone(),
            objects,
        }
    }

    /// Writes every captured property back. Applying the same snapshot again is a no-op.
    pub fn restore(&self, scene: &mut Scene) {
        scene.figure = self.figure.clone();
        for ((_, obj), state) in scene.objects_mut().zip(&self.objects) {
            obj.visible = state.visible;
            match (&mut obj.kind, &state.detail) {
                (ObjectKind::Text(t), Detail::Text(s)) => {
                    t.content = s.content.clone();
                    t.interpreter = s.interpreter;
                    t.halign = s.halign;
                    t.valign = s.valign;
                    t.font_size = s.font_size;
                    t.position = s.position;
                }
                (
                    ObjectKind::Axes(a),
                    Detail::Axes {
                        position,
                        color,
                        frame,
                    },
                ) => {
                    a.position = *position;
                    a.color = *color;
                    a.frame = *frame;
                }
                _ => {}
            }
        }
    }
}

/// Scoped mutable access to a scene that restores it on drop.
pub struct SceneGuard<'a> {
    scene: &'a mut Scene,
    snapshot: Snapshot,
}

impl<'a> SceneGuard<'a> {
    pub fn new(scene: &'a mut Scene) -> Self {
        let snapshot = Snapshot::capture(scene);
        Self { scene, snapshot }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Restores immediately and releases the scene.
    pub fn restore(self) {
        drop(self);
    }
}

impl Deref for SceneGuard<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        self.scene
    }
}

impl DerefMut for SceneGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scene {
        self.scene
    }
}

impl Drop for SceneGuard<'_> {
    fn drop(&mut self) {
        self.snapshot.restore(self.scene);
        tracing::trace!("scene state restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::scene::{Axes, TextObject};

    fn sample() -> Scene {
        let mut scene = Scene::default();
        let ax = scene
            .add(None, None, ObjectKind::Axes(Axes::default()))
            .unwrap();
        scene
            .add(
                Some(ax),
                None,
                ObjectKind::Text(TextObject {
                    content: TextContent::Single("$x^2$".into()),
                    interpreter: Interpreter::Latex,
                    ..Default::default()
                }),
            )
            .unwrap();
        scene
    }

    fn scramble(scene: &mut Scene) {
        scene.figure.color = Fill::Color(Color::BLACK);
        scene.figure.inverted_hardcopy = false;
        for (_, obj) in scene.objects_mut() {
            obj.visible = false;
            match &mut obj.kind {
                ObjectKind::Text(t) => {
                    t.content = TextContent::Single("tag_01".into());
                    t.interpreter = Interpreter::None;
                    t.font_size = 99.0;
                }
                ObjectKind::Axes(a) => {
                    a.color = Fill::None;
                    a.frame = false;
                }
                _ => {}
            }
        }
    }

    #[test]
    fn capture_does_not_touch_the_scene() {
        let scene = sample();
        let before = scene.clone();
        let _ = Snapshot::capture(&scene);
        assert_eq!(scene, before);
    }

    #[test]
    fn restore_is_idempotent() {
        let mut scene = sample();
        let original = scene.clone();
        let snapshot = Snapshot::capture(&scene);
        scramble(&mut scene);
        snapshot.restore(&mut scene);
        snapshot.restore(&mut scene);
        assert_eq!(scene, original);
    }

    #[test]
    fn guard_restores_on_early_return() {
        fn failing_stage(scene: &mut Scene) -> Result<(), &'static str> {
            let mut guard = SceneGuard::new(scene);
            scramble(&mut guard);
            let stage: Result<(), &'static str> = Err("stage failed");
            stage?;
            Ok(())
        }

        let mut scene = sample();
        let original = scene.clone();
        assert!(failing_stage(&mut scene).is_err());
        assert_eq!(scene, original);
    }

    #[test]
    fn guards_nest() {
        let mut scene = sample();
        let original = scene.clone();
        {
            let mut outer = SceneGuard::new(&mut scene);
            outer.figure.color = Fill::None;
            {
                let mut inner = SceneGuard::new(&mut outer);
                scramble(&mut inner);
            }
            assert_eq!(outer.figure.color, Fill::None);
            assert!(outer.objects().all(|(_, o)| o.visible));
        }
        assert_eq!(scene, original);
    }
}
