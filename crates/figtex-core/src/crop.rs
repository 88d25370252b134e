use crate::error::{Error, Result};
use crate::geom::{Point, Rect};
use crate::scene::{ObjectKind, Scene};
use std::str::FromStr;

/// Region of the figure to keep, in normalized figure units.
///
/// Offsets may be negative and extents may exceed 1 (padding the figure).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub left: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub const FULL: CropRect = CropRect {
        left: 0.0,
        bottom: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(left: f64, bottom: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            bottom,
            width,
            height,
        }
    }

    pub fn is_full(&self) -> bool {
        *self == Self::FULL
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [self.left, self.bottom, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if finite && self.width > 0.0 && self.height > 0.0 {
            Ok(())
        } else {
            Err(Error::MalformedCrop {
                value: format!(
                    "{},{},{},{}",
                    self.left, self.bottom, self.width, self.height
                ),
            })
        }
    }

    /// Maps a normalized rect of the uncropped figure into the cropped figure.
    pub fn map_rect(&self, r: Rect) -> Rect {
        euclid::rect(
            (r.origin.x - self.left) / self.width,
            (r.origin.y - self.bottom) / self.height,
            r.size.width / self.width,
            r.size.height / self.height,
        )
    }

    pub fn map_point(&self, p: Point) -> Point {
        crate::geom::point(
            (p.x - self.left) / self.width,
            (p.y - self.bottom) / self.height,
        )
    }
}

impl Default for CropRect {
    fn default() -> Self {
        Self::FULL
    }
}

impl FromStr for CropRect {
    type Err = Error;

    /// Parses `left,bottom,width,height`; brackets and whitespace separators are accepted.
    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::MalformedCrop {
            value: s.to_string(),
        };
        let values = s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<f64>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>>>()?;
        let &[left, bottom, width, height] = &values[..] else {
            return Err(malformed());
        };
        let crop = Self::new(left, bottom, width, height);
        crop.validate().map_err(|_| malformed())?;
        Ok(crop)
    }
}

/// Shrinks the figure to `crop` and re-positions its direct children so they keep their
/// physical size and place.
///
/// The mapping is not inverted arithmetically; the pipeline restores geometry from the
/// [`Snapshot`](crate::snapshot::Snapshot) taken beforehand, which is bit-exact.
pub fn apply(scene: &mut Scene, crop: &CropRect) {
    let size = &mut scene.figure.position.size;
    size.width *= crop.width;
    size.height *= crop.height;

    let roots = scene.roots().to_vec();
    for id in roots {
        let Some(obj) = scene.get_mut(id) else {
            continue;
        };
        match &mut obj.kind {
            ObjectKind::Axes(axes) => axes.position = crop.map_rect(axes.position),
            ObjectKind::Text(text) => text.position = crop.map_point(text.position),
            ObjectKind::Shape(_) | ObjectKind::Light(_) => {}
        }
    }
    tracing::debug!(?crop, "applied crop");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Axes, TextObject};
    use crate::snapshot::Snapshot;

    #[test]
    fn parses_crop_vectors() {
        let c: CropRect = "[-0.1, 0.2, 1.5, 0.5]".parse().unwrap();
        assert_eq!(c, CropRect::new(-0.1, 0.2, 1.5, 0.5));
        assert!("0,0,1".parse::<CropRect>().is_err());
        assert!("0,0,0,1".parse::<CropRect>().is_err());
        assert!("a,b,c,d".parse::<CropRect>().is_err());
    }

    #[test]
    fn crop_maps_axes_into_cropped_figure() {
        let crop = CropRect::new(0.5, 0.0, 0.5, 1.0);
        let r = crop.map_rect(crate::geom::rect([0.5, 0.1, 0.25, 0.8]));
        assert_eq!(r, crate::geom::rect([0.0, 0.1, 0.5, 0.8]));
    }

    #[test]
    fn restore_after_crop_is_bit_exact() {
        let mut scene = Scene::default();
        let positions = [
            [0.13, 0.11, 0.775, 0.815],
            [0.1 + 0.2, 0.7 / 3.0, 1.0 / 7.0, 0.33],
        ];
        for p in positions {
            let axes = Axes {
                position: crate::geom::rect(p),
                ..Default::default()
            };
            scene.add(None, None, ObjectKind::Axes(axes)).unwrap();
        }
        let label = TextObject {
            position: crate::geom::point(0.3, 0.9),
            ..Default::default()
        };
        scene.add(None, None, ObjectKind::Text(label)).unwrap();
        let original = scene.clone();

        for crop in [
            CropRect::new(-0.3, -0.7, 1.9, 2.3),
            CropRect::new(0.1, 0.2, 0.3, 0.7),
            CropRect::new(0.0, 0.0, 3.0, 1e-3),
        ] {
            let snapshot = Snapshot::capture(&scene);
            apply(&mut scene, &crop);
            assert_ne!(scene, original);
            snapshot.restore(&mut scene);
            assert_eq!(scene, original);
        }
    }
}
