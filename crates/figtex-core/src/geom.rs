#![forbid(unsafe_code)]

pub type Unit = euclid::UnknownUnit;

pub type Point = euclid::Point2D<f64, Unit>;
pub type Point3 = euclid::Point3D<f64, Unit>;
pub type Vector3 = euclid::Vector3D<f64, Unit>;
pub type Size = euclid::Size2D<f64, Unit>;
pub type Rect = euclid::Rect<f64, Unit>;

pub fn point(x: f64, y: f64) -> Point {
    euclid::point2(x, y)
}

pub fn point3(x: f64, y: f64, z: f64) -> Point3 {
    euclid::point3(x, y, z)
}

pub fn size(w: f64, h: f64) -> Size {
    euclid::size2(w, h)
}

/// `[x, y, w, h]` as used by scene documents and the CLI.
pub fn rect(xywh: [f64; 4]) -> Rect {
    euclid::rect(xywh[0], xywh[1], xywh[2], xywh[3])
}
