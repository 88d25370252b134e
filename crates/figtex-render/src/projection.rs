//! Data space → canvas mapping for axes contents.
//!
//! Data is normalized into a unit cube centered on the origin, rotated by the axes view
//! (azimuth/elevation, orthographic) and stretched to fill the axes box on the canvas.
//! Canvas coordinates are pixels with the origin at the top-left corner.

use figtex_core::geom::{Point, Point3, Rect, Vector3};
use figtex_core::{Axes, Light};

/// Canvas rectangle of a normalized (bottom-left origin) figure rect.
pub fn canvas_rect(normalized: Rect, canvas_w: f64, canvas_h: f64) -> Rect {
    euclid::rect(
        normalized.origin.x * canvas_w,
        (1.0 - normalized.origin.y - normalized.size.height) * canvas_h,
        normalized.size.width * canvas_w,
        normalized.size.height * canvas_h,
    )
}

/// Canvas point of a position given in normalized units of `frame` (a canvas rect).
pub fn point_in(frame: Rect, normalized: Point) -> Point {
    euclid::point2(
        frame.origin.x + normalized.x * frame.size.width,
        frame.origin.y + (1.0 - normalized.y) * frame.size.height,
    )
}

#[derive(Debug, Clone)]
pub struct Projection {
    lo: [f64; 3],
    span: [f64; 3],
    rows: [[f64; 3]; 3],
    u: [f64; 2],
    v: [f64; 2],
    frame: Rect,
}

fn span(lim: [f64; 2]) -> f64 {
    let s = lim[1] - lim[0];
    if s.is_finite() && s.abs() > f64::EPSILON {
        s
    } else {
        1.0
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

impl Projection {
    /// Projection for shapes inside `axes`, drawn into `frame` (canvas pixels).
    pub fn for_axes(axes: &Axes, frame: Rect) -> Self {
        let az = axes.view[0].to_radians();
        let el = axes.view[1].to_radians();
        let rows = [
            [az.cos(), az.sin(), 0.0],
            [-el.sin() * az.sin(), el.sin() * az.cos(), el.cos()],
            [el.cos() * az.sin(), -el.cos() * az.cos(), el.sin()],
        ];
        let mut p = Self {
            lo: [axes.xlim[0], axes.ylim[0], axes.zlim[0]],
            span: [span(axes.xlim), span(axes.ylim), span(axes.zlim)],
            rows,
            u: [0.0, 1.0],
            v: [0.0, 1.0],
            frame,
        };

        let mut u = [f64::INFINITY, f64::NEG_INFINITY];
        let mut v = [f64::INFINITY, f64::NEG_INFINITY];
        for corner in 0..8 {
            let c = [
                if corner & 1 == 0 { -0.5 } else { 0.5 },
                if corner & 2 == 0 { -0.5 } else { 0.5 },
                if corner & 4 == 0 { -0.5 } else { 0.5 },
            ];
            let cu = dot(rows[0], c);
            let cv = dot(rows[1], c);
            u = [u[0].min(cu), u[1].max(cu)];
            v = [v[0].min(cv), v[1].max(cv)];
        }
        if u[1] - u[0] > f64::EPSILON {
            p.u = u;
        }
        if v[1] - v[0] > f64::EPSILON {
            p.v = v;
        }
        p
    }

    /// Projection for shapes placed directly on the figure: x/y are normalized figure units.
    pub fn for_figure(frame: Rect) -> Self {
        Self {
            lo: [0.0, 0.0, 0.0],
            span: [1.0, 1.0, 1.0],
            rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            u: [-0.5, 0.5],
            v: [-0.5, 0.5],
            frame,
        }
    }

    /// Data point in the centered unit cube.
    pub fn normalize(&self, p: Point3) -> [f64; 3] {
        [
            (p.x - self.lo[0]) / self.span[0] - 0.5,
            (p.y - self.lo[1]) / self.span[1] - 0.5,
            (p.z - self.lo[2]) / self.span[2] - 0.5,
        ]
    }

    /// Canvas point and depth (larger is closer to the viewer).
    pub fn project(&self, p: Point3) -> (Point, f64) {
        let n = self.normalize(p);
        let pu = (dot(self.rows[0], n) - self.u[0]) / (self.u[1] - self.u[0]);
        let pv = (dot(self.rows[1], n) - self.v[0]) / (self.v[1] - self.v[0]);
        let f = self.frame;
        (
            euclid::point2(
                f.origin.x + pu * f.size.width,
                f.origin.y + (1.0 - pv) * f.size.height,
            ),
            dot(self.rows[2], n),
        )
    }
}

/// Lambert shading factor for a face through `corners` (data space), two-sided.
pub fn shade(projection: &Projection, corners: &[Point3], lights: &[Light]) -> f64 {
    const AMBIENT: f64 = 0.35;
    if lights.is_empty() || corners.len() < 3 {
        return 1.0;
    }
    let n: Vec<[f64; 3]> = corners.iter().map(|c| projection.normalize(*c)).collect();
    let last = n.len() - 1;
    let d1 = [n[last - 1][0] - n[0][0], n[last - 1][1] - n[0][1], n[last - 1][2] - n[0][2]];
    let d2 = [n[last][0] - n[1][0], n[last][1] - n[1][1], n[last][2] - n[1][2]];
    let normal: Vector3 = euclid::vec3(
        d1[1] * d2[2] - d1[2] * d2[1],
        d1[2] * d2[0] - d1[0] * d2[2],
        d1[0] * d2[1] - d1[1] * d2[0],
    );
    let len = normal.length();
    if len <= f64::EPSILON {
        return 1.0;
    }
    let normal = normal / len;
    let diffuse: f64 = lights
        .iter()
        .map(|l| {
            let dl = l.direction.length();
            if dl <= f64::EPSILON {
                0.0
            } else {
                normal.dot(l.direction / dl).abs()
            }
        })
        .sum();
    (AMBIENT + (1.0 - AMBIENT) * diffuse).min(1.0)
}
