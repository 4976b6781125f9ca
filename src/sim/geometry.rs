//! Geometry kernel
//!
//! Pure functions over `Vec2`: segment and polygon intersection, containment,
//! closest points and ray/circle hits. Nothing here holds state.

use glam::Vec2;

/// Signed orientation of `c` relative to the directed line `a -> b`
///
/// Positive when `c` lies counter-clockwise of the line (in math orientation).
#[inline]
pub fn orientation(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b - a).perp_dot(c - a)
}

/// Proper intersection test between segments `ab` and `cd`
///
/// Touching at an endpoint or running collinear does not count, so a path
/// that ends exactly on a polygon vertex is not considered blocked by the
/// edges meeting there.
pub fn segments_intersect(a: Vec2, b: Vec2, c: Vec2, d: Vec2) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    o1 * o2 < 0.0 && o3 * o4 < 0.0
}

/// Ray-casting point-in-polygon test
pub fn point_in_polygon(p: Vec2, poly: &[Vec2]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (vi, vj) = (poly[i], poly[j]);
        if (vi.y > p.y) != (vj.y > p.y) {
            let cross_x = (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x;
            if p.x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Closest point to `p` on segment `ab`
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-8 {
        return a; // Degenerate segment
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Distance from `p` to segment `ab`
#[inline]
pub fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    p.distance(closest_point_on_segment(p, a, b))
}

/// Closest point to `p` on the boundary of a polygon ring
pub fn closest_point_on_polygon(p: Vec2, poly: &[Vec2]) -> Option<Vec2> {
    let n = poly.len();
    (0..n)
        .map(|i| closest_point_on_segment(p, poly[i], poly[(i + 1) % n]))
        .min_by(|a, b| a.distance_squared(p).total_cmp(&b.distance_squared(p)))
}

/// Whether segment `ab` passes through the interior of a polygon
///
/// The segment is split wherever it meets the boundary, including contacts
/// at vertices and collinear overlaps, and the middle of every piece is
/// tested for containment. Grazing a vertex from outside does not count.
pub fn segment_intersects_polygon(a: Vec2, b: Vec2, poly: &[Vec2]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut cuts = vec![0.0, 1.0];
    for i in 0..n {
        let (c, d) = (poly[i], poly[(i + 1) % n]);
        if segments_intersect(a, b, c, d) {
            return true;
        }
        contact_params(a, b, c, d, &mut cuts);
    }
    cuts.sort_by(f32::total_cmp);
    cuts.windows(2).any(|w| {
        let mid = a + (b - a) * ((w[0] + w[1]) * 0.5);
        w[1] - w[0] > 1e-6 && strictly_inside(mid, poly)
    })
}

/// Inside the ring and not on its boundary
fn strictly_inside(p: Vec2, poly: &[Vec2]) -> bool {
    point_in_polygon(p, poly)
        && closest_point_on_polygon(p, poly).is_some_and(|q| q.distance_squared(p) > 1e-6)
}

/// Parameters along `ab` where it touches segment `cd`, pushed onto `out`
fn contact_params(a: Vec2, b: Vec2, c: Vec2, d: Vec2, out: &mut Vec<f32>) {
    const EPS: f32 = 1e-5;
    let r = b - a;
    let s = d - c;
    let len_sq = r.length_squared();
    if len_sq < 1e-12 {
        return;
    }
    let ac = c - a;
    let denom = r.perp_dot(s);

    if denom.abs() > EPS * r.length() * s.length() {
        let t = ac.perp_dot(s) / denom;
        let u = ac.perp_dot(r) / denom;
        let on = |x: f32| (-EPS..=1.0 + EPS).contains(&x);
        if on(t) && on(u) {
            out.push(t.clamp(0.0, 1.0));
        }
    } else if orientation(a, b, c).abs() <= 1e-3 * r.length() {
        // Collinear: the overlap starts and ends at the projected endpoints
        for p in [c, d] {
            let t = (p - a).dot(r) / len_sq;
            if (0.0..=1.0).contains(&t) {
                out.push(t);
            }
        }
    }
}

/// Distance along a ray to the first point on a circle
///
/// `dir` does not need to be normalized; the result is in multiples of `dir`.
/// Returns `None` when the ray misses or the circle lies entirely behind it.
pub fn ray_circle_intersection(origin: Vec2, dir: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let l = origin - center;
    let a = dir.length_squared();
    if a < 1e-12 {
        return None;
    }
    let b = 2.0 * dir.dot(l);
    let c = l.length_squared() - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let root = disc.sqrt();
    let t1 = (-b - root) / (2.0 * a);
    let t2 = (-b + root) / (2.0 * a);
    if t1 >= 0.0 {
        Some(t1)
    } else if t2 >= 0.0 {
        Some(t2)
    } else {
        None
    }
}

/// Vertex average of a polygon ring
pub fn polygon_centroid(poly: &[Vec2]) -> Vec2 {
    if poly.is_empty() {
        return Vec2::ZERO;
    }
    poly.iter().copied().sum::<Vec2>() / poly.len() as f32
}

/// Push every vertex outward from `center` by `margin`
///
/// Assumes the ring is star-shaped around `center`.
pub fn inflate_polygon(poly: &[Vec2], center: Vec2, margin: f32) -> Vec<Vec2> {
    poly.iter()
        .map(|&v| {
            let offset = v - center;
            let len = offset.length();
            if len < 1e-6 {
                v
            } else {
                center + offset * ((len + margin) / len)
            }
        })
        .collect()
}

/// Regular polygon approximating a circle
pub fn circle_polygon(center: Vec2, radius: f32, points: usize) -> Vec<Vec2> {
    let points = points.max(3);
    (0..points)
        .map(|i| {
            let theta = i as f32 / points as f32 * std::f32::consts::TAU;
            center + Vec2::new(theta.cos(), theta.sin()) * radius
        })
        .collect()
}
