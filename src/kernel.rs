//! Geometry-kernel glue (§4.5, §6): whisker removal, the chord/half-plane
//! line-split construction, and epsilon-based vertex rewriting for
//! `sharedEdgeMove`. This module is direct use of `geo`'s `BooleanOps` —
//! the "standard 2D polygon library" the design assumes is available —
//! not a reimplementation of a kernel.

use geo::{BooleanOps, BoundingRect, Coord, Intersects, LineString, Point, Polygon};

use crate::geometry::{AreaGeometry, PolygonDef};

const COINCIDENT_TOLERANCE: f64 = 1e-8;
const BACKTRACK_DOT_THRESHOLD: f64 = -0.99;

/// Drops runs of consecutive coincident points, then iteratively drops
/// any interior vertex whose adjacent edges reverse direction (a
/// hand-drawn cut backtracking on itself), until stable (§4.5 Whisker
/// Removal). Deliberately approximate — see spec §9.
pub fn remove_whiskers(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut current = dedup_consecutive(points);

    loop {
        let Some(i) = find_backtrack(&current) else { break };
        current.remove(i);
    }

    current
}

fn dedup_consecutive(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for &p in points {
        if out.last().is_none_or(|&last| dist(last, p) > COINCIDENT_TOLERANCE) {
            out.push(p);
        }
    }
    out
}

/// Drops consecutive coincident points from a hand-drawn loop (used by
/// `carveInnerChild`/`punchHole`), also collapsing a closing repeat of
/// the first vertex if the caller included one.
pub fn dedup_loop(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out = dedup_consecutive(points);
    if out.len() > 1 && dist(out[0], *out.last().unwrap()) <= COINCIDENT_TOLERANCE {
        out.pop();
    }
    out
}

/// Whether `point` (`[lng, lat]`) lies inside or on the boundary of `geometry`.
pub fn point_in_geometry(geometry: &AreaGeometry, point: [f64; 2]) -> bool {
    geometry.to_geo().intersects(&Point::new(point[0], point[1]))
}

fn find_backtrack(points: &[(f64, f64)]) -> Option<usize> {
    if points.len() < 3 {
        return None;
    }
    for i in 1..points.len() - 1 {
        let prev = points[i - 1];
        let cur = points[i];
        let next = points[i + 1];
        let d1 = unit(sub(cur, prev));
        let d2 = unit(sub(next, cur));
        let (Some(d1), Some(d2)) = (d1, d2) else { continue };
        if dot(d1, d2) < BACKTRACK_DOT_THRESHOLD {
            return Some(i);
        }
    }
    None
}

fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn sub(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 - b.0, a.1 - b.1)
}

fn unit(v: (f64, f64)) -> Option<(f64, f64)> {
    let len = (v.0 * v.0 + v.1 * v.1).sqrt();
    if len < f64::EPSILON {
        None
    } else {
        Some((v.0 / len, v.1 / len))
    }
}

fn dot(a: (f64, f64), b: (f64, f64)) -> f64 {
    a.0 * b.0 + a.1 * b.1
}

/// Splits `target` by extending `line` (lng/lat points, at least two) to
/// a long chord and intersecting the two half-plane polygons it forms
/// with `target` (§4.5). Returns every non-empty piece from both sides;
/// an empty result means the line did not cut the target.
pub fn split_by_line(target: &AreaGeometry, line: &[[f64; 2]]) -> Vec<Polygon<f64>> {
    let target_geo = target.to_geo();
    let Some(bbox) = target_geo.bounding_rect() else { return Vec::new() };

    let Some((p0, p1)) = chord_endpoints(line) else { return Vec::new() };

    let diagonal = dist((bbox.min().x, bbox.min().y), (bbox.max().x, bbox.max().y)).max(1e-9);
    let reach = diagonal * 1000.0;

    let dir = unit((p1[0] - p0[0], p1[1] - p0[1]));
    let Some(dir) = dir else { return Vec::new() };
    let normal = (-dir.1, dir.0);

    let far0 = [p0[0] - dir.0 * reach, p0[1] - dir.1 * reach];
    let far1 = [p1[0] + dir.0 * reach, p1[1] + dir.1 * reach];

    let mut pieces = Vec::new();
    for sign in [1.0, -1.0] {
        let offset = [normal.0 * reach * sign, normal.1 * reach * sign];
        let half_plane = rectangle_polygon(&[
            far0,
            far1,
            [far1[0] + offset[0], far1[1] + offset[1]],
            [far0[0] + offset[0], far0[1] + offset[1]],
        ]);
        let intersection = target_geo.intersection(&geo::MultiPolygon(vec![half_plane]));
        for poly in intersection.0 {
            if poly.exterior().0.len() >= 4 {
                pieces.push(poly);
            }
        }
    }
    pieces
}

/// First and last points of `line` as `[lng, lat]`, or `None` if the
/// line has fewer than two points.
fn chord_endpoints(line: &[[f64; 2]]) -> Option<([f64; 2], [f64; 2])> {
    let first = *line.first()?;
    let last = *line.last()?;
    Some((first, last))
}

fn rectangle_polygon(corners: &[[f64; 2]; 4]) -> Polygon<f64> {
    let mut ring: Vec<Coord<f64>> = corners.iter().map(|[x, y]| Coord { x: *x, y: *y }).collect();
    ring.push(ring[0]);
    Polygon::new(LineString(ring), vec![])
}

/// Replaces every coordinate within `epsilon` of `target` with
/// `replacement`, across the exterior and all interior rings of
/// `polygon`. Returns true if anything was replaced.
pub fn replace_coincident_vertices(polygon: &mut PolygonDef, target: [f64; 2], replacement: [f64; 2], epsilon: f64) -> bool {
    let mut changed = false;
    changed |= replace_in_ring(&mut polygon.exterior, target, replacement, epsilon);
    for ring in &mut polygon.interiors {
        changed |= replace_in_ring(ring, target, replacement, epsilon);
    }
    changed
}

fn replace_in_ring(ring: &mut [[f64; 2]], target: [f64; 2], replacement: [f64; 2], epsilon: f64) -> bool {
    let mut changed = false;
    for coord in ring.iter_mut() {
        if dist((coord[0], coord[1]), (target[0], target[1])) <= epsilon {
            *coord = replacement;
            changed = true;
        }
    }
    changed
}
