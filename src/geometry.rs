//! `AreaGeometry`: the Polygon/MultiPolygon normal-form union the spec
//! requires (§3, I5), plus ring-normalization and winding helpers that
//! feed the `geo` crate — the Geometry Kernel collaborator (§6).

use geo::{BooleanOps, BoundingRect, Coord, LineString, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// An area's geometry: a single polygon, or (for non-leaf areas whose
/// explicit children are not mutually adjacent in a way that collapses
/// to one ring) several. I5 pins leaf-level areas to the `Polygon` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AreaGeometry {
    Polygon(PolygonDef),
    MultiPolygon(Vec<PolygonDef>),
}

/// A serializable `[lng, lat]`-ring polygon: one exterior ring (CCW) and
/// zero or more interior rings / holes (CW), all explicitly closed (I6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonDef {
    pub exterior: Vec<[f64; 2]>,
    pub interiors: Vec<Vec<[f64; 2]>>,
}

impl PolygonDef {
    pub fn new(exterior: Vec<[f64; 2]>, interiors: Vec<Vec<[f64; 2]>>) -> Self {
        Self { exterior, interiors }
    }

    pub(crate) fn to_geo(&self) -> Polygon<f64> {
        Polygon::new(ring_to_linestring(&self.exterior), self.interiors.iter().map(|r| ring_to_linestring(r)).collect())
    }

    fn from_geo(poly: &Polygon<f64>) -> Self {
        Self {
            exterior: linestring_to_ring(poly.exterior()),
            interiors: poly.interiors().iter().map(linestring_to_ring).collect(),
        }
    }
}

fn ring_to_linestring(ring: &[[f64; 2]]) -> LineString<f64> {
    LineString::from(ring.iter().map(|[lng, lat]| Coord { x: *lng, y: *lat }).collect::<Vec<_>>())
}

fn linestring_to_ring(ls: &LineString<f64>) -> Vec<[f64; 2]> {
    ls.coords().map(|c| [c.x, c.y]).collect()
}

impl AreaGeometry {
    pub fn to_geo(&self) -> MultiPolygon<f64> {
        match self {
            AreaGeometry::Polygon(p) => MultiPolygon(vec![p.to_geo()]),
            AreaGeometry::MultiPolygon(ps) => MultiPolygon(ps.iter().map(PolygonDef::to_geo).collect()),
        }
    }

    /// Normal-form conversion: a `MultiPolygon` that happens to hold
    /// exactly one polygon collapses to the `Polygon` arm (§4.4).
    pub fn from_geo(mp: MultiPolygon<f64>) -> Self {
        let polys: Vec<PolygonDef> = mp.0.iter().map(PolygonDef::from_geo).collect();
        match polys.len() {
            1 => AreaGeometry::Polygon(polys.into_iter().next().unwrap()),
            _ => AreaGeometry::MultiPolygon(polys),
        }
    }

    pub fn from_single(poly: Polygon<f64>) -> Self {
        AreaGeometry::Polygon(PolygonDef::from_geo(&poly))
    }

    pub fn is_single_polygon(&self) -> bool {
        matches!(self, AreaGeometry::Polygon(_))
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.to_geo().bounding_rect()
    }
}

/// Unions `geometries` through `geo`'s `BooleanOps`, returning the
/// collapsed normal form (I3, I5).
pub fn union_all(geometries: impl IntoIterator<Item = AreaGeometry>) -> Option<AreaGeometry> {
    let unioned = geometries
        .into_iter()
        .map(|g| g.to_geo())
        .reduce(|a, b| a.union(&b))?;
    Some(AreaGeometry::from_geo(unioned))
}

/// Closes an open ring (repeats the first vertex) if it isn't already closed.
pub fn close_ring(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let mut out = points.to_vec();
    if out.first() != out.last() {
        out.push(out[0]);
    }
    out
}

/// Signed area of a (closed) ring, in squared degrees. Positive = CCW.
pub fn signed_area(ring: &[[f64; 2]]) -> f64 {
    let mut sum = 0.0;
    for w in ring.windows(2) {
        let [x0, y0] = w[0];
        let [x1, y1] = w[1];
        sum += x0 * y1 - x1 * y0;
    }
    sum / 2.0
}

/// Returns `ring` re-wound so its signed area matches `ccw`.
pub fn wind(ring: Vec<[f64; 2]>, ccw: bool) -> Vec<[f64; 2]> {
    let is_ccw = signed_area(&ring) > 0.0;
    if is_ccw == ccw {
        ring
    } else {
        let mut reversed = ring;
        reversed.reverse();
        reversed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<[f64; 2]> {
        vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]
    }

    #[test]
    fn close_ring_repeats_first_vertex() {
        let open = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        let closed = close_ring(&open);
        assert_eq!(closed.first(), closed.last());
        assert_eq!(closed.len(), 4);
    }

    #[test]
    fn close_ring_is_noop_if_already_closed() {
        let square = unit_square();
        assert_eq!(close_ring(&square), square);
    }

    #[test]
    fn signed_area_of_unit_square_is_one() {
        assert!((signed_area(&unit_square()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn wind_reverses_when_needed() {
        let cw: Vec<[f64; 2]> = unit_square().into_iter().rev().collect();
        assert!(signed_area(&cw) < 0.0);
        let rewound = wind(cw, true);
        assert!(signed_area(&rewound) > 0.0);
    }

    #[test]
    fn round_trip_through_geo() {
        let square = PolygonDef::new(unit_square(), vec![]);
        let geom = AreaGeometry::Polygon(square.clone());
        let back = AreaGeometry::from_geo(geom.to_geo());
        assert_eq!(geom, back);
    }

    #[test]
    fn union_of_two_halves_collapses_to_polygon() {
        let left = PolygonDef::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]], vec![]);
        let right = PolygonDef::new(vec![[1.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [1.0, 0.0]], vec![]);
        let union = union_all([AreaGeometry::Polygon(left), AreaGeometry::Polygon(right)]).unwrap();
        assert!(union.is_single_polygon());
    }
}
