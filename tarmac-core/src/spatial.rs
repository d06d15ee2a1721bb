//! Distances, local projection and nearest-node lookup

use geo::{Distance, Haversine, Point};
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::config::SpatialIndexKind;
use crate::model::Node;

/// Mean earth radius used by [`Haversine`], metres.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in metres.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Haversine.distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Equirectangular projection around a reference coordinate.
///
/// Accurate to well below a metre over an airport-sized area, which is what
/// the clustering radii need. Coordinates are `[east, north]` in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    lat0: f64,
    lon0: f64,
    cos_lat0: f64,
}

impl LocalProjection {
    pub fn new(lat0: f64, lon0: f64) -> Self {
        Self {
            lat0,
            lon0,
            cos_lat0: lat0.to_radians().cos(),
        }
    }

    /// Projection centred on the mean of `coords`, `None` if empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn around(coords: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let (mut lat, mut lon, mut n) = (0.0, 0.0, 0usize);
        for (la, lo) in coords {
            lat += la;
            lon += lo;
            n += 1;
        }
        (n > 0).then(|| Self::new(lat / n as f64, lon / n as f64))
    }

    pub fn project(&self, lat: f64, lon: f64) -> [f64; 2] {
        [
            EARTH_RADIUS_M * (lon - self.lon0).to_radians() * self.cos_lat0,
            EARTH_RADIUS_M * (lat - self.lat0).to_radians(),
        ]
    }
}

/// Lookup of the node closest to a coordinate.
///
/// Returns the position of the node in the slice the index was built from
/// and its great-circle distance in metres, or `None` when no node lies
/// within the index's link distance.
pub trait NearestNode: Sync {
    fn nearest(&self, lat: f64, lon: f64) -> Option<(usize, f64)>;
}

/// Linear scan over all nodes. Ties resolve to the earlier node.
#[derive(Debug, Clone)]
pub struct BruteForceIndex {
    coords: Vec<(f64, f64)>,
    max_distance_m: f64,
}

impl BruteForceIndex {
    pub fn new(nodes: &[Node], max_distance_m: f64) -> Self {
        Self {
            coords: nodes.iter().map(|n| (n.lat, n.lon)).collect(),
            max_distance_m,
        }
    }
}

impl NearestNode for BruteForceIndex {
    fn nearest(&self, lat: f64, lon: f64) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, &(nlat, nlon)) in self.coords.iter().enumerate() {
            let d = haversine_m(lat, lon, nlat, nlon);
            if d <= self.max_distance_m && best.is_none_or(|(_, top)| d < top) {
                best = Some((idx, d));
            }
        }
        best
    }
}

type IndexedCoord = GeomWithData<[f64; 2], usize>;

/// R-tree over projected node centroids.
pub struct RTreeIndex {
    tree: RTree<IndexedCoord>,
    projection: LocalProjection,
    coords: Vec<(f64, f64)>,
    max_distance_m: f64,
}

impl RTreeIndex {
    pub fn new(nodes: &[Node], max_distance_m: f64) -> Self {
        let coords: Vec<(f64, f64)> = nodes.iter().map(|n| (n.lat, n.lon)).collect();
        let projection =
            LocalProjection::around(coords.iter().copied()).unwrap_or(LocalProjection::new(0.0, 0.0));
        let entries = coords
            .iter()
            .enumerate()
            .map(|(idx, &(lat, lon))| IndexedCoord::new(projection.project(lat, lon), idx))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            projection,
            coords,
            max_distance_m,
        }
    }
}

impl NearestNode for RTreeIndex {
    fn nearest(&self, lat: f64, lon: f64) -> Option<(usize, f64)> {
        let query = self.projection.project(lat, lon);
        let hit = self.tree.nearest_neighbor(&query)?;
        let (nlat, nlon) = self.coords[hit.data];
        let d = haversine_m(lat, lon, nlat, nlon);
        (d <= self.max_distance_m).then_some((hit.data, d))
    }
}

/// Builds the configured index over `nodes`.
pub fn build_index(
    kind: SpatialIndexKind,
    nodes: &[Node],
    max_distance_m: f64,
) -> Box<dyn NearestNode> {
    match kind {
        SpatialIndexKind::Rtree => Box::new(RTreeIndex::new(nodes, max_distance_m)),
        SpatialIndexKind::BruteForce => Box::new(BruteForceIndex::new(nodes, max_distance_m)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DetectionStrategy, NodeStats, NodeType};

    fn node(lat: f64, lon: f64) -> Node {
        Node {
            id: format!("n{lat}_{lon}"),
            node_type: NodeType::Taxiway,
            lat,
            lon,
            support_count: 1,
            stats: NodeStats::Taxiway { point_count: 1 },
            strategy: DetectionStrategy::DwellBased,
        }
    }

    #[test]
    fn projection_matches_haversine_locally() {
        let projection = LocalProjection::new(51.47, -0.45);
        let a = projection.project(51.47, -0.45);
        let b = projection.project(51.4709, -0.4485);
        let planar = ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt();
        let great_circle = haversine_m(51.47, -0.45, 51.4709, -0.4485);
        assert!((planar - great_circle).abs() < 0.5, "{planar} vs {great_circle}");
    }

    #[test]
    fn indexes_agree() {
        let nodes: Vec<Node> = (0..20)
            .map(|i| node(51.47 + f64::from(i) * 0.0007, -0.45 + f64::from(i % 5) * 0.0011))
            .collect();
        let brute = BruteForceIndex::new(&nodes, 1_000.0);
        let rtree = RTreeIndex::new(&nodes, 1_000.0);
        for i in 0..40 {
            let lat = 51.4695 + f64::from(i) * 0.00037;
            let lon = -0.4503 + f64::from(i % 7) * 0.0008;
            let (_, a) = brute.nearest(lat, lon).unwrap();
            let (_, b) = rtree.nearest(lat, lon).unwrap();
            assert!((a - b).abs() < 0.1, "query {lat},{lon}: {a} vs {b}");
        }
    }

    #[test]
    fn link_distance_limits_matches() {
        let nodes = vec![node(0.0, 0.0)];
        let index = RTreeIndex::new(&nodes, 100.0);
        assert!(index.nearest(0.0005, 0.0).is_some());
        assert!(index.nearest(0.01, 0.0).is_none());
        assert!(BruteForceIndex::new(&[], 100.0).nearest(0.0, 0.0).is_none());
        assert!(RTreeIndex::new(&[], 100.0).nearest(0.0, 0.0).is_none());
    }
}
