//! GeoJSON and JSON rendering of an inferred graph

use geo::LineString;
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use serde::Serialize;
use serde_json::json;

use crate::Error;
use crate::model::{Edge, GraphStats, Node, NodeStats, QualityReport, TopologyGraph};

/// One `Point` feature per node followed by one `LineString` feature per
/// edge, in graph order.
pub fn to_feature_collection(graph: &TopologyGraph) -> Result<FeatureCollection, Error> {
    let mut features = Vec::with_capacity(graph.node_count() + graph.edge_count());
    for node in graph.nodes() {
        features.push(node_feature(node)?);
    }
    for edge in graph.edges() {
        let (Some(a), Some(b)) = (graph.node(&edge.node_a), graph.node(&edge.node_b)) else {
            continue;
        };
        features.push(edge_feature(edge, a, b)?);
    }

    Ok(FeatureCollection {
        features,
        bbox: None,
        foreign_members: None,
    })
}

pub fn to_geojson_string(graph: &TopologyGraph) -> Result<String, Error> {
    serde_json::to_string(&to_feature_collection(graph)?)
        .map_err(|e| Error::GeoJsonError(e.to_string()))
}

/// The JSON document written for downstream consumers.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub graph: &'a TopologyGraph,
    pub stats: GraphStats,
    pub quality: &'a QualityReport,
}

impl<'a> Report<'a> {
    pub fn new(graph: &'a TopologyGraph, quality: &'a QualityReport) -> Self {
        Self {
            graph,
            stats: graph.stats(),
            quality,
        }
    }

    pub fn to_json_string(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn node_feature(node: &Node) -> Result<Feature, Error> {
    let geometry = Geometry::new(GeoJsonValue::from(&node.geometry()));
    let mut properties = json!({
        "feature_type": "node",
        "id": node.id,
        "node_type": node.node_type,
        "support_count": node.support_count,
        "strategy": node.strategy,
    });
    match node.stats {
        NodeStats::Stand { avg_dwell_seconds } => {
            properties["avg_dwell_seconds"] = json!(avg_dwell_seconds);
        }
        NodeStats::Taxiway { point_count } => {
            properties["point_count"] = json!(point_count);
        }
        NodeStats::Runway {
            avg_speed,
            avg_heading,
        } => {
            properties["avg_speed"] = json!(avg_speed);
            properties["avg_heading"] = json!(avg_heading);
        }
    }

    let value = json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": properties,
    });
    serde_json::from_value::<Feature>(value).map_err(|e| Error::GeoJsonError(e.to_string()))
}

fn edge_feature(edge: &Edge, a: &Node, b: &Node) -> Result<Feature, Error> {
    let line = LineString::from(vec![(a.lon, a.lat), (b.lon, b.lat)]);
    let geometry = Geometry::new(GeoJsonValue::from(&line));

    let value = json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": {
            "feature_type": "edge",
            "node_a": edge.node_a,
            "node_b": edge.node_b,
            "distance_m": edge.distance_m,
            "usage_count": edge.usage_count,
            "edge_types": edge.edge_types,
        }
    });
    serde_json::from_value::<Feature>(value).map_err(|e| Error::GeoJsonError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DetectionStrategy, NodeType};

    fn graph() -> TopologyGraph {
        let node = |id: &str, node_type, lat: f64, stats| Node {
            id: id.to_string(),
            node_type,
            lat,
            lon: 8.55,
            support_count: 3,
            stats,
            strategy: DetectionStrategy::DwellBased,
        };
        let nodes = vec![
            node("stand-d-0001", NodeType::Stand, 47.450, NodeStats::Stand { avg_dwell_seconds: 900.0 }),
            node("taxiway-0001", NodeType::Taxiway, 47.452, NodeStats::Taxiway { point_count: 12 }),
            node(
                "runway-0001",
                NodeType::Runway,
                47.460,
                NodeStats::Runway {
                    avg_speed: 60.0,
                    avg_heading: Some(280.0),
                },
            ),
        ];
        let edges = vec![Edge {
            node_a: "stand-d-0001".into(),
            node_b: "taxiway-0001".into(),
            distance_m: 222.4,
            usage_count: 4,
            edge_types: Default::default(),
        }];
        TopologyGraph::new(nodes, edges).unwrap()
    }

    #[test]
    fn one_feature_per_node_and_edge() {
        let collection = to_feature_collection(&graph()).unwrap();
        assert_eq!(collection.features.len(), 4);

        let value = serde_json::to_value(&collection).unwrap();
        let features = value["features"].as_array().unwrap();
        let kinds: Vec<&str> = features
            .iter()
            .map(|f| f["properties"]["feature_type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["node", "node", "node", "edge"]);

        let edge = &features[3];
        assert_eq!(edge["properties"]["usage_count"], 4);
        assert_eq!(edge["geometry"]["type"], "LineString");
        assert_eq!(edge["geometry"]["coordinates"].as_array().unwrap().len(), 2);
        // nodes come out in id order
        assert_eq!(features[0]["properties"]["id"], "runway-0001");
        assert_eq!(features[0]["properties"]["avg_heading"], 280.0);
    }

    #[test]
    fn report_serializes_graph_stats_and_quality() {
        let graph = graph();
        let quality = QualityReport::default();
        let text = Report::new(&graph, &quality).to_json_string().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["stats"]["node_count"], 3);
        assert_eq!(value["stats"]["isolated_nodes"], 1);
        assert!(value["graph"]["nodes"]["runway-0001"].is_object());
        assert_eq!(value["quality"]["records_seen"], 0);
    }

    #[test]
    fn geojson_string_parses_back() {
        let text = to_geojson_string(&graph()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
    }
}
