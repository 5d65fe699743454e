use derivative::Derivative;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{ConvertError, Result};

pub const DEFAULT_WKID: i64 = 4326;

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

#[derive(Derivative)]
#[derivative(Default)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    #[derivative(Default(value = "DEFAULT_WKID"))]
    pub wkid: i64,
}

impl SpatialReference {
    /// Reads an ArcGIS `inSR` parameter, either `{"wkid":N}` or a bare `N`.
    pub fn from_in_sr(in_sr: Option<&str>) -> Result<Self> {
        let raw = match in_sr.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(SpatialReference::default()),
        };
        if let Ok(wkid) = raw.parse::<i64>() {
            return Ok(SpatialReference { wkid });
        }
        let value: Value = serde_json::from_str(raw)?;
        match value.get("wkid") {
            None => Ok(SpatialReference::default()),
            Some(wkid) => wkid
                .as_i64()
                .map(|wkid| SpatialReference { wkid })
                .ok_or_else(|| ConvertError::InvalidGeometry(format!("Invalid inSR wkid {wkid}"))),
        }
    }
}

/// Ring based polygon as understood by a FeatureServer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsriGeometry {
    #[serde(rename = "type")]
    pub geometry_type: Box<str>,
    pub rings: Value,
}

fn type_of(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

/// Converts a GeoJSON Polygon or MultiPolygon into Esri rings.
///
/// A MultiPolygon only keeps its first polygon.
pub fn to_esri_geometry(geojson: &Value) -> Result<EsriGeometry> {
    let coordinates = geojson
        .get("coordinates")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    let rings = match type_of(geojson) {
        Some(t) if t.eq_ignore_ascii_case("polygon") => coordinates,
        Some(t) if t.eq_ignore_ascii_case("multipolygon") => coordinates
            .get(0)
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())),
        other => {
            return Err(ConvertError::InvalidGeometry(format!(
                "Geometry type {} not supported",
                other.unwrap_or("unknown")
            )));
        }
    };
    Ok(EsriGeometry {
        geometry_type: "polygon".into(),
        rings,
    })
}

/// Converts an Esri polygon (`rings`) back to a GeoJSON Polygon.
pub fn from_esri_geometry(esri: &Value) -> Result<Value> {
    match esri.get("rings") {
        Some(rings) => Ok(json!({"type": "Polygon", "coordinates": rings})),
        None => Err(ConvertError::InvalidGeometry(
            "Esri geometry without rings".to_string(),
        )),
    }
}

pub fn to_feature_collection(value: Value) -> Result<Value> {
    match type_of(&value) {
        Some("FeatureCollection") => Ok(value),
        Some("Feature") => Ok(json!({"type": "FeatureCollection", "features": [value]})),
        Some(t) if GEOMETRY_TYPES.contains(&t) => Ok(json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "properties": Map::new(), "geometry": value}]
        })),
        other => Err(ConvertError::InvalidGeometry(format!(
            "GeoJSON type {} not supported",
            other.unwrap_or("unknown")
        ))),
    }
}

/// Geometry of the first feature of any GeoJSON input.
pub fn first_geometry(value: Value) -> Result<Value> {
    let collection = to_feature_collection(value)?;
    collection
        .get("features")
        .and_then(|features| features.get(0))
        .and_then(|feature| feature.get("geometry"))
        .filter(|geometry| !geometry.is_null())
        .cloned()
        .ok_or_else(|| ConvertError::InvalidGeometry("Empty FeatureCollection".to_string()))
}
