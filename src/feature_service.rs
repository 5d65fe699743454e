use std::sync::LazyLock;

use derivative::Derivative;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{ConvertError, Result},
    spatial::{
        geometry::{SpatialReference, first_geometry, from_esri_geometry, to_esri_geometry},
        predicate::SpatialFilter,
    },
};

pub const DEFAULT_WHERE: &str = "1=1";
pub const SPATIAL_REL_INTERSECTS: &str = "esriSpatialRelIntersects";
pub const GEOMETRY_TYPE_POLYGON: &str = "esriGeometryPolygon";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutStatistic {
    pub on_statistic_field: Box<str>,
    pub statistic_type: Box<str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_statistic_field_name: Option<Box<str>>,
}

/// ArcGIS FeatureServer query parameters.
///
/// Field order is the order of the generated query string.
#[derive(Derivative)]
#[derivative(Default)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureServiceQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_fields: Option<Box<str>>,
    #[serde(skip_serializing_if = "Vec::is_empty", with = "out_statistics_json")]
    pub out_statistics: Vec<OutStatistic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<Box<str>>,
    #[derivative(Default(value = "DEFAULT_WHERE.into()"))]
    #[serde(rename = "where")]
    pub where_clause: Box<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial_rel: Option<Box<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry_type: Option<Box<str>>,
    #[serde(rename = "inSR", skip_serializing_if = "Option::is_none")]
    pub in_sr: Option<Box<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Box<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by_fields_for_statistics: Option<Box<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by_fields: Option<Box<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_record_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_pagination: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_count_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_distinct_values: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_geometry: Option<bool>,
}

impl FeatureServiceQuery {
    pub fn new(table_name: &str) -> Self {
        FeatureServiceQuery {
            table_name: Some(table_name.into()),
            ..Default::default()
        }
    }

    /// True when `where` carries no predicate (`1=1`, any spacing).
    pub fn has_default_where(&self) -> bool {
        let compact = WHITESPACE.replace_all(self.where_clause.trim(), "");
        compact.is_empty() || compact == DEFAULT_WHERE
    }

    /// Sets `geometry`, `geometryType`, `spatialRel` and `inSR` from a GeoJSON filter.
    pub fn set_spatial_filter(&mut self, filter: &SpatialFilter) -> Result<()> {
        let esri = to_esri_geometry(&filter.geometry)?;
        self.geometry = Some(serde_json::to_string(&esri)?.into());
        self.geometry_type = Some(GEOMETRY_TYPE_POLYGON.into());
        self.spatial_rel = Some(SPATIAL_REL_INTERSECTS.into());
        self.in_sr = Some(serde_json::to_string(&SpatialReference { wkid: filter.srid })?.into());
        Ok(())
    }

    /// Reads `geometry` (Esri rings or GeoJSON) and `inSR` back into a filter.
    pub fn spatial_filter(&self) -> Result<Option<SpatialFilter>> {
        let raw = match self.geometry.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };
        let value: Value = serde_json::from_str(raw)?;
        let geometry = if value.get("rings").is_some() {
            from_esri_geometry(&value)?
        } else {
            first_geometry(value)?
        };
        let srid = SpatialReference::from_in_sr(self.in_sr.as_deref())?.wkid;
        Ok(Some(SpatialFilter { geometry, srid }))
    }

    fn query_pairs(&self) -> Result<Vec<(&'static str, String)>> {
        let mut pairs = Vec::new();
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                pairs.push((key, value));
            }
        };
        push("outFields", self.out_fields.as_deref().map(String::from));
        push(
            "outStatistics",
            if self.out_statistics.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&self.out_statistics)?)
            },
        );
        push("tableName", self.table_name.as_deref().map(String::from));
        push("where", Some(self.where_clause.to_string()));
        push("spatialRel", self.spatial_rel.as_deref().map(String::from));
        push("geometryType", self.geometry_type.as_deref().map(String::from));
        push("inSR", self.in_sr.as_deref().map(String::from));
        push("geometry", self.geometry.as_deref().map(String::from));
        push(
            "groupByFieldsForStatistics",
            self.group_by_fields_for_statistics.as_deref().map(String::from),
        );
        push("orderByFields", self.order_by_fields.as_deref().map(String::from));
        push("resultRecordCount", self.result_record_count.map(|v| v.to_string()));
        push("resultOffset", self.result_offset.map(|v| v.to_string()));
        push("supportsPagination", self.supports_pagination.map(|v| v.to_string()));
        push("returnCountOnly", self.return_count_only.map(|v| v.to_string()));
        push("returnDistinctValues", self.return_distinct_values.map(|v| v.to_string()));
        push("returnGeometry", self.return_geometry.map(|v| v.to_string()));
        Ok(pairs)
    }

    /// `?key=value&...` projection, values pasted as they are.
    pub fn to_query_string(&self) -> Result<String> {
        Ok(format!(
            "?{}",
            self.query_pairs()?
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<String>>()
                .join("&")
        ))
    }
}

/// `outStatistics` travels as a JSON encoded string, arrays are accepted on input too.
mod out_statistics_json {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::OutStatistic;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        List(Vec<OutStatistic>),
    }

    pub fn serialize<S: Serializer>(
        statistics: &[OutStatistic],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let text = serde_json::to_string(statistics).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<OutStatistic>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(Vec::new()),
            Some(Raw::List(statistics)) => Ok(statistics),
            Some(Raw::Text(text)) if text.trim().is_empty() => Ok(Vec::new()),
            Some(Raw::Text(text)) => serde_json::from_str(&text).map_err(D::Error::custom),
        }
    }
}

impl TryFrom<&str> for FeatureServiceQuery {
    type Error = ConvertError;

    fn try_from(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::spatial::predicate::SpatialFilter;

    use super::{FeatureServiceQuery, OutStatistic};

    #[test]
    fn test_default_where() {
        let fs = FeatureServiceQuery::default();
        assert_eq!(fs.where_clause, "1=1".into());
        assert!(fs.has_default_where());

        let fs = FeatureServiceQuery {
            where_clause: " 1 = 1 ".into(),
            ..Default::default()
        };
        assert!(fs.has_default_where());

        let fs = FeatureServiceQuery {
            where_clause: "a=1".into(),
            ..Default::default()
        };
        assert!(!fs.has_default_where());
    }

    #[test]
    fn test_query_string() {
        let fs = FeatureServiceQuery {
            out_fields: Some("*".into()),
            table_name: Some("X".into()),
            order_by_fields: Some("y desc".into()),
            ..Default::default()
        };
        assert_eq!(
            fs.to_query_string().expect("query"),
            "?outFields=*&tableName=X&where=1=1&orderByFields=y desc"
        );

        let fs = FeatureServiceQuery {
            out_fields: Some("*".into()),
            table_name: Some("X".into()),
            result_record_count: Some(20),
            supports_pagination: Some(true),
            return_geometry: Some(false),
            ..Default::default()
        };
        assert_eq!(
            fs.to_query_string().expect("query"),
            "?outFields=*&tableName=X&where=1=1&resultRecordCount=20&supportsPagination=true&returnGeometry=false"
        );
    }

    #[test]
    fn test_out_statistics_json() {
        let fs = FeatureServiceQuery {
            table_name: Some("tabla".into()),
            out_statistics: vec![OutStatistic {
                on_statistic_field: "FIELD".into(),
                statistic_type: "count".into(),
                out_statistic_field_name: Some("OUTFIELD".into()),
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&fs).expect("json");
        assert_eq!(
            json,
            json!({
                "outStatistics": "[{\"onStatisticField\":\"FIELD\",\"statisticType\":\"count\",\"outStatisticFieldName\":\"OUTFIELD\"}]",
                "tableName": "tabla",
                "where": "1=1"
            })
        );
        let back: FeatureServiceQuery = serde_json::from_value(json).expect("json");
        assert_eq!(back, fs);

        let from_array: FeatureServiceQuery = serde_json::from_value(json!({
            "tableName": "tabla",
            "outStatistics": [{"onStatisticField": "FIELD", "statisticType": "count", "outStatisticFieldName": "OUTFIELD"}]
        }))
        .expect("json");
        assert_eq!(from_array, fs);
    }

    #[test]
    fn test_spatial_filter() {
        let mut fs = FeatureServiceQuery::new("tabla");
        assert_eq!(fs.spatial_filter().expect("filter"), None);

        let filter = SpatialFilter {
            geometry: json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 1], [0, 0]]]}),
            srid: 3857,
        };
        fs.set_spatial_filter(&filter).expect("filter");
        assert_eq!(
            fs.geometry.as_deref(),
            Some(r#"{"type":"polygon","rings":[[[0,0],[1,1],[0,0]]]}"#)
        );
        assert_eq!(fs.geometry_type.as_deref(), Some("esriGeometryPolygon"));
        assert_eq!(fs.spatial_rel.as_deref(), Some("esriSpatialRelIntersects"));
        assert_eq!(fs.in_sr.as_deref(), Some(r#"{"wkid":3857}"#));
        assert_eq!(fs.spatial_filter().expect("filter"), Some(filter));
    }

    #[test]
    fn test_try_from_json() {
        let fs = FeatureServiceQuery::try_from(
            r#"{"tableName":"tabla","outFields":"a,b","returnCountOnly":true,"resultRecordCount":5}"#,
        )
        .expect("json");
        assert_eq!(fs.table_name.as_deref(), Some("tabla"));
        assert_eq!(fs.where_clause, "1=1".into());
        assert_eq!(fs.return_count_only, Some(true));
        assert_eq!(fs.result_record_count, Some(5));
        assert!(FeatureServiceQuery::try_from("{").is_err());
    }
}
