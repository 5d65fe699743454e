pub mod fs2sql;
pub mod sql2fs;
pub mod sql2sql;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    error::Result,
    feature_service::FeatureServiceQuery,
    geostore::GeostoreClient,
    spatial::{
        geometry::first_geometry,
        predicate::{SpatialColumn, SpatialFilter},
    },
    sql_dialect::{postgres::postgres::Postgres, sql_dialect::SqlDialect},
    sql_parser::{ParserMode, parse_query, parse_query_with, parsed_query::ParsedQuery},
    validator::validate,
};

/// Spatial parameters a request may carry next to its query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geostore: Option<Box<str>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geojson: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fs2SqlRequest {
    #[serde(flatten)]
    pub fs: FeatureServiceQuery,
    #[serde(flatten)]
    pub spatial: SpatialParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sql2FsRequest {
    pub sql: Box<str>,
    #[serde(flatten)]
    pub spatial: SpatialParams,
    #[serde(default)]
    pub exclude_geometries: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sql2SqlRequest {
    pub sql: Box<str>,
    #[serde(flatten)]
    pub spatial: SpatialParams,
    #[serde(default)]
    pub raster: bool,
    #[serde(default)]
    pub experimental: bool,
}

/// Result of a conversion: the emitted query and the tree it was rendered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    /// SQL text, or the FeatureServer query string.
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs: Option<FeatureServiceQuery>,
    #[serde(rename = "jsonSql")]
    pub parsed: ParsedQuery,
}

pub struct Converter {
    geostore: Arc<dyn GeostoreClient>,
    sql_dialect: Box<dyn SqlDialect + Send + Sync>,
}

impl Converter {
    pub fn new(geostore: impl GeostoreClient + 'static) -> Self {
        Converter {
            geostore: Arc::new(geostore),
            sql_dialect: Box::new(Postgres::default()),
        }
    }

    pub fn with_sql_dialect(mut self, sql_dialect: Box<dyn SqlDialect + Send + Sync>) -> Self {
        self.sql_dialect = sql_dialect;
        self
    }

    /// Resolves the geostore, or else the inline GeoJSON, to a local filter.
    async fn resolve_spatial(&self, params: &SpatialParams) -> Result<Option<SpatialFilter>> {
        if let Some(id) = params.geostore.as_deref() {
            debug!(geostore = id, "Resolving geostore");
            let collection = self.geostore.resolve_geostore(id).await?;
            return Ok(Some(SpatialFilter::new(first_geometry(collection)?)));
        }
        match &params.geojson {
            Some(geojson) => Ok(Some(SpatialFilter::new(first_geometry(geojson.clone())?))),
            None => Ok(None),
        }
    }

    pub async fn fs2sql(&self, request: &Fs2SqlRequest) -> Result<Conversion> {
        let spatial = self.resolve_spatial(&request.spatial).await?;
        fs2sql::translate(&request.fs, spatial, self.sql_dialect.as_ref())
    }

    pub async fn sql2fs(&self, request: &Sql2FsRequest) -> Result<Conversion> {
        let parsed = parse_query(&request.sql)?;
        let spatial = self.resolve_spatial(&request.spatial).await?;
        sql2fs::translate(
            parsed,
            spatial,
            request.exclude_geometries,
            self.sql_dialect.as_ref(),
        )
    }

    pub async fn sql2sql(&self, request: &Sql2SqlRequest) -> Result<Conversion> {
        let mode = ParserMode::from_experimental_flag(request.experimental);
        let parsed = parse_query_with(&request.sql, mode)?;
        let spatial = self.resolve_spatial(&request.spatial).await?;
        sql2sql::translate(
            parsed,
            spatial,
            SpatialColumn::from_raster_flag(request.raster),
            self.sql_dialect.as_ref(),
        )
    }

    /// Parses, validates and re-emits `sql`.
    pub fn check_sql(&self, sql: &str) -> Result<Conversion> {
        info!("Checking sql");
        let parsed = parse_query(sql)?;
        validate(&parsed)?;
        Ok(Conversion {
            query: parsed.to_sql(self.sql_dialect.as_ref()),
            fs: None,
            parsed,
        })
    }

    /// Renders a caller supplied query tree.
    pub fn json2sql(&self, parsed: ParsedQuery) -> Result<Conversion> {
        info!("Creating sql from json");
        validate(&parsed)?;
        Ok(Conversion {
            query: parsed.to_sql(self.sql_dialect.as_ref()),
            fs: None,
            parsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::{
        error::ConvertError,
        feature_service::FeatureServiceQuery,
        geostore::{DisabledGeostore, testing::InMemoryGeostore},
        sql_dialect::{postgres::postgres::Postgres, sql_dialect::SqlDialect},
        sql_parser::parse_query,
    };

    use super::{Converter, Fs2SqlRequest, SpatialParams, Sql2FsRequest, Sql2SqlRequest};

    fn geostore_collection() -> serde_json::Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "Polygon", "coordinates": []}
            }]
        })
    }

    fn converter() -> Converter {
        Converter::new(InMemoryGeostore::with("abc", geostore_collection()))
    }

    fn sql2fs_request(sql: &str) -> Sql2FsRequest {
        Sql2FsRequest {
            sql: sql.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sql2fs_plain() {
        let conversion = converter()
            .sql2fs(&sql2fs_request("SELECT * FROM table"))
            .await
            .expect("conversion");
        let fs = conversion.fs.expect("fs");
        assert_eq!(fs.out_fields.as_deref(), Some("*"));
        assert_eq!(fs.table_name.as_deref(), Some("table"));
        assert_eq!(fs.where_clause, "1=1".into());
        assert_eq!(fs.geometry, None);
        assert_eq!(fs.return_count_only, None);
        assert_eq!(conversion.query, "?outFields=*&tableName=table&where=1=1");
    }

    #[tokio::test]
    async fn test_sql2fs_where_limit_order() {
        let conversion = converter()
            .sql2fs(&sql2fs_request("SELECT * FROM t WHERE a=1 ORDER BY b desc LIMIT 10"))
            .await
            .expect("conversion");
        let fs = conversion.fs.expect("fs");
        assert_eq!(fs.where_clause, "a=1".into());
        assert_eq!(fs.order_by_fields.as_deref(), Some("b desc"));
        assert_eq!(fs.result_record_count, Some(10));
        assert_eq!(fs.supports_pagination, Some(true));
    }

    #[tokio::test]
    async fn test_sql2fs_count_star_with_columns() {
        match converter()
            .sql2fs(&sql2fs_request("SELECT count(*), name FROM t"))
            .await
        {
            Err(ConvertError::QueryNotValid(message)) => assert_eq!(
                message,
                "ArcGis does not support count(*) with more columns"
            ),
            other => panic!("Expected QueryNotValid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sql2fs_joins() {
        match converter()
            .sql2fs(&sql2fs_request("SELECT * FROM a, b"))
            .await
        {
            Err(ConvertError::UnsupportedQueryShape(message)) => {
                assert_eq!(message, "Joins not allowed")
            }
            other => panic!("Expected UnsupportedQueryShape, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sql2fs_malformed() {
        assert!(matches!(
            converter().sql2fs(&sql2fs_request("SELECT * FRO t")).await,
            Err(ConvertError::MalformedQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_sql2fs_geostore_overrides_embedded_geometry() {
        let request = Sql2FsRequest {
            sql: "SELECT * FROM t WHERE ST_INTERSECTS(ST_SetSRID(ST_GeomFromGeoJSON('{\"type\":\"Polygon\",\"coordinates\":[[[1,1],[2,2],[1,1]]]}'), 3857), the_geom)".into(),
            spatial: SpatialParams {
                geostore: Some("abc".into()),
                ..Default::default()
            },
            exclude_geometries: true,
        };
        let fs = converter()
            .sql2fs(&request)
            .await
            .expect("conversion")
            .fs
            .expect("fs");
        assert_eq!(fs.geometry.as_deref(), Some(r#"{"type":"polygon","rings":[]}"#));
        assert_eq!(fs.in_sr.as_deref(), Some(r#"{"wkid":4326}"#));
        assert_eq!(fs.where_clause, "1=1".into());
        assert_eq!(fs.return_geometry, Some(false));
    }

    #[tokio::test]
    async fn test_sql2sql_geostore() {
        let request = Sql2SqlRequest {
            sql: "SELECT * FROM t".into(),
            spatial: SpatialParams {
                geostore: Some("abc".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let conversion = converter().sql2sql(&request).await.expect("conversion");
        assert_eq!(
            conversion.query,
            "SELECT * FROM t WHERE ST_INTERSECTS(ST_SetSRID(ST_GeomFromGeoJSON('{\"type\":\"Polygon\",\"coordinates\":[]}'), 4326), the_geom)"
        );
    }

    #[tokio::test]
    async fn test_sql2sql_geostore_not_found() {
        let request = Sql2SqlRequest {
            sql: "SELECT * FROM t".into(),
            spatial: SpatialParams {
                geostore: Some("missing".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        match converter().sql2sql(&request).await {
            Err(error @ ConvertError::GeostoreNotFound(_)) => {
                assert_eq!(error.to_string(), "Geostore missing not found");
                assert_eq!(error.status_code(), 404);
            }
            other => panic!("Expected GeostoreNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sql2sql_geostore_wins_over_geojson() {
        let request = Sql2SqlRequest {
            sql: "SELECT * FROM t".into(),
            spatial: SpatialParams {
                geostore: Some("abc".into()),
                geojson: Some(json!({"type": "Polygon", "coordinates": [[[9, 9], [8, 8], [9, 9]]]})),
            },
            raster: true,
            ..Default::default()
        };
        assert_eq!(
            converter().sql2sql(&request).await.expect("conversion").query,
            "SELECT * FROM t WHERE ST_INTERSECTS(ST_SetSRID(ST_GeomFromGeoJSON('{\"type\":\"Polygon\",\"coordinates\":[]}'), 4326), ST_Transform(the_raster_webmercator, 4326))"
        );
    }

    #[tokio::test]
    async fn test_sql2sql_geojson_feature() {
        let request = Sql2SqlRequest {
            sql: "SELECT * FROM t WHERE a = 1".into(),
            spatial: SpatialParams {
                geojson: Some(json!({
                    "type": "Feature",
                    "properties": {},
                    "geometry": {"type": "Polygon", "coordinates": []}
                })),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            Converter::new(DisabledGeostore)
                .sql2sql(&request)
                .await
                .expect("conversion")
                .query,
            "SELECT * FROM t WHERE ST_INTERSECTS(ST_SetSRID(ST_GeomFromGeoJSON('{\"type\":\"Polygon\",\"coordinates\":[]}'), 4326), the_geom) AND a=1"
        );
    }

    #[tokio::test]
    async fn test_sql2sql_experimental() {
        let mut request = Sql2SqlRequest {
            sql: "SELECT `my col` FROM t".into(),
            ..Default::default()
        };
        assert!(converter().sql2sql(&request).await.is_err());
        request.experimental = true;
        assert_eq!(
            converter().sql2sql(&request).await.expect("conversion").query,
            "SELECT \"my col\" FROM t"
        );
    }

    #[tokio::test]
    async fn test_fs2sql_geostore() {
        let request = Fs2SqlRequest {
            fs: FeatureServiceQuery {
                where_clause: "a=1".into(),
                ..FeatureServiceQuery::new("t")
            },
            spatial: SpatialParams {
                geostore: Some("abc".into()),
                ..Default::default()
            },
        };
        assert_eq!(
            converter().fs2sql(&request).await.expect("conversion").query,
            "SELECT * FROM t WHERE ST_INTERSECTS(ST_SetSRID(ST_GeomFromGeoJSON('{\"type\":\"Polygon\",\"coordinates\":[]}'), 4326), the_geom) AND a=1"
        );
    }

    #[tokio::test]
    async fn test_fs2sql_request_from_json() {
        let request: Fs2SqlRequest = serde_json::from_value(json!({
            "tableName": "tabla",
            "outFields": "COL1",
            "where": "COL1 > 2",
            "geostore": "abc"
        }))
        .expect("json");
        assert_eq!(request.spatial.geostore.as_deref(), Some("abc"));
        assert_eq!(
            converter().fs2sql(&request).await.expect("conversion").query,
            "SELECT COL1 FROM tabla WHERE ST_INTERSECTS(ST_SetSRID(ST_GeomFromGeoJSON('{\"type\":\"Polygon\",\"coordinates\":[]}'), 4326), the_geom) AND COL1>2"
        );
    }

    #[tokio::test]
    async fn test_fs_sql_fs_round_trip() {
        let fs = FeatureServiceQuery {
            out_fields: Some("COL1,COL2".into()),
            where_clause: "COL1='juan' AND COL2=2".into(),
            group_by_fields_for_statistics: Some("COL1,COL2".into()),
            order_by_fields: Some("COL1 desc".into()),
            result_record_count: Some(20),
            supports_pagination: Some(true),
            ..FeatureServiceQuery::new("tabla")
        };
        let converter = converter();
        let sql = converter
            .fs2sql(&Fs2SqlRequest {
                fs: fs.clone(),
                ..Default::default()
            })
            .await
            .expect("conversion")
            .query;
        let back = converter
            .sql2fs(&sql2fs_request(&sql))
            .await
            .expect("conversion")
            .fs
            .expect("fs");
        assert_eq!(back, fs);
    }

    #[tokio::test]
    async fn test_sql_fs_sql_round_trip() {
        let converter = converter();
        for sql in [
            "SELECT * FROM tabla",
            "SELECT COL1, COL2 AS COL FROM tabla WHERE COL1='juan' AND (COL2=2 OR COL2 IS NULL) ORDER BY COL1 DESC LIMIT 5",
            "SELECT COL1, count(FIELD) AS OUTFIELD FROM tabla GROUP BY COL1",
            "SELECT DISTINCT foo FROM X",
            "SELECT count(*) FROM tabla WHERE a>2",
        ] {
            let fs = converter
                .sql2fs(&sql2fs_request(sql))
                .await
                .expect("conversion")
                .fs
                .expect("fs");
            let back = converter
                .fs2sql(&Fs2SqlRequest {
                    fs,
                    ..Default::default()
                })
                .await
                .expect("conversion")
                .query;
            assert_eq!(back, sql);
        }
    }

    #[tokio::test]
    async fn test_count_alias_is_not_kept() {
        let converter = converter();
        let fs = converter
            .sql2fs(&sql2fs_request("SELECT count(*) AS total FROM tabla"))
            .await
            .expect("conversion")
            .fs
            .expect("fs");
        let back = converter
            .fs2sql(&Fs2SqlRequest {
                fs,
                ..Default::default()
            })
            .await
            .expect("conversion")
            .query;
        assert_eq!(back, "SELECT count(*) FROM tabla");
    }

    #[test]
    fn test_check_sql() {
        let converter = converter();
        assert_eq!(
            converter.check_sql("select trim(foo) from X").expect("conversion").query,
            "SELECT trim(foo) FROM X"
        );
        match converter.check_sql("INSERT INTO t VALUES (1)") {
            Err(error) => assert_eq!(error.to_string(), "Type insert not allowed"),
            Ok(conversion) => panic!("Expected an error, got {conversion:?}"),
        }
    }

    #[test]
    fn test_json2sql() {
        let converter = converter();
        let parsed = parse_query("SELECT a FROM t WHERE b > 1 ORDER BY a").expect("parse");
        let json = serde_json::to_value(&parsed).expect("json");
        let conversion = converter
            .json2sql(serde_json::from_value(json).expect("json"))
            .expect("conversion");
        assert_eq!(conversion.query, "SELECT a FROM t WHERE b>1 ORDER BY a");
    }

    #[test]
    fn test_custom_dialect() {
        let converter = converter().with_sql_dialect(Box::new(Postgres {
            postgres_escape_literal: Some(Box::new(|s| format!("E'{s}'"))),
        }) as Box<dyn SqlDialect + Send + Sync>);
        assert_eq!(
            converter
                .check_sql("SELECT * FROM t WHERE a = 'x'")
                .expect("conversion")
                .query,
            "SELECT * FROM t WHERE a=E'x'"
        );
    }

    #[test]
    fn test_conversion_json() {
        let conversion = converter().check_sql("SELECT a FROM t").expect("conversion");
        assert_eq!(
            serde_json::to_value(&conversion).expect("json"),
            json!({
                "query": "SELECT a FROM t",
                "jsonSql": {
                    "statement": {"type": "select"},
                    "select": [{"type": "column", "name": "a"}],
                    "from": ["t"]
                }
            })
        );
    }
}
