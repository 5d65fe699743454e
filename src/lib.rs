use serde::Serialize;
use sql_dialect::{postgres::postgres::Postgres, sql_dialect::SqlDialect};
use wasm_bindgen::prelude::*;

pub mod config;
pub mod converter;
pub mod error;
pub mod feature_service;
pub mod geostore;
pub mod spatial;
pub mod sql_dialect;
pub mod sql_parser;
pub mod validator;

pub use converter::{Conversion, Converter, Fs2SqlRequest, Sql2FsRequest, Sql2SqlRequest};
pub use error::{ConvertError, ErrorResponse};

use converter::{fs2sql, sql2fs};
use error::Result;
use feature_service::FeatureServiceQuery;
use sql_parser::parse_query;

fn to_json<T: Serialize>(result: Result<T>) -> String {
    let serialized = match &result {
        Ok(value) => serde_json::to_string(value).map_err(ConvertError::from),
        Err(error) => serde_json::to_string(&ErrorResponse::from(error)).map_err(ConvertError::from),
    };
    serialized.unwrap_or_else(|e| format!("{{\"error\":true,\"message\":\"{e}\"}}"))
}

/// SQL to FeatureServer query, as JSON.
#[wasm_bindgen]
pub fn sql2fs_json(sql: &str) -> String {
    let d = &Postgres::default() as &(dyn SqlDialect + Send + Sync);
    to_json(
        parse_query(sql)
            .map_err(ConvertError::from)
            .and_then(|parsed| sql2fs::translate(parsed, None, false, d)),
    )
}

/// FeatureServer query (JSON) to SQL, as JSON.
#[wasm_bindgen]
pub fn fs2sql_json(fs: &str) -> String {
    let d = &Postgres::default() as &(dyn SqlDialect + Send + Sync);
    to_json(FeatureServiceQuery::try_from(fs).and_then(|fs| fs2sql::translate(&fs, None, d)))
}

#[wasm_bindgen]
pub fn check_sql_json(sql: &str) -> String {
    to_json(Converter::new(geostore::DisabledGeostore).check_sql(sql))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{check_sql_json, fs2sql_json, sql2fs_json};

    #[test]
    fn test_sql2fs_json() {
        let json: serde_json::Value =
            serde_json::from_str(&sql2fs_json("SELECT * FROM t WHERE a=1")).expect("json");
        assert_eq!(json["query"], "?outFields=*&tableName=t&where=a=1");
        assert_eq!(json["fs"]["where"], "a=1");
    }

    #[test]
    fn test_fs2sql_json() {
        let json: serde_json::Value =
            serde_json::from_str(&fs2sql_json(r#"{"tableName":"t","outFields":"a,b"}"#))
                .expect("json");
        assert_eq!(json["query"], "SELECT a, b FROM t");
    }

    #[test]
    fn test_error_json() {
        assert_eq!(
            check_sql_json("SELECT * FROM a JOIN b"),
            r#"{"error":true,"message":"Joins not allowed"}"#
        );
        assert_eq!(
            sql2fs_json("not sql"),
            r#"{"error":true,"message":"Malformed query"}"#
        );
    }
}
