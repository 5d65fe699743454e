use tracing::{debug, info};

use crate::{
    error::Result,
    spatial::predicate::{SpatialColumn, SpatialFilter, build_spatial_predicate, merge_where},
    sql_dialect::sql_dialect::SqlDialect,
    sql_parser::parsed_query::ParsedQuery,
    validator::validate,
};

use super::Conversion;

/// ANDs a spatial predicate on `column` in front of the existing where-clause.
pub fn inject_spatial_filter(parsed: &mut ParsedQuery, filter: &SpatialFilter, column: SpatialColumn) {
    debug!(srid = filter.srid, column = ?column, "Injecting spatial filter");
    let predicate = build_spatial_predicate(filter, column);
    parsed.where_clause = Some(merge_where(parsed.where_clause.take(), predicate));
}

pub fn translate(
    mut parsed: ParsedQuery,
    spatial: Option<SpatialFilter>,
    column: SpatialColumn,
    sql_dialect: &(dyn SqlDialect + Send + Sync),
) -> Result<Conversion> {
    info!(table = ?parsed.table_name(), "Rewriting sql");
    if let Some(filter) = &spatial {
        inject_spatial_filter(&mut parsed, filter, column);
    }
    validate(&parsed)?;
    Ok(Conversion {
        query: parsed.to_sql(sql_dialect),
        fs: None,
        parsed,
    })
}
