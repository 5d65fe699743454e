use tracing::{debug, info};

use crate::{
    error::{ConvertError, Result},
    feature_service::{FeatureServiceQuery, OutStatistic},
    spatial::predicate::{SpatialFilter, find_spatial_predicate, remove_spatial_predicate},
    sql_dialect::sql_dialect::SqlDialect,
    sql_parser::{
        parsed_query::{Direction, ParsedQuery},
        select_item::{AggregateArgument, SelectItem},
    },
    validator::{validate, validate_count_star_alone},
};

use super::Conversion;

fn apply_select(
    fs: &mut FeatureServiceQuery,
    select: &[SelectItem],
    sql_dialect: &(dyn SqlDialect + Send + Sync),
) -> Result<()> {
    validate_count_star_alone(select)?;

    let mut out_fields = Vec::new();
    for item in select {
        match item {
            // returnCountOnly has no output name, the alias is dropped
            SelectItem::Aggregate { alias, .. } if item.is_count_star() => {
                if let Some(alias) = alias {
                    debug!(alias = %alias, "Dropping count(*) alias");
                }
                fs.return_count_only = Some(true);
            }
            SelectItem::Aggregate {
                function,
                argument,
                alias,
            } => fs.out_statistics.push(OutStatistic {
                on_statistic_field: match argument {
                    AggregateArgument::Star => "*".into(),
                    AggregateArgument::Column(column) => column.clone(),
                },
                statistic_type: function.name().into(),
                out_statistic_field_name: alias.clone(),
            }),
            SelectItem::Distinct { columns } => {
                fs.return_distinct_values = Some(true);
                fs.return_geometry = Some(false);
                out_fields.extend(
                    columns
                        .iter()
                        .map(|column| sql_dialect.quote_identifier(column)),
                );
            }
            SelectItem::Wildcard | SelectItem::Column { .. } | SelectItem::Computed { .. } => {
                out_fields.push(item.to_sql(sql_dialect))
            }
        }
    }
    if !out_fields.is_empty() {
        fs.out_fields = Some(out_fields.join(",").into());
    }
    Ok(())
}

/// Builds the FeatureServer query a validated query tree stands for.
///
/// `spatial` wins over an `ST_INTERSECTS` predicate found in the where-clause.
pub fn build_feature_service_query(
    parsed: &ParsedQuery,
    spatial: Option<SpatialFilter>,
    exclude_geometries: bool,
    sql_dialect: &(dyn SqlDialect + Send + Sync),
) -> Result<FeatureServiceQuery> {
    validate(parsed)?;
    if parsed.is_delete() {
        return Err(ConvertError::QueryNotValid(
            "Delete statements can not be expressed as a FeatureServer query".to_string(),
        ));
    }

    let mut fs = FeatureServiceQuery {
        table_name: parsed.table_name().map(Into::into),
        ..Default::default()
    };
    apply_select(&mut fs, &parsed.select, sql_dialect)?;

    if let Some(where_clause) = &parsed.where_clause {
        let residual = match find_spatial_predicate(where_clause) {
            Some(filter) => {
                debug!(srid = filter.srid, "Moving spatial predicate to geometry");
                fs.set_spatial_filter(&filter)?;
                remove_spatial_predicate(where_clause.clone())
            }
            None => Some(where_clause.clone()),
        };
        if let Some(residual) = residual {
            fs.where_clause = residual.to_sql(sql_dialect).into();
        }
    }
    if let Some(filter) = &spatial {
        fs.set_spatial_filter(filter)?;
    }

    if !parsed.group_by.is_empty() {
        fs.group_by_fields_for_statistics = Some(
            parsed
                .group_by
                .iter()
                .map(|expression| expression.to_sql(sql_dialect))
                .collect::<Vec<String>>()
                .join(",")
                .into(),
        );
    }
    if !parsed.order_by.is_empty() {
        fs.order_by_fields = Some(
            parsed
                .order_by
                .iter()
                .map(|order| match order.direction {
                    Some(Direction::Asc) => format!("{} asc", order.expression.to_sql(sql_dialect)),
                    Some(Direction::Desc) => {
                        format!("{} desc", order.expression.to_sql(sql_dialect))
                    }
                    None => order.expression.to_sql(sql_dialect),
                })
                .collect::<Vec<String>>()
                .join(",")
                .into(),
        );
    }
    if let Some(limit) = parsed.limit {
        fs.result_record_count = Some(limit);
        fs.supports_pagination = Some(true);
    }
    fs.result_offset = parsed.offset;
    if exclude_geometries {
        fs.return_geometry = Some(false);
    }
    Ok(fs)
}

pub fn translate(
    parsed: ParsedQuery,
    spatial: Option<SpatialFilter>,
    exclude_geometries: bool,
    sql_dialect: &(dyn SqlDialect + Send + Sync),
) -> Result<Conversion> {
    info!(table = ?parsed.table_name(), "Creating featureService from sql");
    let fs = build_feature_service_query(&parsed, spatial, exclude_geometries, sql_dialect)?;
    Ok(Conversion {
        query: fs.to_query_string()?,
        fs: Some(fs),
        parsed,
    })
}
