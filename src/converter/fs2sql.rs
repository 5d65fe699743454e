use tracing::{debug, info};

use crate::{
    error::{ConvertError, Result},
    feature_service::{FeatureServiceQuery, OutStatistic},
    spatial::predicate::{SpatialColumn, SpatialFilter, build_spatial_predicate, merge_where},
    sql_dialect::sql_dialect::SqlDialect,
    sql_parser::{
        expression::Expression,
        parse_expression, parse_expression_list, parse_order_by, parse_select_list,
        parsed_query::ParsedQuery,
        select_item::{AggregateArgument, AggregateFunction, SelectItem},
    },
    validator::{validate, validate_count_star_alone},
};

use super::Conversion;

fn statistic_item(statistic: &OutStatistic) -> Result<SelectItem> {
    let function = AggregateFunction::from_name(&statistic.statistic_type).ok_or_else(|| {
        ConvertError::QueryNotValid(format!(
            "Statistic type {} not supported",
            statistic.statistic_type
        ))
    })?;
    let argument = match statistic.on_statistic_field.trim() {
        "*" => AggregateArgument::Star,
        field => AggregateArgument::Column(field.into()),
    };
    Ok(SelectItem::Aggregate {
        function,
        argument,
        alias: statistic.out_statistic_field_name.clone(),
    })
}

fn select_items(fs: &FeatureServiceQuery) -> Result<Vec<SelectItem>> {
    if fs.return_count_only == Some(true) {
        return Ok(vec![SelectItem::count_star()]);
    }

    let mut select = match fs.out_fields.as_deref().map(str::trim) {
        Some(out_fields) if !out_fields.is_empty() => parse_select_list(out_fields)?,
        _ => Vec::new(),
    };

    if fs.return_distinct_values == Some(true) {
        let columns = select
            .iter()
            .map(|item| match item {
                SelectItem::Column { name, alias: None } => Ok(name.clone()),
                SelectItem::Distinct { columns } if columns.len() == 1 => Ok(columns[0].clone()),
                _ => Err(ConvertError::QueryNotValid(
                    "returnDistinctValues needs plain outFields".to_string(),
                )),
            })
            .collect::<Result<Vec<Box<str>>>>()?;
        if !columns.is_empty() {
            select = vec![SelectItem::Distinct { columns }];
        }
    }

    for statistic in &fs.out_statistics {
        select.push(statistic_item(statistic)?);
    }

    if select.is_empty() {
        select.push(SelectItem::Wildcard);
    }
    validate_count_star_alone(&select)?;
    Ok(select)
}

/// Builds the query tree a FeatureServer query stands for.
///
/// `spatial` wins over the geometry carried by `fs`.
pub fn build_parsed_query(
    fs: &FeatureServiceQuery,
    spatial: Option<SpatialFilter>,
) -> Result<ParsedQuery> {
    let table_name = match fs.table_name.as_deref().map(str::trim) {
        Some(table_name) if !table_name.is_empty() => table_name,
        _ => {
            return Err(ConvertError::MalformedQuery(
                "tableName is required".to_string(),
            ));
        }
    };

    let where_clause: Option<Expression> = if fs.has_default_where() {
        None
    } else {
        Some(parse_expression(&fs.where_clause)?)
    };

    let spatial = match spatial {
        Some(filter) => Some(filter),
        None => fs.spatial_filter()?,
    };
    let where_clause = match spatial {
        Some(filter) => {
            debug!(srid = filter.srid, "Adding spatial filter");
            Some(merge_where(
                where_clause,
                build_spatial_predicate(&filter, SpatialColumn::Vector),
            ))
        }
        None => where_clause,
    };

    let group_by = match fs.group_by_fields_for_statistics.as_deref().map(str::trim) {
        Some(fields) if !fields.is_empty() => parse_expression_list(fields)?,
        _ => Vec::new(),
    };
    let order_by = match fs.order_by_fields.as_deref().map(str::trim) {
        Some(fields) if !fields.is_empty() => parse_order_by(fields)?,
        _ => Vec::new(),
    };

    Ok(ParsedQuery {
        select: select_items(fs)?,
        from: vec![table_name.into()],
        where_clause,
        group_by,
        order_by,
        limit: fs.result_record_count,
        offset: fs.result_offset,
        ..Default::default()
    })
}

pub fn translate(
    fs: &FeatureServiceQuery,
    spatial: Option<SpatialFilter>,
    sql_dialect: &(dyn SqlDialect + Send + Sync),
) -> Result<Conversion> {
    info!(table = ?fs.table_name, "Creating query from featureService");
    let parsed = build_parsed_query(fs, spatial)?;
    validate(&parsed)?;
    Ok(Conversion {
        query: parsed.to_sql(sql_dialect),
        fs: None,
        parsed,
    })
}
