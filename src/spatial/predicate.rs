use derivative::Derivative;
use serde_json::Value;

use crate::sql_parser::expression::{Expression, LogicalOperator};

use super::geometry::DEFAULT_WKID;

pub const ST_INTERSECTS: &str = "ST_INTERSECTS";
pub const VECTOR_GEOMETRY_COLUMN: &str = "the_geom";
pub const RASTER_GEOMETRY_COLUMN: &str = "the_raster_webmercator";

/// A GeoJSON geometry and the SRID its coordinates are expressed in.
#[derive(Derivative)]
#[derivative(Default)]
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialFilter {
    pub geometry: Value,
    #[derivative(Default(value = "DEFAULT_WKID"))]
    pub srid: i64,
}

impl SpatialFilter {
    pub fn new(geometry: Value) -> Self {
        SpatialFilter {
            geometry,
            srid: DEFAULT_WKID,
        }
    }
}

/// Column a spatial predicate is tested against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpatialColumn {
    #[default]
    Vector,
    Raster,
}

impl SpatialColumn {
    pub fn from_raster_flag(raster: bool) -> Self {
        if raster {
            SpatialColumn::Raster
        } else {
            SpatialColumn::Vector
        }
    }

    pub fn to_expression(self) -> Expression {
        match self {
            SpatialColumn::Vector => Expression::literal(VECTOR_GEOMETRY_COLUMN),
            SpatialColumn::Raster => Expression::function(
                "ST_Transform",
                vec![
                    Expression::literal(RASTER_GEOMETRY_COLUMN),
                    Expression::number(DEFAULT_WKID),
                ],
            ),
        }
    }
}

fn geometry_argument(expression: &Expression) -> Option<Value> {
    match expression {
        Expression::StringLiteral { value } => serde_json::from_str::<Value>(value)
            .ok()
            .filter(Value::is_object),
        Expression::FunctionCall { arguments, .. } => arguments.iter().find_map(geometry_argument),
        _ => None,
    }
}

fn srid_argument(expression: &Expression) -> Option<i64> {
    match expression {
        Expression::NumberLiteral { value } => value.parse::<i64>().ok(),
        Expression::FunctionCall { arguments, .. } => arguments.iter().find_map(srid_argument),
        _ => None,
    }
}

/// Filter carried by `expression` itself when it is an `ST_INTERSECTS` call with a GeoJSON argument.
fn spatial_filter_of(expression: &Expression) -> Option<SpatialFilter> {
    match expression {
        Expression::FunctionCall { name, arguments } if name.eq_ignore_ascii_case(ST_INTERSECTS) => {
            let geometry = arguments.iter().find_map(geometry_argument)?;
            let srid = arguments
                .iter()
                .find_map(srid_argument)
                .unwrap_or(DEFAULT_WKID);
            Some(SpatialFilter { geometry, srid })
        }
        _ => None,
    }
}

/// First spatial predicate reachable through AND/OR nodes, depth first, left to right.
pub fn find_spatial_predicate(expression: &Expression) -> Option<SpatialFilter> {
    match expression {
        Expression::Conditional { left, right, .. } => {
            find_spatial_predicate(left).or_else(|| find_spatial_predicate(right))
        }
        _ => spatial_filter_of(expression),
    }
}

/// Removes the predicate `find_spatial_predicate` reports, promoting its sibling.
///
/// Returns `None` when the predicate was the whole expression.
pub fn remove_spatial_predicate(expression: Expression) -> Option<Expression> {
    let mut removed = false;
    excise(expression, &mut removed)
}

fn excise(expression: Expression, removed: &mut bool) -> Option<Expression> {
    if *removed {
        return Some(expression);
    }
    match expression {
        Expression::Conditional {
            operator,
            left,
            right,
        } => {
            let left = excise(*left, removed);
            let right = excise(*right, removed);
            match (left, right) {
                (Some(left), Some(right)) => Some(Expression::Conditional {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                }),
                (Some(remaining), None) | (None, Some(remaining)) => Some(remaining),
                (None, None) => None,
            }
        }
        expression if spatial_filter_of(&expression).is_some() => {
            *removed = true;
            None
        }
        expression => Some(expression),
    }
}

/// `ST_INTERSECTS(ST_SetSRID(ST_GeomFromGeoJSON('<geojson>'), <srid>), <column>)`
pub fn build_spatial_predicate(filter: &SpatialFilter, column: SpatialColumn) -> Expression {
    Expression::function(
        ST_INTERSECTS,
        vec![
            Expression::function(
                "ST_SetSRID",
                vec![
                    Expression::function(
                        "ST_GeomFromGeoJSON",
                        vec![Expression::string(&filter.geometry.to_string())],
                    ),
                    Expression::number(filter.srid),
                ],
            ),
            column.to_expression(),
        ],
    )
}

/// ANDs `predicate` in front of an existing where-clause.
pub fn merge_where(where_clause: Option<Expression>, predicate: Expression) -> Expression {
    match where_clause {
        Some(prior) => Expression::Conditional {
            operator: LogicalOperator::And,
            left: Box::new(predicate),
            right: Box::new(prior),
        },
        None => predicate,
    }
}
