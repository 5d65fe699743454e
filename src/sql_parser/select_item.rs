use pest::iterators::Pair;
use serde::{Deserialize, Serialize};

use crate::sql_dialect::sql_dialect::SqlDialect;

use super::{Rule, expression::Expression, identifier_name, invalid_rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    Stddev,
    Var,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(AggregateFunction::Count),
            "sum" => Some(AggregateFunction::Sum),
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            "avg" => Some(AggregateFunction::Avg),
            "stddev" => Some(AggregateFunction::Stddev),
            "var" => Some(AggregateFunction::Var),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Stddev => "stddev",
            AggregateFunction::Var => "var",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateArgument {
    Star,
    Column(Box<str>),
}

impl AggregateArgument {
    pub fn to_sql(&self, sql_dialect: &(dyn SqlDialect + Send + Sync)) -> String {
        match self {
            AggregateArgument::Star => "*".to_string(),
            AggregateArgument::Column(name) => sql_dialect.quote_identifier(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SelectItem {
    Wildcard,
    Column {
        name: Box<str>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<Box<str>>,
    },
    Aggregate {
        function: AggregateFunction,
        argument: AggregateArgument,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<Box<str>>,
    },
    Distinct {
        columns: Vec<Box<str>>,
    },
    /// Any other projected expression, such as `trim(foo)`.
    #[serde(rename = "expression")]
    Computed {
        expression: Expression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<Box<str>>,
    },
}

impl SelectItem {
    pub fn count_star() -> Self {
        SelectItem::Aggregate {
            function: AggregateFunction::Count,
            argument: AggregateArgument::Star,
            alias: None,
        }
    }

    pub fn is_count_star(&self) -> bool {
        matches!(
            self,
            SelectItem::Aggregate {
                function: AggregateFunction::Count,
                argument: AggregateArgument::Star,
                ..
            }
        )
    }

    /// Classifies a projected expression into the narrowest select item.
    pub fn from_expression(expression: Expression, alias: Option<Box<str>>) -> Self {
        match expression {
            Expression::Literal { value } => SelectItem::Column { name: value, alias },
            Expression::FunctionCall { name, arguments } => {
                let argument = match arguments.as_slice() {
                    [Expression::Star] => Some(AggregateArgument::Star),
                    [Expression::Literal { value }] => Some(AggregateArgument::Column(value.clone())),
                    _ => None,
                };
                match (AggregateFunction::from_name(&name), argument) {
                    (Some(function), Some(argument)) => SelectItem::Aggregate {
                        function,
                        argument,
                        alias,
                    },
                    _ => SelectItem::Computed {
                        expression: Expression::FunctionCall { name, arguments },
                        alias,
                    },
                }
            }
            expression => SelectItem::Computed { expression, alias },
        }
    }

    pub fn list_from_pest(pair: Pair<Rule>) -> Result<Vec<Self>, pest::error::Error<Rule>> {
        match pair.as_rule() {
            Rule::distinct_list => Ok(vec![SelectItem::Distinct {
                columns: pair
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::identifier)
                    .map(identifier_name)
                    .collect(),
            }]),
            Rule::select_items => pair.into_inner().map(SelectItem::from_pest).collect(),
            _ => Err(invalid_rule(&pair, "SelectItem list")),
        }
    }

    pub fn from_pest(pair: Pair<Rule>) -> Result<Self, pest::error::Error<Rule>> {
        match pair.as_rule() {
            Rule::select_item => {
                let mut expression = None;
                let mut alias = None;
                for inner_pair in pair.clone().into_inner() {
                    match inner_pair.as_rule() {
                        Rule::star => return Ok(SelectItem::Wildcard),
                        Rule::expression => expression = Some(Expression::from_pest(inner_pair)?),
                        Rule::alias => {
                            alias = inner_pair
                                .into_inner()
                                .find(|p| p.as_rule() != Rule::kw_as)
                                .map(identifier_name);
                        }
                        _ => return Err(invalid_rule(&inner_pair, "SelectItem")),
                    }
                }
                match expression {
                    Some(expression) => Ok(SelectItem::from_expression(expression, alias)),
                    None => Err(invalid_rule(&pair, "SelectItem")),
                }
            }
            _ => Err(invalid_rule(&pair, "SelectItem")),
        }
    }

    pub fn to_sql(&self, sql_dialect: &(dyn SqlDialect + Send + Sync)) -> String {
        let (sql, alias) = match self {
            SelectItem::Wildcard => ("*".to_string(), None),
            SelectItem::Column { name, alias } => (sql_dialect.quote_identifier(name), alias.as_ref()),
            SelectItem::Aggregate {
                function,
                argument,
                alias,
            } => (
                format!("{}({})", function.name(), argument.to_sql(sql_dialect)),
                alias.as_ref(),
            ),
            SelectItem::Distinct { columns } => (
                format!(
                    "DISTINCT {}",
                    columns
                        .iter()
                        .map(|column| sql_dialect.quote_identifier(column))
                        .collect::<Vec<String>>()
                        .join(", ")
                ),
                None,
            ),
            SelectItem::Computed { expression, alias } => {
                (expression.to_sql(sql_dialect), alias.as_ref())
            }
        };
        match alias {
            Some(alias) => format!("{sql} AS {}", sql_dialect.quote_identifier(alias)),
            None => sql,
        }
    }
}
