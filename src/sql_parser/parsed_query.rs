use derivative::Derivative;
use pest::iterators::Pair;
use serde::{Deserialize, Serialize};

use crate::sql_dialect::sql_dialect::SqlDialect;

use super::{
    Rule, expression::Expression, identifier_name, invalid_rule, select_item::SelectItem,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Statement {
    Select,
    Delete,
    /// Any other recognised statement, kept verbatim.
    Other { keyword: Box<str>, sql: Box<str> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub expression: Expression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl OrderBy {
    pub fn from_pest(pair: Pair<Rule>) -> Result<Self, pest::error::Error<Rule>> {
        match pair.as_rule() {
            Rule::order_item => {
                let mut expression = None;
                let mut direction = None;
                for inner_pair in pair.clone().into_inner() {
                    match inner_pair.as_rule() {
                        Rule::expression => expression = Some(Expression::from_pest(inner_pair)?),
                        Rule::direction => {
                            direction = match inner_pair.into_inner().next().map(|p| p.as_rule()) {
                                Some(Rule::kw_desc) => Some(Direction::Desc),
                                _ => Some(Direction::Asc),
                            }
                        }
                        _ => return Err(invalid_rule(&inner_pair, "OrderBy")),
                    }
                }
                match expression {
                    Some(expression) => Ok(OrderBy {
                        expression,
                        direction,
                    }),
                    None => Err(invalid_rule(&pair, "OrderBy")),
                }
            }
            _ => Err(invalid_rule(&pair, "OrderBy")),
        }
    }

    pub fn to_sql(&self, sql_dialect: &(dyn SqlDialect + Send + Sync)) -> String {
        match self.direction {
            Some(direction) => format!(
                "{} {}",
                self.expression.to_sql(sql_dialect),
                direction.as_sql()
            ),
            None => self.expression.to_sql(sql_dialect),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Box<str>>,
    pub table: Box<str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<Expression>,
}

impl Join {
    pub fn from_pest(pair: Pair<Rule>) -> Result<Self, pest::error::Error<Rule>> {
        let mut join = Join {
            kind: None,
            table: "".into(),
            on: None,
        };
        for inner_pair in pair.into_inner() {
            match inner_pair.as_rule() {
                Rule::join_kind => {
                    join.kind = Some(
                        inner_pair
                            .into_inner()
                            .map(|p| p.as_str().to_ascii_uppercase())
                            .collect::<Vec<String>>()
                            .join(" ")
                            .into(),
                    )
                }
                Rule::kw_join | Rule::kw_on => {}
                Rule::table_name => join.table = identifier_name(inner_pair),
                Rule::expression => join.on = Some(Expression::from_pest(inner_pair)?),
                _ => return Err(invalid_rule(&inner_pair, "Join")),
            }
        }
        Ok(join)
    }

    pub fn to_sql(&self, sql_dialect: &(dyn SqlDialect + Send + Sync)) -> String {
        let mut sql = match &self.kind {
            Some(kind) => format!("{kind} JOIN {}", sql_dialect.quote_table_name(&self.table)),
            None => format!("JOIN {}", sql_dialect.quote_table_name(&self.table)),
        };
        if let Some(on) = &self.on {
            sql.push_str(&format!(" ON {}", on.to_sql(sql_dialect)));
        }
        sql
    }
}

#[derive(Derivative)]
#[derivative(Default)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParsedQuery {
    #[derivative(Default(value = "Statement::Select"))]
    pub statement: Statement,
    pub select: Vec<SelectItem>,
    pub from: Vec<Box<str>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<Join>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Expression>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<Expression>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl ParsedQuery {
    pub fn is_delete(&self) -> bool {
        self.statement == Statement::Delete
    }

    pub fn table_name(&self) -> Option<&str> {
        self.from.first().map(|table| table.as_ref())
    }

    pub fn from_pest(pair: Pair<Rule>) -> Result<Self, pest::error::Error<Rule>> {
        match pair.as_rule() {
            Rule::query => {
                for inner_pair in pair.clone().into_inner() {
                    match inner_pair.as_rule() {
                        Rule::select_statement | Rule::delete_statement => {
                            return ParsedQuery::statement_from_pest(inner_pair);
                        }
                        Rule::other_statement => {
                            let keyword = inner_pair
                                .clone()
                                .into_inner()
                                .next()
                                .map(|p| p.as_str().to_ascii_lowercase())
                                .unwrap_or_default();
                            return Ok(ParsedQuery {
                                statement: Statement::Other {
                                    keyword: keyword.into(),
                                    sql: inner_pair.as_str().trim().into(),
                                },
                                ..Default::default()
                            });
                        }
                        _ => {}
                    }
                }
                Err(invalid_rule(&pair, "ParsedQuery"))
            }
            _ => Err(invalid_rule(&pair, "ParsedQuery")),
        }
    }

    fn statement_from_pest(pair: Pair<Rule>) -> Result<Self, pest::error::Error<Rule>> {
        let mut query = ParsedQuery::default();
        for inner_pair in pair.into_inner() {
            match inner_pair.as_rule() {
                Rule::kw_select => query.statement = Statement::Select,
                Rule::kw_delete => query.statement = Statement::Delete,
                Rule::select_items | Rule::distinct_list => {
                    query.select = SelectItem::list_from_pest(inner_pair)?;
                }
                Rule::from_clause => {
                    query.from = inner_pair
                        .into_inner()
                        .filter(|p| p.as_rule() == Rule::table_name)
                        .map(identifier_name)
                        .collect();
                }
                Rule::join_clause => query.joins.push(Join::from_pest(inner_pair)?),
                Rule::where_clause => {
                    query.where_clause = inner_pair
                        .into_inner()
                        .find(|p| p.as_rule() == Rule::expression)
                        .map(Expression::from_pest)
                        .transpose()?;
                }
                Rule::group_by_clause => {
                    if let Some(list) = inner_pair
                        .into_inner()
                        .find(|p| p.as_rule() == Rule::expression_list)
                    {
                        query.group_by = Expression::list_from_pest(list)?;
                    }
                }
                Rule::order_by_clause => {
                    query.order_by = inner_pair
                        .into_inner()
                        .filter(|p| p.as_rule() == Rule::order_item)
                        .map(OrderBy::from_pest)
                        .collect::<Result<Vec<OrderBy>, _>>()?;
                }
                Rule::limit_clause => query.limit = Some(unsigned_from_pest(inner_pair)?),
                Rule::offset_clause => query.offset = Some(unsigned_from_pest(inner_pair)?),
                _ => return Err(invalid_rule(&inner_pair, "ParsedQuery")),
            }
        }
        Ok(query)
    }

    pub fn to_sql(&self, sql_dialect: &(dyn SqlDialect + Send + Sync)) -> String {
        let mut sql = match &self.statement {
            Statement::Select => format!(
                "SELECT {}",
                self.select
                    .iter()
                    .map(|item| item.to_sql(sql_dialect))
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
            Statement::Delete => "DELETE".to_string(),
            Statement::Other { sql, .. } => return sql.to_string(),
        };

        if !self.from.is_empty() {
            sql.push_str(&format!(
                " FROM {}",
                self.from
                    .iter()
                    .map(|table| sql_dialect.quote_table_name(table))
                    .collect::<Vec<String>>()
                    .join(", ")
            ));
        }
        for join in &self.joins {
            sql.push_str(&format!(" {}", join.to_sql(sql_dialect)));
        }
        if let Some(where_clause) = &self.where_clause {
            sql.push_str(&format!(" WHERE {}", where_clause.to_sql(sql_dialect)));
        }
        if !self.group_by.is_empty() {
            sql.push_str(&format!(
                " GROUP BY {}",
                self.group_by
                    .iter()
                    .map(|expression| expression.to_sql(sql_dialect))
                    .collect::<Vec<String>>()
                    .join(", ")
            ));
        }
        if !self.order_by.is_empty() {
            sql.push_str(&format!(
                " ORDER BY {}",
                self.order_by
                    .iter()
                    .map(|order| order.to_sql(sql_dialect))
                    .collect::<Vec<String>>()
                    .join(", ")
            ));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }
}

fn unsigned_from_pest(pair: Pair<Rule>) -> Result<u64, pest::error::Error<Rule>> {
    match pair
        .clone()
        .into_inner()
        .find(|p| p.as_rule() == Rule::unsigned)
    {
        Some(number) => number.as_str().parse::<u64>().map_err(|e| {
            pest::error::Error::new_from_span(
                pest::error::ErrorVariant::CustomError {
                    message: format!("Invalid number: {e}"),
                },
                number.as_span(),
            )
        }),
        None => Err(invalid_rule(&pair, "ParsedQuery")),
    }
}
