use pest::iterators::Pair;
use serde::{Deserialize, Serialize};

use crate::sql_dialect::sql_dialect::SqlDialect;

use super::{Rule, identifier_name, invalid_rule, string_value};

const COMPARISON_PRECEDENCE: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expression {
    /// Bare word: column name, `NULL`, `TRUE`...
    Literal {
        value: Box<str>,
    },
    #[serde(rename = "string")]
    StringLiteral {
        value: Box<str>,
    },
    #[serde(rename = "number")]
    NumberLiteral {
        value: Box<str>,
    },
    #[serde(rename = "function")]
    FunctionCall {
        name: Box<str>,
        arguments: Vec<Expression>,
    },
    NamedArgument {
        name: Box<str>,
        value: Box<Expression>,
    },
    Star,
    List {
        items: Vec<Expression>,
    },
    Not {
        expression: Box<Expression>,
    },
    Conditional {
        operator: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    #[serde(rename = "operator")]
    Comparison {
        operator: Box<str>,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn literal(value: &str) -> Self {
        Expression::Literal {
            value: value.into(),
        }
    }

    pub fn string(value: &str) -> Self {
        Expression::StringLiteral {
            value: value.into(),
        }
    }

    pub fn number(value: impl ToString) -> Self {
        Expression::NumberLiteral {
            value: value.to_string().into(),
        }
    }

    pub fn function(name: &str, arguments: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            name: name.into(),
            arguments,
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::Conditional {
            operator: LogicalOperator::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn comparison(operator: &str, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            operator: operator.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn from_pest(pair: Pair<Rule>) -> Result<Self, pest::error::Error<Rule>> {
        match pair.as_rule() {
            Rule::expression | Rule::parenthesized => match pair.clone().into_inner().next() {
                Some(inner) => Expression::from_pest(inner),
                None => Err(invalid_rule(&pair, "Expression")),
            },
            Rule::or_expression | Rule::and_expression => {
                let operator = if pair.as_rule() == Rule::or_expression {
                    LogicalOperator::Or
                } else {
                    LogicalOperator::And
                };
                let mut operands = pair
                    .clone()
                    .into_inner()
                    .filter(|p| !matches!(p.as_rule(), Rule::kw_or | Rule::kw_and));
                let mut expression = match operands.next() {
                    Some(first) => Expression::from_pest(first)?,
                    None => return Err(invalid_rule(&pair, "Expression")),
                };
                for operand in operands {
                    expression = Expression::Conditional {
                        operator,
                        left: Box::new(expression),
                        right: Box::new(Expression::from_pest(operand)?),
                    };
                }
                Ok(expression)
            }
            Rule::not_expression => {
                let mut inner = pair.clone().into_inner();
                match inner.next() {
                    Some(p) if p.as_rule() == Rule::kw_not => match inner.next() {
                        Some(negated) => Ok(Expression::Not {
                            expression: Box::new(Expression::from_pest(negated)?),
                        }),
                        None => Err(invalid_rule(&pair, "Expression")),
                    },
                    Some(p) => Expression::from_pest(p),
                    None => Err(invalid_rule(&pair, "Expression")),
                }
            }
            Rule::comparison => {
                let mut inner = pair.clone().into_inner();
                let left = match inner.next() {
                    Some(p) => Expression::from_pest(p)?,
                    None => return Err(invalid_rule(&pair, "Expression")),
                };
                match inner.next() {
                    Some(tail) => Expression::comparison_from_pest(left, tail),
                    None => Ok(left),
                }
            }
            Rule::additive | Rule::multiplicative => {
                let mut inner = pair.clone().into_inner();
                let mut expression = match inner.next() {
                    Some(first) => Expression::from_pest(first)?,
                    None => return Err(invalid_rule(&pair, "Expression")),
                };
                while let (Some(operator), Some(operand)) = (inner.next(), inner.next()) {
                    expression = Expression::Comparison {
                        operator: operator.as_str().into(),
                        left: Box::new(expression),
                        right: Box::new(Expression::from_pest(operand)?),
                    };
                }
                Ok(expression)
            }
            Rule::function_call => {
                let mut name: Box<str> = "".into();
                let mut arguments = Vec::new();
                for inner_pair in pair.into_inner() {
                    match inner_pair.as_rule() {
                        Rule::function_name => name = inner_pair.as_str().into(),
                        Rule::function_arguments => {
                            for argument in inner_pair.into_inner() {
                                arguments.push(Expression::from_pest(argument)?);
                            }
                        }
                        _ => return Err(invalid_rule(&inner_pair, "FunctionCall")),
                    }
                }
                Ok(Expression::FunctionCall { name, arguments })
            }
            Rule::named_argument => {
                let mut inner = pair.clone().into_inner();
                match (inner.next(), inner.next()) {
                    (Some(name), Some(value)) => Ok(Expression::NamedArgument {
                        name: identifier_name(name),
                        value: Box::new(Expression::from_pest(value)?),
                    }),
                    _ => Err(invalid_rule(&pair, "NamedArgument")),
                }
            }
            Rule::star => Ok(Expression::Star),
            Rule::number => Ok(Expression::NumberLiteral {
                value: pair.as_str().into(),
            }),
            Rule::string_literal => Ok(Expression::StringLiteral {
                value: string_value(pair),
            }),
            Rule::identifier => {
                let plain = pair
                    .clone()
                    .into_inner()
                    .next()
                    .is_some_and(|inner| inner.as_rule() == Rule::plain_identifier);
                let value = identifier_name(pair);
                let value = match value.to_ascii_uppercase().as_str() {
                    normalized @ ("NULL" | "TRUE" | "FALSE") if plain => normalized.into(),
                    _ => value,
                };
                Ok(Expression::Literal { value })
            }
            _ => Err(invalid_rule(&pair, "Expression")),
        }
    }

    fn comparison_from_pest(
        left: Expression,
        tail: Pair<Rule>,
    ) -> Result<Self, pest::error::Error<Rule>> {
        let mut words = Vec::new();
        let mut right = None;
        for inner_pair in tail.clone().into_inner() {
            match inner_pair.as_rule() {
                Rule::kw_is | Rule::kw_not | Rule::kw_in | Rule::kw_like | Rule::kw_ilike => {
                    words.push(inner_pair.as_str().to_ascii_uppercase())
                }
                Rule::comparison_operator => words.push(inner_pair.as_str().to_string()),
                Rule::expression_list => {
                    right = Some(Expression::List {
                        items: Expression::list_from_pest(inner_pair)?,
                    })
                }
                Rule::additive => right = Some(Expression::from_pest(inner_pair)?),
                _ => return Err(invalid_rule(&inner_pair, "Comparison")),
            }
        }
        match right {
            Some(right) => Ok(Expression::Comparison {
                operator: words.join(" ").into(),
                left: Box::new(left),
                right: Box::new(right),
            }),
            None => Err(invalid_rule(&tail, "Comparison")),
        }
    }

    pub fn list_from_pest(pair: Pair<Rule>) -> Result<Vec<Self>, pest::error::Error<Rule>> {
        match pair.as_rule() {
            Rule::expression_list => pair.into_inner().map(Expression::from_pest).collect(),
            _ => Err(invalid_rule(&pair, "Expression list")),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expression::Conditional {
                operator: LogicalOperator::Or,
                ..
            } => 1,
            Expression::Conditional {
                operator: LogicalOperator::And,
                ..
            } => 2,
            Expression::Not { .. } => 3,
            Expression::Comparison { operator, .. } => match operator.as_ref() {
                "||" | "+" | "-" => 5,
                "*" | "/" | "%" => 6,
                _ => COMPARISON_PRECEDENCE,
            },
            _ => 10,
        }
    }

    fn child_to_sql(
        &self,
        parent_precedence: u8,
        right_side: bool,
        sql_dialect: &(dyn SqlDialect + Send + Sync),
    ) -> String {
        let precedence = self.precedence();
        // comparisons do not chain, a nested one is always parenthesized
        let non_associative = precedence == COMPARISON_PRECEDENCE;
        if precedence < parent_precedence
            || (precedence == parent_precedence && (right_side || non_associative))
        {
            format!("({})", self.to_sql(sql_dialect))
        } else {
            self.to_sql(sql_dialect)
        }
    }

    pub fn to_sql(&self, sql_dialect: &(dyn SqlDialect + Send + Sync)) -> String {
        match self {
            Expression::Literal { value } => match value.as_ref() {
                "NULL" | "TRUE" | "FALSE" => value.to_string(),
                _ => sql_dialect.quote_identifier(value),
            },
            Expression::StringLiteral { value } => sql_dialect.escape_literal(value),
            Expression::NumberLiteral { value } => value.to_string(),
            Expression::FunctionCall { name, arguments } => format!(
                "{name}({})",
                arguments
                    .iter()
                    .map(|argument| argument.to_sql(sql_dialect))
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
            Expression::NamedArgument { name, value } => format!(
                "{}={}",
                sql_dialect.escape_literal(name),
                value.to_sql(sql_dialect)
            ),
            Expression::Star => "*".to_string(),
            Expression::List { items } => format!(
                "({})",
                items
                    .iter()
                    .map(|item| item.to_sql(sql_dialect))
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
            Expression::Not { expression } => format!(
                "NOT {}",
                expression.child_to_sql(self.precedence(), false, sql_dialect)
            ),
            Expression::Conditional {
                operator,
                left,
                right,
            } => {
                // AND and OR are associative, a same-operator right child needs no parens
                let precedence = self.precedence();
                format!(
                    "{} {} {}",
                    left.child_to_sql(precedence, false, sql_dialect),
                    operator.as_sql(),
                    right.child_to_sql(precedence, false, sql_dialect)
                )
            }
            Expression::Comparison {
                operator,
                left,
                right,
            } => {
                let precedence = self.precedence();
                let separator = if precedence == COMPARISON_PRECEDENCE && !operator.contains(char::is_alphabetic) {
                    ""
                } else {
                    " "
                };
                format!(
                    "{}{separator}{operator}{separator}{}",
                    left.child_to_sql(precedence, false, sql_dialect),
                    right.child_to_sql(precedence, true, sql_dialect)
                )
            }
        }
    }
}
