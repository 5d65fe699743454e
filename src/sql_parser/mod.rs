pub mod expression;
pub mod parsed_query;
pub mod select_item;

use expression::Expression;
use parsed_query::{OrderBy, ParsedQuery};
use pest::{Parser, Position, iterators::Pair};
use pest_derive::Parser;
use select_item::SelectItem;

#[derive(Parser)]
#[grammar = "sql.pest"]
pub struct SqlParser;

/// Grammar variant used to read a full statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParserMode {
    #[default]
    Standard,
    /// Also accepts backtick-quoted identifiers.
    Experimental,
}

impl ParserMode {
    pub fn from_experimental_flag(experimental: bool) -> Self {
        if experimental {
            ParserMode::Experimental
        } else {
            ParserMode::Standard
        }
    }
}

pub fn parse_query(query: &str) -> Result<ParsedQuery, pest::error::Error<Rule>> {
    parse_query_with(query, ParserMode::Standard)
}

pub fn parse_query_with(
    query: &str,
    mode: ParserMode,
) -> Result<ParsedQuery, pest::error::Error<Rule>> {
    let pair = single_pair(query, Rule::query)?;
    if mode == ParserMode::Standard {
        if let Some(backtick) = pair
            .clone()
            .into_inner()
            .flatten()
            .find(|p| p.as_rule() == Rule::backtick_identifier)
        {
            return Err(pest::error::Error::new_from_span(
                pest::error::ErrorVariant::CustomError {
                    message: "Backtick-quoted identifiers need the experimental parser"
                        .to_string(),
                },
                backtick.as_span(),
            ));
        }
    }
    ParsedQuery::from_pest(pair)
}

/// Parses a bare where-clause such as the FeatureServer `where` parameter.
pub fn parse_expression(fragment: &str) -> Result<Expression, pest::error::Error<Rule>> {
    let pair = single_pair(fragment, Rule::where_fragment)?;
    match pair.into_inner().find(|p| p.as_rule() == Rule::expression) {
        Some(expression) => Expression::from_pest(expression),
        None => Err(empty_input(fragment)),
    }
}

/// Parses a comma separated select list such as `outFields`.
pub fn parse_select_list(fragment: &str) -> Result<Vec<SelectItem>, pest::error::Error<Rule>> {
    let pair = single_pair(fragment, Rule::out_fields_fragment)?;
    match pair
        .into_inner()
        .find(|p| matches!(p.as_rule(), Rule::select_items | Rule::distinct_list))
    {
        Some(list) => SelectItem::list_from_pest(list),
        None => Err(empty_input(fragment)),
    }
}

pub fn parse_expression_list(fragment: &str) -> Result<Vec<Expression>, pest::error::Error<Rule>> {
    let pair = single_pair(fragment, Rule::group_by_fragment)?;
    match pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expression_list)
    {
        Some(list) => Expression::list_from_pest(list),
        None => Err(empty_input(fragment)),
    }
}

pub fn parse_order_by(fragment: &str) -> Result<Vec<OrderBy>, pest::error::Error<Rule>> {
    let pair = single_pair(fragment, Rule::order_by_fragment)?;
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::order_item)
        .map(OrderBy::from_pest)
        .collect()
}

fn single_pair(input: &str, rule: Rule) -> Result<Pair<'_, Rule>, pest::error::Error<Rule>> {
    match SqlParser::parse(rule, input)?.next() {
        Some(pair) => Ok(pair),
        None => Err(empty_input(input)),
    }
}

fn empty_input(input: &str) -> pest::error::Error<Rule> {
    pest::error::Error::new_from_pos(
        pest::error::ErrorVariant::CustomError {
            message: "Empty input".to_string(),
        },
        Position::from_start(input),
    )
}

pub(crate) fn invalid_rule(pair: &Pair<Rule>, node: &str) -> pest::error::Error<Rule> {
    pest::error::Error::new_from_span(
        pest::error::ErrorVariant::CustomError {
            message: format!("Invalid rule {:?} for {node}", pair.as_rule()),
        },
        pair.as_span(),
    )
}

/// Name carried by an `identifier`, `table_name` or `argument_name` pair, unquoted.
pub(crate) fn identifier_name(pair: Pair<Rule>) -> Box<str> {
    match pair.as_rule() {
        Rule::identifier | Rule::table_name | Rule::argument_name => {
            match pair.clone().into_inner().next() {
                Some(inner) => identifier_name(inner),
                None => pair.as_str().into(),
            }
        }
        Rule::quoted_identifier => pair
            .into_inner()
            .next()
            .map(|inner| inner.as_str().replace("\"\"", "\""))
            .unwrap_or_default()
            .into(),
        Rule::backtick_identifier => pair
            .into_inner()
            .next()
            .map(|inner| inner.as_str())
            .unwrap_or_default()
            .into(),
        Rule::string_literal => string_value(pair),
        _ => pair.as_str().into(),
    }
}

/// Unescaped content of a `string_literal` pair.
pub(crate) fn string_value(pair: Pair<Rule>) -> Box<str> {
    pair.into_inner()
        .next()
        .map(|inner| inner.as_str().replace("''", "'"))
        .unwrap_or_default()
        .into()
}
