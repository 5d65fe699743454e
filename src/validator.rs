use tracing::debug;

use crate::{
    error::{COUNT_STAR_WITH_COLUMNS, ConvertError, Result},
    sql_parser::{
        parsed_query::{ParsedQuery, Statement},
        select_item::SelectItem,
    },
};

/// Structural gate applied before any SQL or FeatureServer query is emitted.
pub fn validate(query: &ParsedQuery) -> Result<()> {
    if let Statement::Other { keyword, .. } = &query.statement {
        debug!(keyword = %keyword, "Rejecting statement kind");
        return Err(ConvertError::UnsupportedQueryShape(format!(
            "Type {keyword} not allowed"
        )));
    }
    if query.from.is_empty() {
        return Err(ConvertError::malformed_query());
    }
    if query.from.len() > 1 || !query.joins.is_empty() {
        return Err(ConvertError::UnsupportedQueryShape(
            "Joins not allowed".to_string(),
        ));
    }
    if query.select.is_empty() && !query.is_delete() {
        return Err(ConvertError::malformed_query());
    }
    Ok(())
}

/// A FeatureServer query can count rows or project columns, never both.
pub fn validate_count_star_alone(select: &[SelectItem]) -> Result<()> {
    if select.len() > 1 && select.iter().any(SelectItem::is_count_star) {
        return Err(ConvertError::QueryNotValid(
            COUNT_STAR_WITH_COLUMNS.to_string(),
        ));
    }
    Ok(())
}
