/// Words the grammar reads as keywords, they must be quoted to be used as identifiers.
pub const RESERVED_WORDS: [&str; 29] = [
    "and", "as", "asc", "by", "cross", "delete", "desc", "distinct", "from", "full", "group",
    "having", "ilike", "in", "inner", "is", "join", "left", "like", "limit", "not", "offset", "on",
    "or", "order", "outer", "right", "select", "where",
];

pub fn is_reserved_word(word: &str) -> bool {
    RESERVED_WORDS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(word))
}

/// Bare words the parser reads as `NULL`, `TRUE` or `FALSE` rather than as columns.
pub const LITERAL_KEYWORDS: [&str; 3] = ["null", "true", "false"];

pub fn is_literal_keyword(word: &str) -> bool {
    LITERAL_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(word))
}

/// True when any `separators`-delimited segment of `name` is a reserved word.
pub fn has_reserved_segment(name: &str, separators: &[char]) -> bool {
    name.split(separators).any(is_reserved_word)
}

pub trait SqlDialect: Send + Sync {
    fn escape_literal(&self, string: &str) -> String {
        format!("'{}'", string.replace('\'', "''"))
    }

    fn escape_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Column or alias name, quoted only when the bare form would not parse back.
    fn quote_identifier(&self, identifier: &str) -> String;

    fn quote_table_name(&self, table: &str) -> String;
}
