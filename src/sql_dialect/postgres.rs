pub mod postgres {
    use std::sync::LazyLock;

    use crate::sql_dialect::sql_dialect::{SqlDialect, has_reserved_segment, is_literal_keyword};

    use derivative::Derivative;
    use regex::Regex;

    static PLAIN_IDENTIFIER: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").unwrap());

    // Dataset tables are often named by UUID
    static PLAIN_TABLE_NAME: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").unwrap());

    #[derive(Derivative)]
    #[derivative(Default)]
    pub struct Postgres {
        pub postgres_escape_literal: Option<Box<dyn Fn(&str) -> String + Send + Sync>>,
    }

    impl SqlDialect for Postgres {
        fn escape_literal(&self, string: &str) -> String {
            match &self.postgres_escape_literal {
                Some(escape) => escape(string),
                None => format!("'{}'", string.replace('\'', "''")),
            }
        }

        fn quote_identifier(&self, identifier: &str) -> String {
            if PLAIN_IDENTIFIER.is_match(identifier)
                && !has_reserved_segment(identifier, &['.'])
                && !is_literal_keyword(identifier)
            {
                identifier.to_string()
            } else {
                self.escape_identifier(identifier)
            }
        }

        fn quote_table_name(&self, table: &str) -> String {
            if PLAIN_TABLE_NAME.is_match(table) && !has_reserved_segment(table, &['.', '-']) {
                table.to_string()
            } else {
                self.escape_identifier(table)
            }
        }
    }
}
