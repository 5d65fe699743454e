pub mod postgres;
pub mod sql_dialect;
