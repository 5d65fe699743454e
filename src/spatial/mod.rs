pub mod geometry;
pub mod predicate;
