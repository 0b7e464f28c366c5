//! Database queries

pub mod audit;
pub mod drop;
pub mod fleet;
pub mod route;
