//! Core module - Stock, ledger and reporting operations.
//! Every operation takes a `SeaORM` connection and is independent of any
//! user interface. Mutations that touch more than one row run in a single
//! transaction.

pub mod consumption;
pub mod material;
pub mod pagination;
pub mod product;
pub mod report;
pub mod unit;
