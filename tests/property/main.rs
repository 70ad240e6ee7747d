// tests/property/main.rs

#[path = "../common/mod.rs"]
mod common;

mod comparators;
mod graph_acyclicity;
mod schedule_next;
