// tests/integration/main.rs

#[path = "../common/mod.rs"]
mod common;

mod approval;
mod edges;
mod propagation;
mod remediation;
mod subjects;
mod trigger;
mod watchdog;
