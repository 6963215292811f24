//! Infrastructure: event store, command dispatch, read models, projections,
//! and the multi-aggregate document flows.
//!
//! Nothing in this crate makes business decisions; domain crates do. This
//! crate makes those decisions durable, concurrent-safe, and queryable.

pub mod command_dispatcher;
pub mod event_store;
pub mod flows;
pub mod projections;
pub mod read_model;
pub mod reference_index;
pub mod sinks;

#[cfg(test)]
mod integration_tests;
