//! Scenario tests for the sensitivity engine
//!
//! Tests are organized by topic:
//! - `ordering` - Canonical grid order and restoration after out-of-order completion
//! - `failures` - Job failures, failure policies and cancellation
//! - `configuration` - Errors raised before any job is dispatched
//! - `namespaces` - Output paths of baseline and perturbed searches
//! - `executors` - Collation against faulty and real executors

mod failures;
mod support;
