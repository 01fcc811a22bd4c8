//! End-to-end tests driving the worker crate against the local object store.

mod helpers;

mod backup_test;
mod retention_test;
mod schedule_test;
