//! Shared E2E test helpers.
//!
//! Provides a fake cluster handle, a simulated compose project for driving the
//! real `ClusterManager`, a scripted phase executor and config builders.

pub mod cluster;
pub mod config;
