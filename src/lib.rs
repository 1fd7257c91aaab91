//! Cost metering, budget alerting, and usage analytics core for an
//! LLM-gateway analytics platform.
//!
//! The crate turns a stream of per-request [`models::UsageRecord`]s into
//! budget consumption state with tiered alerting ([`services::BudgetService`])
//! and multi-dimensional usage rollups ([`services::UsageAnalyticsService`],
//! [`services::RollupService`], [`services::CacheMetricsService`]).
//!
//! Storage is an external collaborator reached through the repository traits
//! in [`db::repos`]. [`db::Store::in_memory`] provides a concurrent in-memory
//! implementation for tests and single-process embedders; production
//! deployments supply their own trait implementations over a durable store.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
