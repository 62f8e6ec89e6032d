//! # Estadísticas de Workers
//! src/stats/mod.rs
//!
//! Contadores por worker que el handler de requests reporta al cliente
//! en los headers `Stat-Thread-*`.

pub mod worker;

pub use worker::{RequestKind, StatsTable, WorkerStats, WorkerStatsSnapshot};
