//! # Colas Acotadas
//! src/queue/mod.rs
//!
//! El servidor usa dos instancias independientes:
//! - `pending`: conexiones aceptadas que esperan un worker (capacidad = tamaño de cola)
//! - `running`: conexiones que un worker está atendiendo (capacidad = número de workers)

pub mod bounded;

pub use bounded::{BoundedQueue, QueueEntry, QueueError};
