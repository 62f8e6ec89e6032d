//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Núcleo de admisión y despacho:
//! 1. `Dispatcher` acepta conexiones y aplica la `OverloadPolicy` si hay saturación
//! 2. `WorkerPool` saca conexiones de pending y las atiende
//! 3. `ServerState` es el único dominio de coordinación (lock + dos condvars)
//!
//! `Server` arma todo sobre un `TcpListener`.

pub mod dispatcher;
pub mod handler;
pub mod policy;
pub mod state;
pub mod tcp;
pub mod worker;

// Re-exportar para facilitar el uso
pub use dispatcher::{Admission, Dispatcher};
pub use handler::{ConnectionHandler, Dispatch};
pub use policy::{OverloadPolicy, PolicyContext, Resolution, Verdict};
pub use state::{Connection, ConnectionId, QueueSnapshot, Queues, ServerState};
pub use tcp::Server;
pub use worker::WorkerPool;
