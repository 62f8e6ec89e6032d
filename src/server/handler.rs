//! # Contrato con el Handler de Conexiones
//! src/server/handler.rs
//!
//! El núcleo no sabe nada de HTTP: para él atender una conexión es una
//! llamada bloqueante opaca. Quien implementa `ConnectionHandler` decide
//! qué se lee y qué se responde.

use crate::server::state::ConnectionId;
use crate::stats::WorkerStats;
use std::time::{Duration, SystemTime};

/// Datos de planificación que el worker le pasa al handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub connection: ConnectionId,

    /// Índice del worker (0..N-1)
    pub worker: usize,

    /// Cuándo el dispatcher admitió la conexión
    pub arrival: SystemTime,

    /// Cuándo un worker la sacó de pending
    pub dispatched: SystemTime,
}

impl Dispatch {
    /// Tiempo que la conexión pasó esperando en pending
    pub fn queue_delay(&self) -> Duration {
        self.dispatched
            .duration_since(self.arrival)
            .unwrap_or(Duration::ZERO)
    }
}

/// Colaborador externo que atiende y cierra conexiones
///
/// `close` recibe el stream por valor: cada conexión se cierra exactamente
/// una vez, ya sea al terminar, al ser desalojada o al ser rechazada.
pub trait ConnectionHandler<S>: Send + Sync + 'static {
    /// Atiende la conexión. Puede bloquear; nunca debe propagar errores
    /// de protocolo al worker.
    fn serve(&self, stream: &mut S, dispatch: &Dispatch, stats: &WorkerStats);

    /// Libera la conexión
    fn close(&self, stream: S);
}
