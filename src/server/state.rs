//! # Estado Compartido del Servidor
//! src/server/state.rs
//!
//! Un único dominio de coordinación compartido entre el dispatcher y todos
//! los workers:
//! - un `Mutex` que protege las dos colas (pending y running)
//! - `new_request`: hay una conexión nueva en pending (esperan los workers)
//! - `slot_freed`: un worker terminó y liberó su lugar (espera el dispatcher)
//!
//! Se construye una vez al arrancar y se comparte con `Arc`, así cada test
//! puede tener su propia instancia.

use crate::queue::{BoundedQueue, QueueError};
use crate::stats::StatsTable;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

/// Identificador de una conexión aceptada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle opaco de una conexión: su id y el stream que la representa
///
/// Dos conexiones son iguales si tienen el mismo id; el stream no se compara.
#[derive(Debug)]
pub struct Connection<S> {
    id: ConnectionId,
    stream: S,
}

impl<S> Connection<S> {
    pub fn new(id: ConnectionId, stream: S) -> Self {
        Self { id, stream }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_stream(self) -> S {
        self.stream
    }
}

impl<S> PartialEq for Connection<S> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Lo que protege el lock: las dos colas y el flag de apagado
#[derive(Debug)]
pub struct Queues<S> {
    /// Conexiones aceptadas esperando un worker
    pub(crate) pending: BoundedQueue<Connection<S>>,

    /// Conexiones que algún worker está atendiendo
    pub(crate) running: BoundedQueue<ConnectionId>,

    /// Cuando es true los workers terminan al vaciar pending
    pub(crate) shutdown: bool,
}

impl<S> Queues<S> {
    /// pending + running
    pub fn occupancy(&self) -> usize {
        self.pending.len() + self.running.len()
    }

    /// El servidor está saturado cuando pending + running llega a la capacidad
    pub fn is_saturated(&self, capacity: usize) -> bool {
        self.occupancy() >= capacity
    }

    pub fn pending(&self) -> &BoundedQueue<Connection<S>> {
        &self.pending
    }

    pub fn running(&self) -> &BoundedQueue<ConnectionId> {
        &self.running
    }
}

/// Ocupación de las colas en un instante
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub pending: usize,
    pub running: usize,
    pub capacity: usize,
    /// Cuánto lleva esperando la conexión más vieja de pending
    pub oldest_pending_ms: Option<u64>,
}

/// Estado compartido del servidor
pub struct ServerState<S> {
    queues: Mutex<Queues<S>>,
    new_request: Condvar,
    slot_freed: Condvar,

    /// Capacidad total (pending + running) antes de aplicar la política
    capacity: usize,

    /// Un slot de estadísticas por worker
    stats: StatsTable,
}

impl<S> ServerState<S> {
    /// Crea el estado para `workers` workers y una cola de `queue_size` conexiones
    ///
    /// pending tiene capacidad `queue_size`, running tiene capacidad `workers`
    /// y la saturación se mide contra `queue_size`.
    pub fn new(workers: usize, queue_size: usize) -> Result<Arc<Self>, QueueError> {
        let queues = Queues {
            pending: BoundedQueue::new(queue_size)?,
            running: BoundedQueue::new(workers)?,
            shutdown: false,
        };

        Ok(Arc::new(Self {
            queues: Mutex::new(queues),
            new_request: Condvar::new(),
            slot_freed: Condvar::new(),
            capacity: queue_size,
            stats: StatsTable::new(workers),
        }))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn workers(&self) -> usize {
        self.stats.len()
    }

    pub fn stats(&self) -> &StatsTable {
        &self.stats
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn running_len(&self) -> usize {
        self.lock().running.len()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let queues = self.lock();
        let oldest_pending_ms = queues.pending.peek_head_arrival().ok().map(|arrival| {
            SystemTime::now()
                .duration_since(arrival)
                .unwrap_or(Duration::ZERO)
                .as_millis() as u64
        });

        QueueSnapshot {
            pending: queues.pending.len(),
            running: queues.running.len(),
            capacity: self.capacity,
            oldest_pending_ms,
        }
    }

    /// Pide a los workers que terminen cuando pending quede vacío
    pub fn shutdown(&self) {
        let mut queues = self.lock();
        queues.shutdown = true;
        self.new_request.notify_all();
        self.slot_freed.notify_all();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutdown
    }

    /// Toma el lock de las colas
    ///
    /// Si otro thread hizo panic con el lock tomado seguimos igual: los
    /// handlers nunca corren con el lock, así que las colas quedan consistentes.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Queues<S>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Espera en `new_request` hasta que haya algo en pending o se pida apagar
    pub(crate) fn wait_for_request<'a>(
        &self,
        queues: MutexGuard<'a, Queues<S>>,
    ) -> MutexGuard<'a, Queues<S>> {
        self.new_request
            .wait_while(queues, |q| q.pending.is_empty() && !q.shutdown)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Espera en `slot_freed` mientras `condition` sea verdadera
    pub(crate) fn wait_slot_freed_while<'a, F>(
        &self,
        queues: MutexGuard<'a, Queues<S>>,
        condition: F,
    ) -> MutexGuard<'a, Queues<S>>
    where
        F: FnMut(&mut Queues<S>) -> bool,
    {
        self.slot_freed
            .wait_while(queues, condition)
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notify_new_request(&self) {
        self.new_request.notify_one();
    }

    pub(crate) fn notify_slot_freed(&self) {
        self.slot_freed.notify_one();
    }
}

impl<S> fmt::Debug for ServerState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerState")
            .field("capacity", &self.capacity)
            .field("workers", &self.workers())
            .finish_non_exhaustive()
    }
}
