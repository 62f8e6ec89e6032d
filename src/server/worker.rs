//! # Pool de Workers
//! src/server/worker.rs
//!
//! N threads de larga vida. Cada uno repite:
//! 1. esperar a que haya algo en pending
//! 2. moverlo de pending a running (con el lock tomado)
//! 3. atenderlo sin el lock
//! 4. cerrarlo, sacarlo de running y avisar en `slot_freed`

use crate::server::handler::{ConnectionHandler, Dispatch};
use crate::server::state::{Connection, ConnectionId, ServerState};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// Pool fijo de workers
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Lanza un worker por cada slot de estadísticas del estado
    ///
    /// Si algún thread no se puede crear, los que ya arrancaron se apagan y
    /// se esperan antes de retornar el error.
    pub fn spawn<S, H>(state: Arc<ServerState<S>>, handler: Arc<H>) -> io::Result<Self>
    where
        S: Send + 'static,
        H: ConnectionHandler<S>,
    {
        Self::spawn_with(state, handler, |_, builder, work| builder.spawn(work))
    }

    fn spawn_with<S, H, F>(state: Arc<ServerState<S>>, handler: Arc<H>, mut spawn_thread: F) -> io::Result<Self>
    where
        S: Send + 'static,
        H: ConnectionHandler<S>,
        F: FnMut(usize, thread::Builder, WorkerBody) -> io::Result<JoinHandle<()>>,
    {
        let mut handles = Vec::with_capacity(state.workers());

        for index in 0..state.workers() {
            let worker_state = Arc::clone(&state);
            let handler = Arc::clone(&handler);

            // `index` se copia dentro del closure: cada worker tiene el suyo
            let builder = thread::Builder::new().name(format!("worker-{}", index));
            let body: WorkerBody = Box::new(move || worker_loop(index, worker_state, handler));

            match spawn_thread(index, builder, body) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(worker = index, "cannot spawn worker: {}", e);
                    state.shutdown();
                    Self { handles }.join();
                    return Err(e);
                }
            }
        }

        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Espera a que todos los workers terminen
    ///
    /// Solo retorna si antes se llamó a `ServerState::shutdown`.
    pub fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.join() {
                error!("worker thread panicked: {:?}", e);
            }
        }
    }
}

fn worker_loop<S, H>(index: usize, state: Arc<ServerState<S>>, handler: Arc<H>)
where
    H: ConnectionHandler<S>,
{
    let Some(stats) = state.stats().slot(index) else {
        error!(worker = index, "no stats slot for worker");
        return;
    };
    info!(worker = index, "worker started");

    while let Some((mut connection, arrival)) = take_next(&state) {
        let dispatch = Dispatch {
            connection: connection.id(),
            worker: index,
            arrival,
            dispatched: SystemTime::now(),
        };
        debug!(worker = index, connection = %dispatch.connection, "dispatching");

        let served = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.serve(connection.stream_mut(), &dispatch, stats)
        }));
        if served.is_err() {
            error!(worker = index, connection = %dispatch.connection, "handler panicked");
        }

        let id = connection.id();
        let closed = panic::catch_unwind(AssertUnwindSafe(|| handler.close(connection.into_stream())));
        if closed.is_err() {
            error!(worker = index, connection = %id, "close panicked");
        }
        release_slot(&state, id);
    }

    info!(worker = index, "worker stopped");
}

/// Espera una conexión y la mueve de pending a running
///
/// Retorna `None` cuando se pidió apagar y pending quedó vacío.
pub(crate) fn take_next<S>(state: &ServerState<S>) -> Option<(Connection<S>, SystemTime)> {
    let queues = state.lock();
    let mut queues = state.wait_for_request(queues);

    let arrival = queues.pending.peek_head_arrival().ok()?;
    let entry = queues.pending.dequeue().ok()?;
    let id = entry.handle.id();

    if queues.running.enqueue(id, arrival).is_err() {
        // running tiene capacidad = workers y cada worker ocupa un lugar
        warn!(connection = %id, "running queue full");
    }

    Some((entry.handle, arrival))
}

/// Saca `id` de running y despierta al dispatcher
pub(crate) fn release_slot<S>(state: &ServerState<S>, id: ConnectionId) {
    let mut queues = state.lock();

    match queues.running.find_index(&id) {
        Some(index) => {
            if let Err(e) = queues.running.dequeue_at(index) {
                warn!(connection = %id, "cannot release running slot: {}", e);
            }
        }
        None => warn!(connection = %id, "connection not found in running queue"),
    }

    state.notify_slot_freed();
}
