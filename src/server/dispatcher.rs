//! # Dispatcher (loop de aceptación)
//! src/server/dispatcher.rs
//!
//! Un solo thread que acepta conexiones y decide si entran a pending.
//! Las decisiones de admisión quedan serializadas por el lock del estado:
//! solo una aceptación a la vez puede mirar o cambiar la ocupación.

use crate::server::handler::ConnectionHandler;
use crate::server::policy::{OverloadPolicy, Verdict};
use crate::server::state::{Connection, ConnectionId, ServerState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Resultado de intentar admitir una conexión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Quedó en pending
    Admitted(ConnectionId),

    /// La política la rechazó y ya está cerrada
    Rejected(ConnectionId),
}

impl Admission {
    pub fn id(&self) -> ConnectionId {
        match self {
            Admission::Admitted(id) | Admission::Rejected(id) => *id,
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

/// Loop de aceptación con su política de sobrecarga
pub struct Dispatcher<S, H> {
    state: Arc<ServerState<S>>,
    handler: Arc<H>,
    policy: OverloadPolicy,
    rng: StdRng,
    next_id: u64,
}

impl<S, H> Dispatcher<S, H>
where
    H: ConnectionHandler<S>,
{
    pub fn new(state: Arc<ServerState<S>>, handler: Arc<H>, policy: OverloadPolicy) -> Self {
        Self {
            state,
            handler,
            policy,
            rng: StdRng::from_entropy(),
            next_id: 0,
        }
    }

    /// Reemplaza el generador aleatorio (para tests reproducibles)
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn policy(&self) -> OverloadPolicy {
        self.policy
    }

    /// Acepta conexiones hasta que `incoming` se termine
    ///
    /// Con `TcpListener::incoming()` esto no retorna nunca. Los errores de
    /// accept se registran y se sigue con la siguiente.
    pub fn run<I>(&mut self, incoming: I)
    where
        I: IntoIterator<Item = io::Result<S>>,
    {
        info!(policy = %self.policy, capacity = self.state.capacity(), "dispatcher started");

        for stream in incoming {
            match stream {
                Ok(stream) => {
                    self.admit(stream);
                }
                Err(e) => warn!("error accepting connection: {}", e),
            }
        }

        info!("dispatcher stopped: no more incoming connections");
    }

    /// Admite una conexión recién aceptada
    ///
    /// Si el servidor está saturado aplica la política antes de encolar.
    /// Toda conexión rechazada o desalojada se cierra antes de retornar.
    pub fn admit(&mut self, stream: S) -> Admission {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        let connection = Connection::new(id, stream);

        let state = Arc::clone(&self.state);
        let mut queues = state.lock();
        let mut evicted = Vec::new();

        if queues.is_saturated(state.capacity()) {
            debug!(
                connection = %id,
                pending = queues.pending.len(),
                running = queues.running.len(),
                policy = %self.policy,
                "server saturated"
            );

            let (guard, resolution) = self.policy.resolve(&state, queues, &mut self.rng);
            queues = guard;
            evicted = resolution.evicted;

            if resolution.verdict == Verdict::Reject {
                drop(queues);
                self.close_evicted(evicted);
                info!(connection = %id, policy = %self.policy, "connection rejected");
                self.handler.close(connection.into_stream());
                return Admission::Rejected(id);
            }
        }

        let admitted = queues.pending.enqueue(connection, SystemTime::now());
        if admitted.is_ok() {
            state.notify_new_request();
        }
        drop(queues);

        self.close_evicted(evicted);

        match admitted {
            Ok(()) => {
                debug!(connection = %id, "connection admitted");
                Admission::Admitted(id)
            }
            Err(entry) => {
                // pending + running nunca pasa de la capacidad, pero si pasara
                // la conexión no se puede perder sin cerrarla
                warn!(connection = %id, "pending queue full, closing connection");
                self.handler.close(entry.handle.into_stream());
                Admission::Rejected(id)
            }
        }
    }

    fn close_evicted(&self, evicted: Vec<Connection<S>>) {
        for connection in evicted {
            info!(connection = %connection.id(), policy = %self.policy, "connection evicted");
            self.handler.close(connection.into_stream());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::testing::RecordingHandler;
    use crate::server::worker::release_slot;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    /// Estado con `running` ocupado y `pending` cargado por el propio dispatcher
    fn setup(
        workers: usize,
        capacity: usize,
        policy: OverloadPolicy,
    ) -> (Arc<ServerState<u64>>, Arc<RecordingHandler>, Dispatcher<u64, RecordingHandler>) {
        let state = ServerState::new(workers, capacity).unwrap();
        let handler = Arc::new(RecordingHandler::new());
        let dispatcher = Dispatcher::new(Arc::clone(&state), Arc::clone(&handler), policy)
            .with_rng(StdRng::seed_from_u64(7));
        (state, handler, dispatcher)
    }

    fn occupy_running(state: &ServerState<u64>, ids: &[u64]) {
        let mut queues = state.lock();
        for id in ids {
            queues.running.enqueue(ConnectionId(*id), SystemTime::now()).unwrap();
        }
    }

    fn pending_streams(state: &ServerState<u64>) -> Vec<u64> {
        let mut queues = state.lock();
        let mut streams = Vec::new();
        while let Ok(entry) = queues.pending.dequeue() {
            streams.push(entry.handle.into_stream());
        }
        streams
    }

    #[test]
    fn test_admit_below_capacity() {
        let (state, handler, mut dispatcher) = setup(2, 4, OverloadPolicy::DropTail);
        assert_eq!(dispatcher.policy(), OverloadPolicy::DropTail);

        let first = dispatcher.admit(100);
        let second = dispatcher.admit(101);

        assert_eq!(first, Admission::Admitted(ConnectionId(0)));
        assert_eq!(second, Admission::Admitted(ConnectionId(1)));
        assert_eq!(state.pending_len(), 2);
        assert!(handler.closed_ids().is_empty());
    }

    #[test]
    fn test_drop_tail_rejects_newest() {
        let (state, handler, mut dispatcher) = setup(1, 3, OverloadPolicy::DropTail);
        for stream in [1, 2, 3] {
            assert!(dispatcher.admit(stream).is_admitted());
        }

        let admission = dispatcher.admit(4);

        assert_eq!(admission, Admission::Rejected(ConnectionId(3)));
        assert_eq!(handler.closed_ids(), vec![4]);
        assert_eq!(pending_streams(&state), vec![1, 2, 3]);
    }

    #[test]
    fn test_drop_tail_with_busy_workers() {
        let (state, handler, mut dispatcher) = setup(2, 3, OverloadPolicy::DropTail);
        occupy_running(&state, &[90, 91]);
        assert!(dispatcher.admit(1).is_admitted());

        assert!(!dispatcher.admit(2).is_admitted());
        assert_eq!(state.pending_len(), 1);
        assert_eq!(handler.closed_ids(), vec![2]);
    }

    #[test]
    fn test_drop_head_replaces_oldest() {
        let (state, handler, mut dispatcher) = setup(1, 3, OverloadPolicy::DropHead);
        for stream in [1, 2, 3] {
            dispatcher.admit(stream);
        }

        assert!(dispatcher.admit(4).is_admitted());

        assert_eq!(handler.closed_ids(), vec![1]);
        assert_eq!(pending_streams(&state), vec![2, 3, 4]);
    }

    #[test]
    fn test_drop_head_rejects_when_only_running() {
        let (state, handler, mut dispatcher) = setup(2, 2, OverloadPolicy::DropHead);
        occupy_running(&state, &[90, 91]);

        assert!(!dispatcher.admit(1).is_admitted());
        assert_eq!(handler.closed_ids(), vec![1]);
        assert_eq!(state.pending_len(), 0);
    }

    #[test]
    fn test_random_drops_half_then_admits() {
        let (state, handler, mut dispatcher) = setup(1, 5, OverloadPolicy::DropRandomHalf);
        for stream in 1..=5 {
            dispatcher.admit(stream);
        }

        assert!(dispatcher.admit(6).is_admitted());

        let closed = handler.closed_ids();
        assert_eq!(closed.len(), 3);
        assert!(!closed.contains(&6));

        let remaining = pending_streams(&state);
        assert_eq!(remaining.len(), 3);
        assert_eq!(remaining.last(), Some(&6));
        assert!(remaining.iter().all(|s| !closed.contains(s)));
    }

    #[test]
    fn test_block_waits_for_free_slot() {
        let (state, handler, mut dispatcher) = setup(2, 3, OverloadPolicy::Block);
        occupy_running(&state, &[90, 91]);
        dispatcher.admit(1);

        let (tx, rx) = mpsc::channel();
        let blocked = thread::spawn(move || {
            let admission = dispatcher.admit(2);
            tx.send(admission).unwrap();
        });

        // Saturado: no puede admitir todavía
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
        assert_eq!(state.pending_len(), 1);

        release_slot(&state, ConnectionId(90));

        let admission = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        blocked.join().unwrap();

        assert!(admission.is_admitted());
        assert_eq!(state.pending_len(), 2);
        assert_eq!(state.running_len(), 1);
        assert!(handler.closed_ids().is_empty());
    }

    #[test]
    fn test_bf_waits_then_rejects() {
        let (state, handler, mut dispatcher) = setup(2, 3, OverloadPolicy::BlockUntilWorkersIdle);
        occupy_running(&state, &[90, 91]);
        dispatcher.admit(1);

        let (tx, rx) = mpsc::channel();
        let blocked = thread::spawn(move || {
            tx.send(dispatcher.admit(2)).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());

        // Con un worker libre sigue habiendo running y pending: sigue esperando
        release_slot(&state, ConnectionId(90));
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());

        release_slot(&state, ConnectionId(91));
        let admission = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        blocked.join().unwrap();

        assert!(!admission.is_admitted());
        assert_eq!(handler.closed_ids(), vec![2]);
        assert_eq!(state.pending_len(), 1);
    }

    #[test]
    fn test_run_skips_accept_errors() {
        let (state, handler, mut dispatcher) = setup(1, 4, OverloadPolicy::DropTail);

        let incoming = vec![
            Ok(1),
            Err(io::Error::new(io::ErrorKind::ConnectionAborted, "aborted")),
            Ok(2),
        ];
        dispatcher.run(incoming);

        assert_eq!(state.pending_len(), 2);
        assert!(handler.closed_ids().is_empty());
    }
}
