//! # Políticas de Sobrecarga
//! src/server/policy.rs
//!
//! Deciden qué pasa cuando llega una conexión y pending + running ya llegó
//! a la capacidad. Se elige una al arrancar y no cambia.
//!
//! | CLI      | Política                | Efecto                                            |
//! |----------|-------------------------|---------------------------------------------------|
//! | `block`  | `Block`                 | espera a que un worker libere lugar y admite      |
//! | `random` | `DropRandomHalf`        | desaloja ⌈pending/2⌉ al azar y admite             |
//! | `dh`     | `DropHead`              | desaloja la más vieja de pending y admite         |
//! | `dt`     | `DropTail`              | rechaza la nueva                                  |
//! | `bf`     | `BlockUntilWorkersIdle` | espera a que running o pending se vacíe y rechaza |
//!
//! Las políticas corren dentro del dispatcher con el lock tomado.

use crate::server::state::{Connection, Queues, ServerState};
use clap::ValueEnum;
use rand::Rng;
use std::fmt;
use std::sync::MutexGuard;

/// Política de sobrecarga
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum OverloadPolicy {
    /// Bloquea el dispatcher hasta que haya lugar
    #[value(name = "block")]
    Block,

    /// Desaloja la mitad (redondeando hacia arriba) de pending al azar
    #[value(name = "random")]
    DropRandomHalf,

    /// Desaloja el head de pending
    #[value(name = "dh")]
    DropHead,

    /// Rechaza la conexión nueva
    #[value(name = "dt")]
    DropTail,

    /// Espera a que el sistema se descargue y después rechaza
    #[value(name = "bf")]
    BlockUntilWorkersIdle,
}

impl OverloadPolicy {
    /// Nombre usado en la línea de comandos
    pub fn as_str(&self) -> &'static str {
        match self {
            OverloadPolicy::Block => "block",
            OverloadPolicy::DropRandomHalf => "random",
            OverloadPolicy::DropHead => "dh",
            OverloadPolicy::DropTail => "dt",
            OverloadPolicy::BlockUntilWorkersIdle => "bf",
        }
    }

    /// Resuelve una saturación
    ///
    /// Recibe el guard de las colas y lo devuelve: las políticas que bloquean
    /// lo sueltan mientras esperan en `slot_freed`. Las conexiones desalojadas
    /// vuelven en `Resolution::evicted` para que el dispatcher las cierre.
    pub fn resolve<'a, S, R>(
        self,
        state: &'a ServerState<S>,
        mut queues: MutexGuard<'a, Queues<S>>,
        rng: &mut R,
    ) -> (MutexGuard<'a, Queues<S>>, Resolution<S>)
    where
        R: Rng + ?Sized,
    {
        let capacity = state.capacity();

        match self {
            OverloadPolicy::Block => {
                let queues =
                    state.wait_slot_freed_while(queues, |q| q.is_saturated(capacity));
                (queues, Resolution::admit())
            }
            OverloadPolicy::BlockUntilWorkersIdle => {
                let queues = state.wait_slot_freed_while(queues, |q| {
                    !q.running.is_empty() && !q.pending.is_empty()
                });
                (queues, Resolution::reject())
            }
            OverloadPolicy::DropRandomHalf => {
                let resolution = drop_random_half(&mut PolicyContext::new(&mut *queues, capacity), rng);
                (queues, resolution)
            }
            OverloadPolicy::DropHead => {
                let resolution = drop_head(&mut PolicyContext::new(&mut *queues, capacity));
                (queues, resolution)
            }
            OverloadPolicy::DropTail => (queues, Resolution::reject()),
        }
    }
}

impl fmt::Display for OverloadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qué hacer con la conexión que disparó la política
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Reject,
}

/// Resultado de aplicar una política
#[derive(Debug)]
pub struct Resolution<S> {
    pub verdict: Verdict,

    /// Conexiones sacadas de pending (todavía sin cerrar)
    pub evicted: Vec<Connection<S>>,
}

impl<S> Resolution<S> {
    fn admit() -> Self {
        Self { verdict: Verdict::Admit, evicted: Vec::new() }
    }

    fn reject() -> Self {
        Self { verdict: Verdict::Reject, evicted: Vec::new() }
    }
}

/// Vista de las colas que necesitan las políticas que desalojan
pub struct PolicyContext<'q, S> {
    queues: &'q mut Queues<S>,
    capacity: usize,
}

impl<'q, S> PolicyContext<'q, S> {
    pub fn new(queues: &'q mut Queues<S>, capacity: usize) -> Self {
        Self { queues, capacity }
    }

    pub fn pending_len(&self) -> usize {
        self.queues.pending.len()
    }

    pub fn running_len(&self) -> usize {
        self.queues.running.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Saca la conexión más vieja de pending
    pub fn evict_head(&mut self) -> Option<Connection<S>> {
        self.queues.pending.dequeue().ok().map(|entry| entry.handle)
    }

    /// Saca la conexión en la posición `index` de pending
    pub fn evict_at(&mut self, index: usize) -> Option<Connection<S>> {
        self.queues.pending.dequeue_at(index).ok().map(|entry| entry.handle)
    }
}

fn drop_head<S>(ctx: &mut PolicyContext<'_, S>) -> Resolution<S> {
    match ctx.evict_head() {
        Some(evicted) => Resolution { verdict: Verdict::Admit, evicted: vec![evicted] },
        None => Resolution::reject(),
    }
}

fn drop_random_half<S, R>(ctx: &mut PolicyContext<'_, S>, rng: &mut R) -> Resolution<S>
where
    R: Rng + ?Sized,
{
    if ctx.pending_len() == 0 {
        return Resolution::reject();
    }

    let quota = (ctx.pending_len() + 1) / 2;
    let mut evicted = Vec::with_capacity(quota);

    for _ in 0..quota {
        // El índice se sortea contra el tamaño actual, que baja en cada vuelta
        let len = ctx.pending_len();
        if len == 0 {
            break;
        }
        if let Some(connection) = ctx.evict_at(rng.gen_range(0..len)) {
            evicted.push(connection);
        }
    }

    Resolution { verdict: Verdict::Admit, evicted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::state::ConnectionId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn state_with(workers: usize, capacity: usize, pending: &[u64], running: &[u64]) -> Arc<ServerState<u64>> {
        let state = ServerState::new(workers, capacity).unwrap();
        {
            let mut queues = state.lock();
            let now = SystemTime::now();
            for id in pending {
                queues.pending.enqueue(Connection::new(ConnectionId(*id), *id), now).unwrap();
            }
            for id in running {
                queues.running.enqueue(ConnectionId(*id), now).unwrap();
            }
        }
        state
    }

    fn pending_ids(queues: &Queues<u64>) -> Vec<u64> {
        queues.pending().iter().map(|entry| entry.handle.id().0).collect()
    }

    #[test]
    fn test_cli_names() {
        assert_eq!(OverloadPolicy::from_str("block", false), Ok(OverloadPolicy::Block));
        assert_eq!(OverloadPolicy::from_str("random", false), Ok(OverloadPolicy::DropRandomHalf));
        assert_eq!(OverloadPolicy::from_str("dh", false), Ok(OverloadPolicy::DropHead));
        assert_eq!(OverloadPolicy::from_str("dt", false), Ok(OverloadPolicy::DropTail));
        assert_eq!(OverloadPolicy::from_str("bf", false), Ok(OverloadPolicy::BlockUntilWorkersIdle));
        assert!(OverloadPolicy::from_str("fifo", false).is_err());

        for policy in OverloadPolicy::value_variants() {
            assert_eq!(OverloadPolicy::from_str(&policy.to_string(), false), Ok(*policy));
        }
    }

    #[test]
    fn test_drop_tail_rejects_without_touching_pending() {
        let state = state_with(1, 3, &[1, 2, 3], &[]);
        let mut rng = StdRng::seed_from_u64(1);

        let (queues, resolution) = OverloadPolicy::DropTail.resolve(&state, state.lock(), &mut rng);

        assert_eq!(resolution.verdict, Verdict::Reject);
        assert!(resolution.evicted.is_empty());
        assert_eq!(pending_ids(&queues), vec![1, 2, 3]);
    }

    #[test]
    fn test_drop_head_evicts_oldest() {
        let state = state_with(1, 3, &[1, 2, 3], &[]);
        let mut rng = StdRng::seed_from_u64(1);

        let (queues, resolution) = OverloadPolicy::DropHead.resolve(&state, state.lock(), &mut rng);

        assert_eq!(resolution.verdict, Verdict::Admit);
        assert_eq!(resolution.evicted.len(), 1);
        assert_eq!(resolution.evicted[0].id(), ConnectionId(1));
        assert_eq!(pending_ids(&queues), vec![2, 3]);
    }

    #[test]
    fn test_drop_head_with_empty_pending_rejects() {
        let state = state_with(2, 2, &[], &[10, 11]);
        let mut rng = StdRng::seed_from_u64(1);

        let (queues, resolution) = OverloadPolicy::DropHead.resolve(&state, state.lock(), &mut rng);

        assert_eq!(resolution.verdict, Verdict::Reject);
        assert!(resolution.evicted.is_empty());
        assert_eq!(queues.running().len(), 2);
    }

    #[test]
    fn test_random_evicts_half_rounded_up() {
        for seed in 0..20 {
            let state = state_with(1, 5, &[1, 2, 3, 4, 5], &[]);
            let mut rng = StdRng::seed_from_u64(seed);

            let (queues, resolution) =
                OverloadPolicy::DropRandomHalf.resolve(&state, state.lock(), &mut rng);

            assert_eq!(resolution.verdict, Verdict::Admit);
            assert_eq!(resolution.evicted.len(), 3);

            let evicted: HashSet<u64> = resolution.evicted.iter().map(|c| c.id().0).collect();
            assert_eq!(evicted.len(), 3, "evicted entries must be distinct");

            let remaining = pending_ids(&queues);
            assert_eq!(remaining.len(), 2);
            assert!(remaining.iter().all(|id| !evicted.contains(id)));
            // El resto conserva su orden relativo
            assert!(remaining.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_random_single_pending_entry() {
        let state = state_with(2, 3, &[1], &[10, 11]);
        let mut rng = StdRng::seed_from_u64(3);

        let (queues, resolution) =
            OverloadPolicy::DropRandomHalf.resolve(&state, state.lock(), &mut rng);

        assert_eq!(resolution.verdict, Verdict::Admit);
        assert_eq!(resolution.evicted.len(), 1);
        assert!(queues.pending().is_empty());
    }

    #[test]
    fn test_random_with_empty_pending_rejects() {
        let state = state_with(2, 2, &[], &[10, 11]);
        let mut rng = StdRng::seed_from_u64(1);

        let (_queues, resolution) =
            OverloadPolicy::DropRandomHalf.resolve(&state, state.lock(), &mut rng);

        assert_eq!(resolution.verdict, Verdict::Reject);
        assert!(resolution.evicted.is_empty());
    }

    #[test]
    fn test_bf_rejects_immediately_when_pending_empty() {
        let state = state_with(2, 2, &[], &[10, 11]);
        let mut rng = StdRng::seed_from_u64(1);

        let (queues, resolution) =
            OverloadPolicy::BlockUntilWorkersIdle.resolve(&state, state.lock(), &mut rng);

        assert_eq!(resolution.verdict, Verdict::Reject);
        assert_eq!(queues.running().len(), 2);
    }

    #[test]
    fn test_policy_context_view() {
        let state = state_with(2, 4, &[1, 2, 3], &[9]);
        let mut queues = state.lock();
        let mut ctx = PolicyContext::new(&mut *queues, 4);

        assert_eq!(ctx.pending_len(), 3);
        assert_eq!(ctx.running_len(), 1);
        assert_eq!(ctx.capacity(), 4);

        assert_eq!(ctx.evict_at(1).map(|c| c.id()), Some(ConnectionId(2)));
        assert!(ctx.evict_at(5).is_none());
        assert_eq!(ctx.evict_head().map(|c| c.id()), Some(ConnectionId(1)));
        assert_eq!(ctx.pending_len(), 1);
    }
}
