//! # Estadísticas por Worker
//! src/stats/worker.rs
//!
//! Cada worker tiene su propio slot con tres contadores (static, dynamic, total).
//! Solo el worker dueño escribe su slot, así que no hace falta lock: usamos
//! atómicos con orden `Relaxed`. Un lector que recorre toda la tabla puede ver
//! valores de distintos instantes (no hay atomicidad sobre el arreglo completo).

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tipo de request según lo que pidió el cliente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Contenido estático
    Static,

    /// Contenido dinámico (CGI)
    Dynamic,
}

/// Contadores de un worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    static_hits: AtomicU64,
    dynamic_hits: AtomicU64,
    total_hits: AtomicU64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un request atendido exitosamente
    pub fn record(&self, kind: RequestKind) {
        match kind {
            RequestKind::Static => self.static_hits.fetch_add(1, Ordering::Relaxed),
            RequestKind::Dynamic => self.dynamic_hits.fetch_add(1, Ordering::Relaxed),
        };
        self.total_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Registra un request que terminó en error (solo cuenta en el total)
    pub fn record_error(&self) {
        self.total_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn static_hits(&self) -> u64 {
        self.static_hits.load(Ordering::Relaxed)
    }

    pub fn dynamic_hits(&self) -> u64 {
        self.dynamic_hits.load(Ordering::Relaxed)
    }

    pub fn total_hits(&self) -> u64 {
        self.total_hits.load(Ordering::Relaxed)
    }
}

/// Snapshot de un worker (para uso externo)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStatsSnapshot {
    pub worker: usize,
    pub static_hits: u64,
    pub dynamic_hits: u64,
    pub total_hits: u64,
}

/// Tabla con un slot por worker, indexada por el índice del worker
#[derive(Debug)]
pub struct StatsTable {
    slots: Vec<WorkerStats>,
}

impl StatsTable {
    pub fn new(workers: usize) -> Self {
        Self {
            slots: (0..workers).map(|_| WorkerStats::new()).collect(),
        }
    }

    /// Slot del worker `index`
    pub fn slot(&self, index: usize) -> Option<&WorkerStats> {
        self.slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Copia los contadores de todos los workers
    pub fn snapshot(&self) -> Vec<WorkerStatsSnapshot> {
        self.slots
            .iter()
            .enumerate()
            .map(|(worker, slot)| WorkerStatsSnapshot {
                worker,
                static_hits: slot.static_hits(),
                dynamic_hits: slot.dynamic_hits(),
                total_hits: slot.total_hits(),
            })
            .collect()
    }

    /// Suma de `total_hits` de todos los workers
    pub fn total_hits(&self) -> u64 {
        self.slots.iter().map(WorkerStats::total_hits).sum()
    }

    /// Snapshot en JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "workers": self.snapshot(),
            "total_hits": self.total_hits(),
        })
    }
}
