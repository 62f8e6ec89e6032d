//! # Cola Acotada de Conexiones
//! src/queue/bounded.rs
//!
//! Cola FIFO con capacidad máxima que guarda pares (handle, tiempo de llegada).
//! Además del FIFO normal permite remover por índice y buscar por valor,
//! que es lo que necesitan las políticas de sobrecarga y los workers.
//!
//! La cola NO tiene sincronización interna: quien la usa debe tenerla
//! protegida por el lock del servidor.

use std::collections::VecDeque;
use std::time::SystemTime;
use thiserror::Error;

/// Errores de las operaciones de la cola
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// dequeue/peek sobre una cola vacía
    #[error("queue is empty")]
    EmptyQueue,

    /// Índice fuera de rango en `dequeue_at`
    #[error("invalid index {index} (queue size {len})")]
    InvalidIndex { index: usize, len: usize },

    /// No se pudo reservar memoria para la cola
    #[error("cannot allocate queue with capacity {capacity}")]
    AllocationFailure { capacity: usize },
}

/// Una entrada de la cola: el handle y cuándo llegó
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry<T> {
    pub handle: T,
    pub arrival: SystemTime,
}

impl<T> QueueEntry<T> {
    pub fn new(handle: T, arrival: SystemTime) -> Self {
        Self { handle, arrival }
    }
}

/// Cola FIFO acotada
#[derive(Debug)]
pub struct BoundedQueue<T> {
    /// Entradas en orden de llegada (head = índice 0)
    entries: VecDeque<QueueEntry<T>>,

    /// Capacidad máxima de la cola
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Crea una cola vacía reservando toda su capacidad de una vez
    ///
    /// # Errores
    ///
    /// `QueueError::AllocationFailure` si no hay memoria para `capacity` entradas.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        let mut entries = VecDeque::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| QueueError::AllocationFailure { capacity })?;

        Ok(Self { entries, capacity })
    }

    /// Número de entradas actuales
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Capacidad máxima
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    /// Encola al final
    ///
    /// Si la cola está llena la entrada se devuelve en `Err` sin tocar la cola.
    /// El caller decide qué hacer con ella (normalmente cerrarla).
    pub fn enqueue(&mut self, handle: T, arrival: SystemTime) -> Result<(), QueueEntry<T>> {
        let entry = QueueEntry::new(handle, arrival);
        if self.is_full() {
            return Err(entry);
        }

        self.entries.push_back(entry);
        Ok(())
    }

    /// Saca la entrada más antigua (head)
    pub fn dequeue(&mut self) -> Result<QueueEntry<T>, QueueError> {
        self.entries.pop_front().ok_or(QueueError::EmptyQueue)
    }

    /// Saca la entrada en la posición `index` (0 = head)
    ///
    /// El orden relativo del resto de entradas no cambia.
    pub fn dequeue_at(&mut self, index: usize) -> Result<QueueEntry<T>, QueueError> {
        let len = self.entries.len();
        self.entries
            .remove(index)
            .ok_or(QueueError::InvalidIndex { index, len })
    }

    /// Tiempo de llegada del head, sin sacarlo
    pub fn peek_head_arrival(&self) -> Result<SystemTime, QueueError> {
        self.entries
            .front()
            .map(|entry| entry.arrival)
            .ok_or(QueueError::EmptyQueue)
    }

    /// Itera desde el head hasta el tail
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry<T>> {
        self.entries.iter()
    }
}

impl<T: PartialEq> BoundedQueue<T> {
    /// Busca la primera posición (desde el head) cuyo handle es igual a `handle`
    ///
    /// Retorna `None` si no está en la cola.
    pub fn find_index(&self, handle: &T) -> Option<usize> {
        self.entries.iter().position(|entry| entry.handle == *handle)
    }
}
