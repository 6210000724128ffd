use std::collections::VecDeque;

use crate::monitor::record::LogRecord;

/// The buffered record categories. Metrics are not queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueCategory {
    Errors,
    Requests,
}

impl QueueCategory {
    pub const ALL: [QueueCategory; 2] = [QueueCategory::Errors, QueueCategory::Requests];

    /// `type` of the batch payload carrying this queue's records.
    pub fn batch_type(&self) -> &'static str {
        match self {
            QueueCategory::Errors => "error",
            QueueCategory::Requests => "batchXHR",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueCategory::Errors => "errors",
            QueueCategory::Requests => "requests",
        }
    }
}

/// What the caller must do after a push.
#[derive(Debug, PartialEq)]
pub enum PushOutcome {
    Queued,
    /// Capacity was reached; the queue has already been drained into this batch.
    Full(Vec<LogRecord>),
}

/// FIFO buffer that hands back its contents once `capacity` records accumulate.
#[derive(Debug)]
pub struct BoundedQueue {
    category: QueueCategory,
    capacity: usize,
    entries: VecDeque<LogRecord>,
}

impl BoundedQueue {
    pub fn new(category: QueueCategory, capacity: usize) -> Self {
        Self {
            category,
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn category(&self) -> QueueCategory {
        self.category
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, record: LogRecord) -> PushOutcome {
        self.entries.push_back(record);
        if self.entries.len() >= self.capacity {
            PushOutcome::Full(self.drain())
        } else {
            PushOutcome::Queued
        }
    }

    /// Takes every queued record in insertion order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<LogRecord> {
        self.entries.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
