use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use anyhow::Context as _;
use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::{
    engine::{BusMessage, BusRef, MessageKind},
    foundation::{core::EngineState, error::MixResult},
};

/// Classified pipeline bus message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusEvent {
    /// An element failed. Sink disconnects and similar faults only surface here.
    Error {
        source: Option<String>,
        detail: String,
    },
    Warning {
        source: Option<String>,
        detail: String,
    },
    EndOfStream,
    StateChanged {
        source: Option<String>,
        old: EngineState,
        new: EngineState,
    },
    /// Everything else.
    Info {
        source: Option<String>,
        detail: String,
    },
}

impl BusEvent {
    pub fn classify(message: BusMessage) -> Self {
        let BusMessage {
            kind,
            source,
            detail,
        } = message;
        match kind {
            MessageKind::Error => BusEvent::Error { source, detail },
            MessageKind::Warning => BusEvent::Warning { source, detail },
            MessageKind::Eos => BusEvent::EndOfStream,
            MessageKind::StateChanged { old, new } => BusEvent::StateChanged { source, old, new },
            MessageKind::Info => BusEvent::Info { source, detail },
            MessageKind::Other(kind) => BusEvent::Info {
                source,
                detail: if detail.is_empty() {
                    kind
                } else {
                    format!("{kind}: {detail}")
                },
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, BusEvent::Error { .. })
    }
}

/// Background reader of one pipeline bus.
///
/// Only reads and classifies; it never touches the graph.
pub(crate) struct BusMonitor {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    events: Receiver<BusEvent>,
}

impl BusMonitor {
    pub(crate) fn spawn(
        pipeline: String,
        bus: BusRef,
        poll: Duration,
        capacity: usize,
    ) -> MixResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name(format!("bus-{pipeline}"))
            .spawn(move || drain(&pipeline, bus.as_ref(), poll, &flag, &tx))
            .context("spawn bus monitor thread")?;
        Ok(Self {
            stop,
            handle: Some(handle),
            events: rx,
        })
    }

    pub(crate) fn events(&self) -> Receiver<BusEvent> {
        self.events.clone()
    }

    /// Stop the reader and wait for it; returns within one poll interval.
    pub(crate) fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("bus monitor thread panicked");
        }
    }
}

impl Drop for BusMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn drain(
    pipeline: &str,
    bus: &dyn crate::engine::Bus,
    poll: Duration,
    stop: &AtomicBool,
    tx: &Sender<BusEvent>,
) {
    tracing::debug!(pipeline, "bus monitor started");
    while !stop.load(Ordering::Acquire) {
        let Some(message) = bus.timed_pop(poll) else {
            continue;
        };
        let event = BusEvent::classify(message);
        log_event(pipeline, &event);
        if let Err(TrySendError::Full(event)) = tx.try_send(event) {
            tracing::debug!(pipeline, ?event, "bus event channel full, event dropped");
        }
    }
    tracing::debug!(pipeline, "bus monitor stopped");
}

fn log_event(pipeline: &str, event: &BusEvent) {
    match event {
        BusEvent::Error { source, detail } => {
            tracing::error!(pipeline, source = source.as_deref().unwrap_or("-"), "{detail}");
        }
        BusEvent::Warning { source, detail } => {
            tracing::warn!(pipeline, source = source.as_deref().unwrap_or("-"), "{detail}");
        }
        BusEvent::EndOfStream => tracing::info!(pipeline, "end of stream"),
        BusEvent::StateChanged { source, old, new } => {
            tracing::debug!(pipeline, source = source.as_deref().unwrap_or("-"), ?old, ?new, "state changed");
        }
        BusEvent::Info { source, detail } => {
            tracing::debug!(pipeline, source = source.as_deref().unwrap_or("-"), "{detail}");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/bus.rs"]
mod tests;
