// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered delivery of decoded messages to subscribers.
//!
//! Events pass through a bounded channel into a single worker task, so
//! subscribers observe messages in exactly the order the line produced
//! them, and a slow subscriber backpressures the receive loop instead of
//! reordering or dropping frames.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::Result;
use crate::frame::{Direction, Message};

/// Queue capacity between the receive loop and the dispatch worker.
const EVENT_QUEUE_CAPACITY: usize = 64;

/// A decoded message together with its line classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub message: Message,
    pub direction: Direction,
}

impl MessageEvent {
    /// Re-encode the wire frame (CRC included) this event corresponds to.
    ///
    /// Messages re-encode to the exact frame they were parsed from, so the
    /// raw bytes are reproduced on demand instead of being carried along.
    pub fn frame_bytes(&self) -> Result<Vec<u8>> {
        self.message.encode_frame()
    }
}

type Subscriber = Box<dyn Fn(&MessageEvent) + Send + Sync>;

/// Fan-out point for decoded messages.
pub struct EventDispatcher {
    tx: mpsc::Sender<MessageEvent>,
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl EventDispatcher {
    /// Start the dispatch worker; it runs until cancelled.
    #[must_use]
    pub fn spawn(cancel: CancellationToken) -> Self {
        let (tx, mut rx) = mpsc::channel::<MessageEvent>(EVENT_QUEUE_CAPACITY);
        let subscribers: Arc<RwLock<Vec<Subscriber>>> = Arc::default();

        let worker_subscribers = Arc::clone(&subscribers);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                let subscribers = worker_subscribers
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                for subscriber in subscribers.iter() {
                    subscriber(&event);
                }
            }
        });

        Self { tx, subscribers }
    }

    /// Register a subscriber at the end of the notification order.
    pub fn subscribe(&self, subscriber: impl Fn(&MessageEvent) + Send + Sync + 'static) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(subscriber));
    }

    /// Enqueue an event, waiting when the queue is full.
    ///
    /// Events published after shutdown are dropped.
    pub async fn publish(&self, event: MessageEvent) {
        if self.tx.send(event).await.is_err() {
            trace!("event dropped, dispatcher already shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FunctionCode, ReadRequest};
    use std::sync::Mutex;
    use std::time::Duration;

    fn read_request(register: u16) -> Message {
        Message::ReadRequest(ReadRequest {
            unit: 0x11,
            function: FunctionCode::ReadHoldingRegisters,
            register,
            count: 1,
        })
    }

    #[tokio::test]
    async fn subscribers_see_events_in_publish_order() {
        let cancel = CancellationToken::new();
        let dispatcher = EventDispatcher::spawn(cancel.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dispatcher.subscribe(move |event| {
            if let Message::ReadRequest(req) = &event.message {
                sink.lock().unwrap().push(req.register);
            }
        });

        for register in 0..10 {
            dispatcher
                .publish(MessageEvent {
                    message: read_request(register),
                    direction: Direction::Request,
                })
                .await;
        }

        // The worker drains asynchronously.
        tokio::time::timeout(Duration::from_secs(1), async {
            while seen.lock().unwrap().len() < 10 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());

        cancel.cancel();
    }

    #[tokio::test]
    async fn event_reproduces_its_wire_frame() {
        let event = MessageEvent {
            message: Message::ReadRequest(ReadRequest {
                unit: 0x11,
                function: FunctionCode::ReadHoldingRegisters,
                register: 0x6B,
                count: 3,
            }),
            direction: Direction::Request,
        };
        assert_eq!(
            event.frame_bytes().unwrap(),
            &[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03, 0x76, 0x87]
        );
    }
}
