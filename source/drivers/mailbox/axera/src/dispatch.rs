// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Receive dispatcher: interrupt servicing and handler delivery
//! OWNERS: @bsp
//! STATUS: Functional
//!
//! PUBLIC API:
//!   - MessageHandler: consumer callback, implemented for closures
//!   - DispatcherBuilder: injects the handler and delivery mode at construction
//!   - Dispatcher::on_interrupt(): service one status read
//!   - Dispatcher::service(): service until the line is quiet
//!   - Dispatcher::register_callback()/clear_callback(): late rebinding
//!
//! DELIVERY:
//!   - Deferred: the copied message goes through a bounded queue to one worker
//!     thread; arrival order is kept, and a full queue drops and counts
//!   - Inline: the handler runs on the interrupt path and must not block
//!
//! Without a handler, messages are dropped and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ax_hal::{Bus, ClockGate};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, error, warn};
use parking_lot::RwLock;

use crate::controller::{Inbound, IrqOutcome, Mailbox};
use crate::error::{MailboxError, Result};
use crate::power::NoClock;

/// Upper bound on status reads per `service` call.
pub const MAX_EVENTS_PER_SERVICE: usize = 64;

/// Consumer of inbound messages.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, inbound: &Inbound);
}

impl<F> MessageHandler for F
where
    F: Fn(&Inbound) + Send + Sync,
{
    fn on_message(&self, inbound: &Inbound) {
        self(inbound)
    }
}

type SharedHandler = Arc<dyn MessageHandler>;

/// Where the handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// On the interrupt path.
    Inline,
    /// On a worker thread fed by a queue of `depth` messages.
    Deferred { depth: usize },
}

impl Default for Delivery {
    fn default() -> Self {
        Self::Deferred { depth: 64 }
    }
}

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub dropped_no_handler: u64,
    pub dropped_queue_full: u64,
    /// Messages that arrived after the delivery worker died.
    pub dropped_worker_gone: u64,
    pub malformed: u64,
    /// Interrupts that found no event pending.
    pub spurious: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    dropped_no_handler: AtomicU64,
    dropped_queue_full: AtomicU64,
    dropped_worker_gone: AtomicU64,
    malformed: AtomicU64,
    spurious: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_no_handler: self.dropped_no_handler.load(Ordering::Relaxed),
            dropped_queue_full: self.dropped_queue_full.load(Ordering::Relaxed),
            dropped_worker_gone: self.dropped_worker_gone.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            spurious: self.spurious.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    handler: RwLock<Option<SharedHandler>>,
    counters: Counters,
}

impl Shared {
    fn deliver(&self, inbound: &Inbound) {
        // Clone out so the handler runs without the lock held.
        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => {
                handler.on_message(inbound);
                Counters::bump(&self.counters.delivered);
            }
            None => {
                debug!("mailbox: no handler, dropping message on {}", inbound.channel);
                Counters::bump(&self.counters.dropped_no_handler);
            }
        }
    }
}

/// Configures and starts a [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    handler: Option<SharedHandler>,
    delivery: Delivery,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(mut self, handler: impl MessageHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Starts the dispatcher; spawns the worker for deferred delivery.
    pub fn build<B, C>(self, mailbox: Arc<Mailbox<B, C>>) -> Result<Dispatcher<B, C>>
    where
        B: Bus,
        C: ClockGate,
    {
        let shared = Arc::new(Shared { handler: RwLock::new(self.handler), counters: Counters::default() });
        let (queue, worker) = match self.delivery {
            Delivery::Inline => (None, None),
            Delivery::Deferred { depth } => {
                let (tx, rx) = crossbeam_channel::bounded(depth.max(1));
                let worker_shared = Arc::clone(&shared);
                let worker = thread::Builder::new()
                    .name(format!("mbox-{}", mailbox.local()))
                    .spawn(move || run_worker(rx, worker_shared))
                    .map_err(|err| {
                        error!("mailbox: failed to spawn delivery worker: {err}");
                        MailboxError::WorkerGone
                    })?;
                (Some(tx), Some(worker))
            }
        };
        Ok(Dispatcher { mailbox, shared, queue, worker })
    }
}

fn run_worker(rx: Receiver<Inbound>, shared: Arc<Shared>) {
    for inbound in rx.iter() {
        shared.deliver(&inbound);
    }
    debug!("mailbox: delivery worker exiting");
}

/// Services a mailbox's interrupt and hands messages to the handler.
pub struct Dispatcher<B: Bus, C: ClockGate = NoClock> {
    mailbox: Arc<Mailbox<B, C>>,
    shared: Arc<Shared>,
    queue: Option<Sender<Inbound>>,
    worker: Option<JoinHandle<()>>,
}

impl<B: Bus, C: ClockGate> Dispatcher<B, C> {
    pub fn mailbox(&self) -> &Arc<Mailbox<B, C>> {
        &self.mailbox
    }

    /// Installs `handler`, replacing any previous one.
    pub fn register_callback(&self, handler: impl MessageHandler + 'static) {
        *self.shared.handler.write() = Some(Arc::new(handler));
    }

    pub fn clear_callback(&self) {
        *self.shared.handler.write() = None;
    }

    pub fn has_callback(&self) -> bool {
        self.shared.handler.read().is_some()
    }

    pub fn stats(&self) -> DispatchStats {
        self.shared.counters.snapshot()
    }

    /// Messages waiting for the worker.
    pub fn queued(&self) -> usize {
        self.queue.as_ref().map_or(0, Sender::len)
    }

    /// Services one interrupt status read.
    pub fn on_interrupt(&self) -> IrqOutcome {
        let outcome = self.mailbox.handle_irq();
        if outcome == IrqOutcome::Spurious {
            Counters::bump(&self.shared.counters.spurious);
        }
        self.route(&outcome);
        outcome
    }

    /// Services events until the status reads empty; returns events handled.
    ///
    /// The read that finds the line quiet ends the loop and is not counted;
    /// only a call that finds nothing at all is a spurious interrupt.
    pub fn service(&self) -> usize {
        let mut handled = 0;
        while handled < MAX_EVENTS_PER_SERVICE {
            let outcome = self.mailbox.handle_irq();
            if outcome == IrqOutcome::Spurious {
                if handled == 0 {
                    Counters::bump(&self.shared.counters.spurious);
                }
                break;
            }
            self.route(&outcome);
            handled += 1;
        }
        handled
    }

    fn route(&self, outcome: &IrqOutcome) {
        let counters = &self.shared.counters;
        match outcome {
            IrqOutcome::Spurious => {}
            IrqOutcome::Malformed(_) => Counters::bump(&counters.malformed),
            IrqOutcome::Message(inbound) => match &self.queue {
                None => self.shared.deliver(inbound),
                Some(queue) => match queue.try_send(*inbound) {
                    Ok(()) => {}
                    Err(TrySendError::Full(dropped)) => {
                        warn!("mailbox: delivery queue full, dropping message on {}", dropped.channel);
                        Counters::bump(&counters.dropped_queue_full);
                    }
                    Err(TrySendError::Disconnected(dropped)) => {
                        error!("mailbox: delivery worker gone, dropping message on {}", dropped.channel);
                        Counters::bump(&counters.dropped_worker_gone);
                    }
                },
            },
        }
    }

    /// Stops the worker after it drains the queue.
    pub fn shutdown(mut self) -> Result<DispatchStats> {
        self.stop()?;
        Ok(self.stats())
    }

    fn stop(&mut self) -> Result<()> {
        self.queue.take();
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| {
                error!("mailbox: delivery worker panicked");
                MailboxError::WorkerGone
            }),
            None => Ok(()),
        }
    }
}

impl<B: Bus, C: ClockGate> Drop for Dispatcher<B, C> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ChannelId, MasterId};
    use crate::message::Message;
    use crate::regs;
    use crate::sim::SimMailbox;
    use parking_lot::Mutex;

    fn post(sim: &SimMailbox, from: MasterId, to: MasterId, tag: u32) -> ChannelId {
        let mbox = Mailbox::new(sim, from);
        mbox.send_message(from, to, &Message::from_words([tag; 8])).unwrap()
    }

    #[test]
    fn inline_delivery_calls_handler_on_interrupt_path() {
        let sim = Arc::new(SimMailbox::new(3));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = DispatcherBuilder::new()
            .delivery(Delivery::Inline)
            .handler(move |inbound: &Inbound| sink.lock().push(inbound.message.words()[0]))
            .build(Arc::new(Mailbox::new(Arc::clone(&sim), MasterId::RISCV)))
            .unwrap();

        post(&sim, MasterId::ARM0, MasterId::RISCV, 7);
        assert!(matches!(dispatcher.on_interrupt(), IrqOutcome::Message(_)));
        assert_eq!(*seen.lock(), vec![7]);
        assert_eq!(dispatcher.stats().delivered, 1);
    }

    #[test]
    fn missing_handler_drops_and_counts() {
        let sim = Arc::new(SimMailbox::new(3));
        let dispatcher = DispatcherBuilder::new()
            .delivery(Delivery::Inline)
            .build(Arc::new(Mailbox::new(Arc::clone(&sim), MasterId::ARM1)))
            .unwrap();
        assert!(!dispatcher.has_callback());

        let ch = post(&sim, MasterId::ARM0, MasterId::ARM1, 1);
        dispatcher.on_interrupt();
        assert_eq!(dispatcher.stats().dropped_no_handler, 1);
        // The slot was still drained and handed back.
        assert_eq!(sim.owner(ch), None);
    }

    #[test]
    fn late_registration_replaces_handler() {
        let sim = Arc::new(SimMailbox::new(3));
        let dispatcher = DispatcherBuilder::new()
            .delivery(Delivery::Inline)
            .handler(|_: &Inbound| panic!("replaced handler must not run"))
            .build(Arc::new(Mailbox::new(Arc::clone(&sim), MasterId::ARM0)))
            .unwrap();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        dispatcher.register_callback(move |_: &Inbound| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        post(&sim, MasterId::RISCV, MasterId::ARM0, 3);
        dispatcher.on_interrupt();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        dispatcher.clear_callback();
        post(&sim, MasterId::RISCV, MasterId::ARM0, 4);
        dispatcher.on_interrupt();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.stats().dropped_no_handler, 1);
    }

    #[test]
    fn deferred_delivery_keeps_arrival_order() {
        let sim = Arc::new(SimMailbox::new(3));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = DispatcherBuilder::new()
            .delivery(Delivery::Deferred { depth: 32 })
            .handler(move |inbound: &Inbound| sink.lock().push(inbound.message.words()[0]))
            .build(Arc::new(Mailbox::new(Arc::clone(&sim), MasterId::RISCV)))
            .unwrap();

        for tag in 0..20 {
            post(&sim, MasterId::ARM0, MasterId::RISCV, tag);
        }
        assert_eq!(dispatcher.service(), 20);
        let stats = dispatcher.shutdown().unwrap();
        assert_eq!(stats.delivered, 20);
        assert_eq!(*seen.lock(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let sim = Arc::new(SimMailbox::new(3));
        let gate = Arc::new(parking_lot::Mutex::new(()));
        let held = gate.lock();
        let worker_gate = Arc::clone(&gate);
        let dispatcher = DispatcherBuilder::new()
            .delivery(Delivery::Deferred { depth: 1 })
            .handler(move |_: &Inbound| drop(worker_gate.lock()))
            .build(Arc::new(Mailbox::new(Arc::clone(&sim), MasterId::ARM1)))
            .unwrap();

        // One message blocks the worker, one fills the queue, the rest drop.
        for tag in 0..6 {
            post(&sim, MasterId::ARM0, MasterId::ARM1, tag);
            dispatcher.on_interrupt();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        drop(held);
        let stats = dispatcher.shutdown().unwrap();
        assert_eq!(stats.delivered + stats.dropped_queue_full, 6);
        assert!(stats.dropped_queue_full >= 3, "{stats:?}");
    }

    #[test]
    fn service_counts_only_idle_calls_as_spurious() {
        let sim = Arc::new(SimMailbox::new(3));
        let dispatcher = DispatcherBuilder::new()
            .delivery(Delivery::Inline)
            .handler(|_: &Inbound| {})
            .build(Arc::new(Mailbox::new(Arc::clone(&sim), MasterId::RISCV)))
            .unwrap();

        post(&sim, MasterId::ARM0, MasterId::RISCV, 1);
        post(&sim, MasterId::ARM1, MasterId::RISCV, 2);
        assert_eq!(dispatcher.service(), 2);
        assert_eq!(dispatcher.stats().spurious, 0);
        assert_eq!(dispatcher.stats().delivered, 2);

        assert_eq!(dispatcher.service(), 0);
        assert_eq!(dispatcher.stats().spurious, 1);
    }

    #[test]
    fn dead_worker_drops_are_counted_apart_from_full_queue() {
        let sim = Arc::new(SimMailbox::new(3));
        let dispatcher = DispatcherBuilder::new()
            .delivery(Delivery::Deferred { depth: 4 })
            .handler(|_: &Inbound| panic!("handler failure takes the worker down"))
            .build(Arc::new(Mailbox::new(Arc::clone(&sim), MasterId::ARM0)))
            .unwrap();

        for tag in 0..30 {
            post(&sim, MasterId::RISCV, MasterId::ARM0, tag);
            dispatcher.on_interrupt();
            if dispatcher.stats().dropped_worker_gone > 0 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        let stats = dispatcher.stats();
        assert!(stats.dropped_worker_gone > 0, "{stats:?}");
        assert_eq!(stats.dropped_queue_full, 0);
        assert_eq!(dispatcher.shutdown(), Err(MailboxError::WorkerGone));
    }

    #[test]
    fn malformed_and_spurious_are_counted() {
        let sim = Arc::new(SimMailbox::new(3));
        let dispatcher = DispatcherBuilder::new()
            .delivery(Delivery::Inline)
            .handler(|_: &Inbound| panic!("no message expected"))
            .build(Arc::new(Mailbox::new(Arc::clone(&sim), MasterId::ARM0)))
            .unwrap();

        assert_eq!(dispatcher.on_interrupt(), IrqOutcome::Spurious);
        // An info word naming a missing receiver raises ERR_SLAVE on the sender.
        let slot = ChannelId::new(sim.read(regs::search(MasterId::ARM0))).unwrap();
        sim.write(regs::info(slot), 0x9000_0020);
        assert!(matches!(dispatcher.on_interrupt(), IrqOutcome::Malformed(_)));
        assert!(!sim.irq_pending(MasterId::ARM0));

        let stats = dispatcher.stats();
        assert_eq!((stats.spurious, stats.malformed, stats.delivered), (1, 1, 0));
    }
}
