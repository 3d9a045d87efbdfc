// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ping/pong traffic between three masters sharing the software mailbox model.
//!
//! ARM0 pings ARM1 and the RISC-V core each round; both answer with a pong
//! carrying the same sequence number. Every master has its own controller,
//! dispatcher and interrupt service thread.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use mailbox_axera::{
    Delivery, DispatchStats, Dispatcher, DispatcherBuilder, Inbound, Mailbox, MailboxConfig, MailboxError,
    MasterId, Message, SimMailbox,
};

const PING: u8 = 0x01;
const PONG: u8 = 0x02;

/// Pings awaiting a pong. Keeps pings and pongs together well below the
/// slot count so responders can always find a slot for their reply.
const MAX_IN_FLIGHT: u64 = 8;

type SimDispatcher = Dispatcher<Arc<SimMailbox>>;

#[derive(Parser, Debug)]
#[command(name = "mbox-sim", about = "Mailbox ping/pong on the software model")]
struct Args {
    /// Pings sent to each peer.
    #[arg(long, default_value_t = 100)]
    rounds: u32,
    /// TOML file selecting the delivery mode and queue depth.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seconds to wait for the last pong.
    #[arg(long, default_value_t = 5)]
    timeout: u64,
    /// More log output; repeat for more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();
}

/// Sends, backing off while every slot is taken.
fn send_retry(mbox: &Mailbox<Arc<SimMailbox>>, to: MasterId, msg: &Message) -> mailbox_axera::Result<()> {
    loop {
        match mbox.send_message(mbox.local(), to, msg) {
            Ok(_) => return Ok(()),
            Err(MailboxError::NoFreeChannel { .. }) => thread::yield_now(),
            Err(err) => return Err(err),
        }
    }
}

fn responder(sim: &Arc<SimMailbox>, master: MasterId, delivery: Delivery) -> Result<SimDispatcher> {
    let mbox = Arc::new(Mailbox::new(Arc::clone(sim), master));
    let replier = Arc::clone(&mbox);
    let dispatcher = DispatcherBuilder::new()
        .delivery(delivery)
        .handler(move |inbound: &Inbound| {
            let (Some(from), PING) = (inbound.sender(), inbound.message.id()) else {
                warn!("{master}: unexpected message on {}", inbound.channel);
                return;
            };
            let pong = Message::with_id(PONG, &inbound.message.data()[..4]).unwrap_or_default();
            if let Err(err) = send_retry(&replier, from, &pong) {
                warn!("{master}: pong to {from} failed: {err}");
            }
        })
        .build(mbox)
        .with_context(|| format!("starting dispatcher for {master}"))?;
    Ok(dispatcher)
}

fn spawn_irq_thread(sim: Arc<SimMailbox>, dispatcher: Arc<SimDispatcher>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    let master = dispatcher.mailbox().local();
    thread::spawn(move || {
        while !stop.load(Ordering::Acquire) {
            if sim.wait_irq(master, Duration::from_millis(10)) {
                dispatcher.service();
            }
        }
    })
}

fn report(master: MasterId, stats: DispatchStats) {
    let name = master.to_string();
    println!(
        "{name:>6}: delivered={} no_handler={} queue_full={} worker_gone={} malformed={} spurious={}",
        stats.delivered,
        stats.dropped_no_handler,
        stats.dropped_queue_full,
        stats.dropped_worker_gone,
        stats.malformed,
        stats.spurious
    );
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => MailboxConfig::load(path)?,
        None => MailboxConfig::default(),
    };
    let delivery = config.delivery();
    info!("delivery mode {delivery:?}, {} rounds", args.rounds);

    let sim = Arc::new(SimMailbox::new(3));
    let pongs = Arc::new(AtomicU64::new(0));

    let arm0 = Arc::new(Mailbox::new(Arc::clone(&sim), MasterId::ARM0));
    let counter = Arc::clone(&pongs);
    let initiator = DispatcherBuilder::new()
        .delivery(delivery)
        .handler(move |inbound: &Inbound| {
            if inbound.message.id() == PONG {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        })
        .build(Arc::clone(&arm0))?;

    let dispatchers = vec![
        Arc::new(initiator),
        Arc::new(responder(&sim, MasterId::ARM1, delivery)?),
        Arc::new(responder(&sim, MasterId::RISCV, delivery)?),
    ];
    let stop = Arc::new(AtomicBool::new(false));
    let irq_threads: Vec<_> = dispatchers
        .iter()
        .map(|dispatcher| spawn_irq_thread(Arc::clone(&sim), Arc::clone(dispatcher), Arc::clone(&stop)))
        .collect();

    let started = Instant::now();
    let deadline = started + Duration::from_secs(args.timeout);
    let mut sent = 0u64;
    'rounds: for round in 0..args.rounds {
        let ping = Message::with_id(PING, &round.to_le_bytes()).unwrap_or_default();
        for peer in [MasterId::ARM1, MasterId::RISCV] {
            while sent - pongs.load(Ordering::Relaxed) >= MAX_IN_FLIGHT {
                if Instant::now() >= deadline {
                    warn!("timed out at round {round}");
                    break 'rounds;
                }
                thread::yield_now();
            }
            send_retry(&arm0, peer, &ping).with_context(|| format!("ping {round} to {peer}"))?;
            sent += 1;
        }
    }

    let expected = u64::from(args.rounds) * 2;
    while pongs.load(Ordering::Relaxed) < sent && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    let elapsed = started.elapsed();

    stop.store(true, Ordering::Release);
    sim.kick();
    for handle in irq_threads {
        if handle.join().is_err() {
            bail!("interrupt service thread panicked");
        }
    }

    for dispatcher in &dispatchers {
        report(dispatcher.mailbox().local(), dispatcher.stats());
    }
    let received = pongs.load(Ordering::Relaxed);
    println!("pongs {received}/{expected} in {elapsed:?}");
    if received != expected {
        bail!("lost {} pongs", expected - received);
    }
    Ok(())
}
