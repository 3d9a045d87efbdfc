// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end send and receive between masters sharing one modelled block.

use ax_hal::Bus;
use mailbox_axera::regs::{self, Register};
use mailbox_axera::sim::{Access, Op};
use mailbox_axera::{
    ChannelId, InfoWord, IrqOutcome, Mailbox, MailboxError, MasterId, Message, SimMailbox, NUM_CHANNELS,
};

fn received(outcome: IrqOutcome) -> mailbox_axera::Inbound {
    match outcome {
        IrqOutcome::Message(inbound) => inbound,
        other => panic!("expected a message, got {other:?}"),
    }
}

#[test]
fn arm0_to_riscv_round_trip() {
    let sim = SimMailbox::new(3);
    let arm0 = Mailbox::new(&sim, MasterId::ARM0);
    let riscv = Mailbox::new(&sim, MasterId::RISCV);

    let msg = Message::with_id(0x11, b"hello riscv").unwrap();
    let ch = arm0.send_message(MasterId::ARM0, MasterId::RISCV, &msg).unwrap();
    assert!(sim.irq_pending(MasterId::RISCV));
    assert!(!sim.irq_pending(MasterId::ARM1));

    let inbound = received(riscv.handle_irq());
    assert_eq!(inbound.channel, ch);
    assert_eq!(inbound.message, msg);
    assert_eq!(inbound.sender(), Some(MasterId::ARM0));
    assert_eq!(inbound.info().unwrap(), InfoWord::new(MasterId::ARM0, MasterId::RISCV, ch));

    // Acknowledged and drained: the line drops and the slot is free again.
    assert!(!sim.irq_pending(MasterId::RISCV));
    assert_eq!(sim.owner(ch), None);
    assert_eq!(riscv.handle_irq(), IrqOutcome::Spurious);
}

#[test]
fn send_writes_payload_before_info() {
    let sim = SimMailbox::new(3);
    let arm0 = Mailbox::new(&sim, MasterId::ARM0);
    // Occupy slots 0..5 so the send lands on channel 5.
    for _ in 0..5 {
        sim.read(regs::search(MasterId::ARM1));
    }
    sim.record_accesses(true);
    let ch = arm0.send_message(MasterId::ARM0, MasterId::RISCV, &Message::default()).unwrap();
    assert_eq!(ch.raw(), 5);

    let log = sim.take_log();
    assert_eq!(log[0], Access { op: Op::Read, offset: 0x308, value: 5 });
    assert!(log[1..9].iter().all(|a| a.op == Op::Write && a.register() == Some(Register::Data(ch))));
    assert_eq!(log[9], Access { op: Op::Write, offset: 0x114, value: 0x2005_0020 });
    assert_eq!(log.len(), 10);
}

#[test]
fn exhausted_block_fails_closed() {
    let sim = SimMailbox::new(3);
    let arm1 = Mailbox::new(&sim, MasterId::ARM1);
    for _ in 0..NUM_CHANNELS {
        arm1.send_message(MasterId::ARM1, MasterId::ARM0, &Message::default()).unwrap();
    }
    sim.record_accesses(true);
    assert_eq!(
        arm1.send_message(MasterId::ARM1, MasterId::ARM0, &Message::default()),
        Err(MailboxError::NoFreeChannel { sender: MasterId::ARM1 })
    );
    // Only the search read reached the block.
    let log = sim.take_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].register(), Some(Register::Search(MasterId::ARM1)));

    // Draining one message frees exactly one slot.
    let arm0 = Mailbox::new(&sim, MasterId::ARM0);
    received(arm0.handle_irq());
    assert_eq!(sim.free_slots(), 1);
    assert!(arm1.send_message(MasterId::ARM1, MasterId::ARM0, &Message::default()).is_ok());
}

#[test]
fn bound_channel_send_and_release() {
    let sim = SimMailbox::new(3);
    let riscv = Mailbox::new(&sim, MasterId::RISCV);
    let chan = riscv.bind_channel(MasterId::RISCV, MasterId::ARM1).unwrap();
    assert_eq!(sim.owner(chan.id()), Some(MasterId::RISCV));
    assert_eq!(riscv.bound_channels().collect::<Vec<_>>(), vec![chan]);

    riscv.release_channel(&chan).unwrap();
    assert_eq!(sim.owner(chan.id()), None);
    assert_eq!(riscv.bound_channels().count(), 0);

    let chan = riscv.bind_channel(MasterId::RISCV, MasterId::ARM1).unwrap();
    let msg = Message::from_words([0xa5; 8]);
    riscv.send(&chan, &msg).unwrap();
    let arm1 = Mailbox::new(&sim, MasterId::ARM1);
    assert_eq!(received(arm1.handle_irq()).message, msg);
}

#[test]
fn missing_receiver_raises_error_on_sender() {
    let sim = SimMailbox::new(2);
    let arm0 = Mailbox::new(&sim, MasterId::ARM0);
    // The RISC-V core isn't attached to a two-master block.
    arm0.send_message(MasterId::ARM0, MasterId::RISCV, &Message::default()).unwrap();
    assert!(matches!(arm0.handle_irq(), IrqOutcome::Malformed(status) if status.nibble() == 0x2));
    assert!(!sim.irq_pending(MasterId::ARM0));
}

#[test]
fn messages_arrive_in_send_order() {
    let sim = SimMailbox::new(3);
    let arm0 = Mailbox::new(&sim, MasterId::ARM0);
    let arm1 = Mailbox::new(&sim, MasterId::ARM1);
    for tag in 0..10u32 {
        arm0.send_message(MasterId::ARM0, MasterId::ARM1, &Message::from_words([tag; 8])).unwrap();
    }
    let tags: Vec<u32> = (0..10).map(|_| received(arm1.handle_irq()).message.words()[0]).collect();
    assert_eq!(tags, (0..10).collect::<Vec<_>>());
    assert_eq!(sim.free_slots(), NUM_CHANNELS);
}

#[test]
fn suspended_controller_ignores_interrupts_until_resumed() {
    let sim = SimMailbox::new(3);
    let arm0 = Mailbox::new(&sim, MasterId::ARM0);
    let riscv = Mailbox::new(&sim, MasterId::RISCV);
    arm0.send_message(MasterId::ARM0, MasterId::RISCV, &Message::default()).unwrap();

    riscv.suspend();
    assert_eq!(riscv.handle_irq(), IrqOutcome::Spurious);
    assert!(sim.irq_pending(MasterId::RISCV));
    assert_eq!(
        riscv.bind_channel(MasterId::RISCV, MasterId::ARM0).map(|c| c.id()),
        Err(MailboxError::Suspended)
    );

    riscv.resume();
    received(riscv.handle_irq());
    assert_eq!(ChannelId::all().filter(|ch| sim.owner(*ch).is_some()).count(), 0);
}
