// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{Event, EventBus, EventKind, EventKindType, payload_ref};
use std::sync::Arc;

#[test_log::test(tokio::test)]
async fn distribute_event_to_all_subscribers() {
    let bus = EventBus::default();
    let mut rx1 = bus.subscribe();
    let mut rx2 = bus.subscribe();

    bus.publish(&Event::new(EventKind::ReceiverConnectedEvent));

    assert_eq!(rx1.recv().await.unwrap().kind, EventKind::ReceiverConnectedEvent);
    assert_eq!(rx2.recv().await.unwrap().kind, EventKind::ReceiverConnectedEvent);
}

#[test_log::test(tokio::test)]
async fn context_publishes_on_the_bus() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let ctx = bus.context();

    let sentence = Arc::new("$GPGGA,...*47".to_owned());
    ctx.publish(EventKind::RawSentenceEvent(sentence.clone()));

    let event = rx.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::RawSentenceEvent(sentence));
}

#[test]
fn payload_ref_extracts_matching_variant() {
    let sentence = Arc::new("$GPRMC".to_owned());
    let kind = EventKind::RawSentenceEvent(sentence.clone());
    assert_eq!(
        payload_ref!(kind, EventKind::RawSentenceEvent),
        Some(&sentence)
    );
    assert_eq!(payload_ref!(kind, EventKind::SendSentenceEvent), None);
}

#[test]
fn discriminants_compare_without_payload() {
    let kind = EventKind::RawSentenceEvent(Arc::new(String::new()));
    assert_eq!(EventKindType::from(&kind), EventKindType::RawSentenceEvent);
    assert_ne!(EventKindType::from(&kind), EventKindType::QuitEvent);
}
