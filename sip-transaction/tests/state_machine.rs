//! End-to-end transaction engine scenarios, covering the documented
//! INVITE/CANCEL/retransmit walkthroughs.

use std::time::Duration;

use sip_core::prelude::*;
use sip_transaction::prelude::*;

fn invite(branch: &str) -> Request {
    let mut req = Request::new(Method::Invite, "sip:bob@biloxi.example.com".parse().unwrap());
    let mut via = Via::new(TransportProtocol::Udp, "pc33.atlanta.example.com", None);
    via.set_branch(branch);
    req.headers.via.push(via);
    req.headers.cseq = Some(CSeq::new(1, Method::Invite));
    req
}

fn cancel_for(invite: &Request) -> Request {
    let mut req = Request::new(Method::Cancel, invite.request_uri.clone());
    req.headers.via = invite.headers.via.clone();
    req.headers.cseq = Some(CSeq::new(1, Method::Cancel));
    req
}

fn ack_for(invite: &Request) -> Request {
    let mut req = Request::new(Method::Ack, invite.request_uri.clone());
    req.headers.via = invite.headers.via.clone();
    req.headers.cseq = Some(CSeq::new(1, Method::Ack));
    req
}

/// Scenario: INVITE answered 100 Trying, 180 Ringing, then 200 OK. The
/// server transaction tracks the latest provisional and the engine reports
/// each state change in order.
#[tokio::test]
async fn invite_rings_then_answers() {
    let (engine, mut outbound) = TransactionEngine::new(TimerSettings::default(), Observer::default());
    let request = invite("z9hG4bK-ringing");
    let key = match engine.receive_request(request).await.unwrap() {
        ReceiveOutcome::NewRequest(key) => key,
        other => panic!("expected NewRequest, got {other:?}"),
    };

    engine.send_response(&key, Response::new(StatusCode::TRYING)).await.unwrap();
    engine.send_response(&key, Response::new(StatusCode::RINGING)).await.unwrap();
    engine.send_response(&key, Response::new(StatusCode::OK)).await.unwrap();

    let sent: Vec<StatusCode> = [outbound.recv().await, outbound.recv().await, outbound.recv().await]
        .into_iter()
        .map(|m| match m.unwrap().message {
            Message::Response(r) => r.status,
            _ => panic!("expected responses"),
        })
        .collect();
    assert_eq!(sent, vec![StatusCode::TRYING, StatusCode::RINGING, StatusCode::OK]);
    assert_eq!(engine.transaction_state(&key).await, Some(TransactionState::Completed));
}

/// Scenario: a 486 final response puts the server transaction in
/// `Completed`; the subsequent ACK is absorbed into `Confirmed` without
/// being handed up to the TU.
#[tokio::test]
async fn busy_here_then_ack_confirms() {
    let (engine, mut outbound) = TransactionEngine::new(TimerSettings::default(), Observer::default());
    let request = invite("z9hG4bK-busy");
    let key = match engine.receive_request(request.clone()).await.unwrap() {
        ReceiveOutcome::NewRequest(key) => key,
        other => panic!("expected NewRequest, got {other:?}"),
    };

    engine.send_response(&key, Response::new(StatusCode::BUSY_HERE)).await.unwrap();
    let _ = outbound.recv().await;
    assert_eq!(engine.transaction_state(&key).await, Some(TransactionState::Completed));

    let outcome = engine.receive_request(ack_for(&request)).await.unwrap();
    assert!(matches!(outcome, ReceiveOutcome::AckAbsorbed));
    assert_eq!(engine.transaction_state(&key).await, Some(TransactionState::Confirmed));
}

/// Scenario: a non-INVITE client transaction retransmits on the doubling
/// schedule (T1, 2T1, 4T1, capped at T2) until Timer F tears it down.
#[tokio::test(start_paused = true)]
async fn non_invite_client_retransmits_then_times_out() {
    let settings = TimerSettings {
        t1: Duration::from_millis(10),
        t2: Duration::from_millis(40),
        t6: Duration::from_millis(80),
        ..TimerSettings::default()
    };
    let (engine, mut outbound) = TransactionEngine::new(settings, Observer::default());

    let mut options = Request::new(Method::Options, "sip:bob@biloxi.example.com".parse().unwrap());
    let mut via = Via::new(TransportProtocol::Udp, "pc33.atlanta.example.com", None);
    via.set_branch("z9hG4bK-options");
    options.headers.via.push(via);
    let key = engine.send_request(options).await.unwrap();
    let _ = outbound.recv().await;

    let mut retransmit_count = 0;
    for _ in 0..20 {
        tokio::time::advance(Duration::from_millis(5)).await;
        engine.tick().await;
        while outbound.try_recv().is_ok() {
            retransmit_count += 1;
        }
        if engine.transaction_state(&key).await.is_none() {
            break;
        }
    }

    assert!(retransmit_count >= 1, "expected at least one retransmit before timeout");
    assert_eq!(engine.transaction_state(&key).await, None, "transaction should be reaped after Timer F");
}

/// Scenario: CANCEL arrives while the INVITE is still ringing. The engine
/// answers the CANCEL with 200 OK immediately and tells the caller which
/// INVITE transaction to terminate with a 487.
#[tokio::test]
async fn cancel_mid_ring_answers_immediately_and_targets_the_invite() {
    let (engine, mut outbound) = TransactionEngine::new(TimerSettings::default(), Observer::default());
    let request = invite("z9hG4bK-cancel");
    let key = match engine.receive_request(request.clone()).await.unwrap() {
        ReceiveOutcome::NewRequest(key) => key,
        other => panic!("expected NewRequest, got {other:?}"),
    };
    engine.send_response(&key, Response::new(StatusCode::RINGING)).await.unwrap();
    let _ = outbound.recv().await;

    let outcome = engine.receive_request(cancel_for(&request)).await.unwrap();
    let target = match outcome {
        ReceiveOutcome::Cancel { target } => target,
        other => panic!("expected Cancel, got {other:?}"),
    };
    assert_eq!(target, key);

    let cancel_ok = outbound.recv().await.unwrap();
    assert!(matches!(cancel_ok.message, Message::Response(r) if r.status == StatusCode::OK));

    engine.send_response(&key, Response::new(StatusCode::REQUEST_TERMINATED)).await.unwrap();
    let terminated = outbound.recv().await.unwrap();
    assert!(matches!(terminated.message, Message::Response(r) if r.status == StatusCode::REQUEST_TERMINATED));
}

/// A CANCEL for a transaction that has already answered (or never existed)
/// is too late to do anything with and the TU is told so instead of the
/// engine silently dropping it.
#[tokio::test]
async fn cancel_after_final_response_is_too_late() {
    let (engine, mut outbound) = TransactionEngine::new(TimerSettings::default(), Observer::default());
    let request = invite("z9hG4bK-late-cancel");
    let key = match engine.receive_request(request.clone()).await.unwrap() {
        ReceiveOutcome::NewRequest(key) => key,
        other => panic!("expected NewRequest, got {other:?}"),
    };
    engine.send_response(&key, Response::new(StatusCode::OK)).await.unwrap();
    let _ = outbound.recv().await;

    let outcome = engine.receive_request(cancel_for(&request)).await.unwrap();
    assert!(matches!(outcome, ReceiveOutcome::CancelTooLate));
}

/// RFC 3262: a reliable provisional is retransmitted until its PRACK
/// arrives, and a non-matching RAck doesn't disarm it.
#[tokio::test]
async fn reliable_provisional_disarms_on_matching_prack() {
    let (engine, mut outbound) = TransactionEngine::new(TimerSettings::default(), Observer::default());
    let request = invite("z9hG4bK-prack");
    let key = match engine.receive_request(request).await.unwrap() {
        ReceiveOutcome::NewRequest(key) => key,
        other => panic!("expected NewRequest, got {other:?}"),
    };

    let armed = engine.send_reliable_provisional(&key, Response::new(StatusCode::RINGING)).await.unwrap();
    let rseq = armed.headers.rseq.unwrap();
    let _ = outbound.recv().await;

    assert!(!engine.receive_prack(&key, 1, rseq + 1, 1, Method::Invite).await.unwrap());
    assert!(engine.receive_prack(&key, 1, rseq, 1, Method::Invite).await.unwrap());
}
