//! Integration tests for payment sessions
//!
//! Each test scripts the reader's side of a transaction and checks both the
//! outcome and exactly which lines went to the reader.

use lockervend_core::{BlackBoxLog, BusConfig, LockerId, MdbConfig, VendTransaction};
use lockervend_hardware::Transport;
use lockervend_hardware::mock::SimulatedBus;
use lockervend_payment::mock::{ScriptedLink, ScriptedLinkHandle};
use lockervend_payment::{
    CancelFlag, CancelSource, MdbError, PaymentSession, VendOutcome, VendState, purchase,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn config() -> MdbConfig {
    MdbConfig {
        confirm_interval: Duration::ZERO,
        read_retry_delay: Duration::ZERO,
        stabilise_delay: Duration::ZERO,
        ..MdbConfig::default()
    }
}

fn session() -> (PaymentSession<ScriptedLink>, ScriptedLinkHandle) {
    let (link, handle) = ScriptedLink::new();
    (PaymentSession::new(link, config()), handle)
}

fn transaction(price: u32) -> VendTransaction {
    VendTransaction::new(LockerId::new(7).unwrap(), price, 7).unwrap()
}

#[test]
fn test_result_on_third_poll_ends_once() {
    let (mut session, reader) = session();
    reader.push_script(&[
        Some("d,STATUS,IDLE"),
        Some("d,STATUS,VEND"),
        None,
        None,
        Some("d,STATUS,RESULT,1"),
    ]);

    let outcome = session.run(&transaction(250), &CancelFlag::new()).unwrap();

    assert_eq!(outcome, VendOutcome::Vended);
    assert_eq!(session.state(), VendState::Success);
    assert_eq!(reader.count("D,END"), 1);
    assert_eq!(reader.count("D,REQ,-1"), 0);
}

#[test]
fn test_cancel_before_any_response() {
    let (mut session, reader) = session();
    reader.push_line("d,STATUS,IDLE");
    let cancel = CancelFlag::new();
    cancel.cancel();

    let outcome = session.run(&transaction(250), &cancel).unwrap();

    assert_eq!(outcome, VendOutcome::Canceled(CancelSource::Kiosk));
    assert_eq!(session.state(), VendState::CustomerCanceled);
    assert_eq!(reader.count("D,REQ,-1"), 1);
    assert_eq!(reader.count("D,END"), 0);
}

#[test]
fn test_silent_reader_times_out() {
    let (mut session, reader) = session();
    reader.push_script(&[Some("d,STATUS,IDLE"), Some("d,STATUS,VEND")]);

    let result = session.run(&transaction(250), &CancelFlag::new());

    assert!(matches!(result, Err(MdbError::TimeoutError { iterations: 10 })));
    assert_eq!(session.state(), VendState::Timeout);
    assert_eq!(reader.count("D,REQ,-1"), 1);
}

#[test]
fn test_normal_vend_with_enough_credit() {
    let (mut session, reader) = session();
    reader.push_script(&[
        Some("d,STATUS,IDLE"),
        Some(r#"d,ERR,"-1""#),
        None,
        Some("d,STATUS,CREDIT,5.00"),
        Some("d,STATUS,VEND"),
    ]);

    let outcome = session.run(&transaction(250), &CancelFlag::new()).unwrap();

    assert_eq!(outcome, VendOutcome::Vended);
    assert_eq!(
        reader.written(),
        vec!["D,READER,1", "D,REQ,2.50,7", "D,REQ,2.50,7", "D,END"]
    );
    let path: Vec<VendState> = session.machine().history().iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![VendState::DirectVend, VendState::NormalVend, VendState::Success]
    );
}

#[test]
fn test_normal_vend_insufficient_credit_is_denied() {
    let (mut session, reader) = session();
    reader.push_script(&[
        Some("d,STATUS,IDLE"),
        Some(r#"d,ERR,"-1""#),
        Some("d,STATUS,CREDIT,2.00"),
    ]);

    let result = session.run(&transaction(250), &CancelFlag::new());

    match result {
        Err(MdbError::Denied { reason }) => assert!(reason.contains("2.00")),
        other => panic!("expected denial, got {other:?}"),
    }
    assert_eq!(reader.count("D,REQ,-1"), 1);
    assert_eq!(reader.count("D,END"), 0);
}

#[test]
fn test_normal_vend_without_credit_times_out() {
    let (mut session, reader) = session();
    reader.push_script(&[Some("d,STATUS,IDLE"), Some(r#"d,ERR,"-1""#)]);

    let result = session.run(&transaction(250), &CancelFlag::new());

    assert!(matches!(result, Err(MdbError::TimeoutError { iterations: 30 })));
    assert_eq!(reader.count("D,REQ,-1"), 1);
}

#[test]
fn test_session_is_reusable_after_cancel() {
    let (mut session, reader) = session();
    let cancel = CancelFlag::new();

    reader.push_line("d,STATUS,IDLE");
    cancel.cancel();
    session.run(&transaction(250), &cancel).unwrap();

    cancel.reset();
    reader.push_script(&[Some("d,STATUS,IDLE"), Some("d,STATUS,RESULT,1")]);
    let outcome = session.run(&transaction(250), &cancel).unwrap();

    assert_eq!(outcome, VendOutcome::Vended);
    assert_eq!(session.machine().history().len(), 2);
}

#[tokio::test]
async fn test_timeout_is_recorded_in_uart_black_box() {
    let dir = TempDir::new().unwrap();
    let (bus, bus_handle) = SimulatedBus::new();
    let transport = Transport::open(Ok(bus), BusConfig::default());
    let (session, reader) = session();
    reader.push_script(&[Some("d,STATUS,IDLE"), Some("d,STATUS,VEND")]);
    let uart_log = BlackBoxLog::new(dir.path().join("logs").join("BLACK_BOX_UART.txt"));

    let result = purchase(
        &transport,
        Arc::new(Mutex::new(session)),
        transaction(250),
        CancelFlag::new(),
        &uart_log,
    )
    .await;

    assert!(matches!(result, Err(MdbError::TimeoutError { .. })));
    assert!(bus_handle.commands().is_empty());
    let log = std::fs::read_to_string(uart_log.path()).unwrap();
    assert!(log.contains("Timed out after 10 polls"));
    assert!(log.contains("locker 7"));
}

#[tokio::test]
async fn test_denied_payment_keeps_locker_closed() {
    let dir = TempDir::new().unwrap();
    let (bus, bus_handle) = SimulatedBus::new();
    let transport = Transport::open(Ok(bus), BusConfig::default());
    let (session, reader) = session();
    reader.push_script(&[
        Some("d,STATUS,IDLE"),
        Some(r#"d,ERR,"-1""#),
        Some("d,STATUS,CREDIT,1.00"),
    ]);
    let uart_log = BlackBoxLog::new(dir.path().join("BLACK_BOX_UART.txt"));

    let result = purchase(
        &transport,
        Arc::new(Mutex::new(session)),
        transaction(250),
        CancelFlag::new(),
        &uart_log,
    )
    .await;

    assert!(matches!(result, Err(MdbError::Denied { .. })));
    assert!(bus_handle.commands().is_empty());
    assert!(!uart_log.path().exists());
}
