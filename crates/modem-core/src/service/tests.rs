//! Unit tests for the call registry.

use std::cell::RefCell;
use std::rc::Rc;

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use crate::call::{CallState, SOS_URN};
use crate::errors::{ErrorCode, LocalError, ModemError, OfonoError};
use crate::tests::support::{MODEM_PATH, ModemHarness};

#[fixture]
fn modem() -> ModemHarness {
    ModemHarness::connected()
}

fn path(name: &str) -> String {
    ModemHarness::call_path(name)
}

fn active_name(modem: &ModemHarness) -> Option<String> {
    modem.service.active_call().map(|call| String::from(call.name()))
}

fn held_name(modem: &ModemHarness) -> Option<String> {
    modem.service.held_call().map(|call| String::from(call.name()))
}

// ------------------------------------------------------------------------
// Connecting
// ------------------------------------------------------------------------

#[rstest]
fn connect_waits_for_properties_and_existing_calls() {
    let modem = ModemHarness::new();
    assert!(modem.service.connect());
    assert_eq!(modem.transport.parked_methods(), vec!["GetProperties", "GetCalls"]);

    modem.transport.succeed("GetProperties", json!({}));
    assert!(modem.service.is_connecting());

    modem.transport.succeed("GetCalls", json!([]));
    assert!(modem.service.is_connected());
    assert_eq!(
        modem.event_labels(),
        vec!["connected org.ofono.VoiceCallManager true"]
    );
}

#[rstest]
fn existing_calls_are_adopted_on_connect() {
    let modem = ModemHarness::new();
    assert!(modem.service.connect());
    modem.finish_connect(&json!([
        [path("voicecall01"), { "State": "waiting", "LineIdentification": "+3585012345" }],
        [path("voicecall02"), { "State": "active", "LineIdentification": "112" }],
        [path("voicecall03"), { "State": "disconnected" }],
    ]));

    assert_eq!(
        modem.event_labels(),
        vec![
            "incoming voicecall01",
            "created voicecall02",
            "connected org.ofono.VoiceCallManager true",
        ]
    );
    assert_eq!(modem.service.get_calls().len(), 2);

    let waiting = modem.call("voicecall01");
    assert_eq!(waiting.state(), CallState::Waiting);
    assert!(waiting.is_terminating());
    assert_eq!(waiting.remote().as_deref(), Some("+3585012345"));
    assert_eq!(active_name(&modem).as_deref(), Some("voicecall02"));
    assert!(modem.service.get_call(&path("voicecall03")).is_none());
}

#[rstest]
fn failed_call_listing_fails_the_connect() {
    let modem = ModemHarness::new();
    assert!(modem.service.connect());
    modem.transport.succeed("GetProperties", json!({}));
    modem.transport.reply_to(
        "GetCalls",
        Err(ModemError::remote_exception("org.ofono.Error.Failed", "modem off")),
    );

    assert!(!modem.service.is_connected());
    assert_eq!(
        modem.event_labels(),
        vec!["connected org.ofono.VoiceCallManager false"]
    );
}

// ------------------------------------------------------------------------
// Call instances
// ------------------------------------------------------------------------

#[rstest]
#[case("incoming", "incoming voicecall01")]
#[case("waiting", "incoming voicecall01")]
#[case("dialing", "created voicecall01")]
#[case("alerting", "created voicecall01")]
fn added_calls_are_announced_by_direction(
    modem: ModemHarness,
    #[case] state: &str,
    #[case] label: &str,
) {
    modem.add_call("voicecall01", state, "+358501234567");
    assert_eq!(modem.event_labels(), vec![label]);
    assert_eq!(modem.call("voicecall01").state_name(), state.to_uppercase());
}

#[rstest]
#[case("disconnected")]
#[case("bogus")]
fn calls_first_seen_ended_or_unknown_are_ignored(modem: ModemHarness, #[case] state: &str) {
    modem.add_call("voicecall01", state, "+358501234567");
    assert!(modem.event_labels().is_empty());
    assert!(modem.service.get_calls().is_empty());
}

#[rstest]
fn repeated_announcement_keeps_the_existing_call(modem: ModemHarness) {
    modem.add_call("voicecall01", "incoming", "+358501234567");
    let first = modem.call("voicecall01");
    modem.add_call("voicecall01", "incoming", "+358501234567");

    assert_eq!(modem.event_labels(), vec!["incoming voicecall01"]);
    assert_eq!(modem.call("voicecall01"), first);
}

#[rstest]
fn malformed_call_added_is_ignored(modem: ModemHarness) {
    modem.transport.emit(
        &crate::transport::Signal::new(MODEM_PATH, "org.ofono.VoiceCallManager", "CallAdded")
            .arg(path("voicecall01")),
    );
    assert!(modem.service.get_calls().is_empty());
}

#[rstest]
fn removed_calls_leave_the_registry(modem: ModemHarness) {
    modem.add_call("voicecall01", "active", "+358501234567");
    let call = modem.call("voicecall01");
    drop(modem.events.drain());

    modem.remove_call("voicecall01");

    assert_eq!(modem.event_labels(), vec!["removed voicecall01"]);
    assert!(modem.service.get_calls().is_empty());
    assert!(modem.service.active_call().is_none());
    assert!(!call.is_connected());

    modem.remove_call("voicecall01");
    assert!(modem.event_labels().is_empty());
}

#[rstest]
fn state_changes_are_reported(modem: ModemHarness) {
    modem.add_call("voicecall01", "dialing", "+358501234567");
    modem.set_call_state("voicecall01", "alerting");
    modem.set_call_state("voicecall01", "alerting");
    modem.set_call_state("voicecall01", "active");

    assert_eq!(
        modem.event_labels(),
        vec![
            "created voicecall01",
            "state voicecall01 ALERTING",
            "state voicecall01 ACTIVE",
        ]
    );
}

// ------------------------------------------------------------------------
// Active and held slots
// ------------------------------------------------------------------------

#[rstest]
fn slots_follow_state_changes(modem: ModemHarness) {
    modem.add_call("voicecall01", "active", "+3581");
    assert_eq!(active_name(&modem).as_deref(), Some("voicecall01"));

    modem.add_call("voicecall02", "waiting", "+3582");
    modem.set_call_state("voicecall01", "held");
    assert_eq!(active_name(&modem), None);
    assert_eq!(held_name(&modem).as_deref(), Some("voicecall01"));

    modem.set_call_state("voicecall02", "active");
    assert_eq!(active_name(&modem).as_deref(), Some("voicecall02"));

    modem.set_call_state("voicecall01", "disconnected");
    assert_eq!(held_name(&modem), None);
    assert_eq!(active_name(&modem).as_deref(), Some("voicecall02"));
}

#[rstest]
fn conference_members_hold_no_slot(modem: ModemHarness) {
    modem.add_call("voicecall01", "held", "+3581");
    modem.add_call("voicecall02", "active", "+3582");

    modem.set_call_property("voicecall02", "Multiparty", Value::Bool(true));
    assert_eq!(active_name(&modem), None);
    assert_eq!(held_name(&modem).as_deref(), Some("voicecall01"));

    modem.set_call_state("voicecall02", "held");
    modem.set_call_state("voicecall02", "active");
    assert_eq!(active_name(&modem), None);
    assert_eq!(held_name(&modem).as_deref(), Some("voicecall01"));
}

#[rstest]
fn conference_marks_every_joined_call(modem: ModemHarness) {
    modem.add_call("voicecall01", "held", "+3581");
    modem.add_call("voicecall02", "active", "+3582");
    let outcome = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&outcome);

    modem
        .service
        .request_conference(move |_, result| *slot.borrow_mut() = Some(result))
        .expect("connected registry accepts requests");
    modem.transport.succeed(
        "CreateMultiparty",
        json!([path("voicecall01"), path("voicecall02")]),
    );

    assert_eq!(*outcome.borrow(), Some(Ok(())));
    assert!(modem.call("voicecall01").is_member());
    assert!(modem.call("voicecall02").is_member());
    assert_eq!(active_name(&modem), None);
    assert_eq!(held_name(&modem), None);
}

// ------------------------------------------------------------------------
// Dialing
// ------------------------------------------------------------------------

#[rstest]
fn dial_requires_a_connected_registry() {
    let modem = ModemHarness::new();
    let result = modem.dial("+358501234567");
    assert!(matches!(result, Err(LocalError::NotConnected { .. })));
    assert!(modem.transport.issued().is_empty());
}

#[rstest]
fn dial_rejects_invalid_addresses(modem: ModemHarness) {
    let Err(LocalError::InvalidAddress { address, source }) = modem.dial("tilulilu") else {
        panic!("expected an invalid address error");
    };
    assert_eq!(address, "tilulilu");
    assert_eq!(source.message(), "not a phone number");
    assert_eq!(modem.service.pending_dials(), 0);
}

#[rstest]
fn dial_sends_destination_and_clir(modem: ModemHarness) {
    let _dial = modem.dial("+358501234567").expect("dial accepted");

    let issued = modem.transport.issued();
    let call = issued.last().expect("dial issued");
    assert_eq!(call.method, "Dial");
    assert_eq!(call.path, MODEM_PATH);
    assert_eq!(call.interface, "org.ofono.VoiceCallManager");
    assert_eq!(call.args, vec![json!("+358501234567"), json!("")]);
    assert_eq!(modem.service.pending_dials(), 1);
}

#[rstest]
fn dial_reply_creates_an_originating_call(modem: ModemHarness) {
    let (_, outcome) = modem.dial("+358501234567").expect("dial accepted");
    modem.answer_dial("voicecall01");

    let call = match outcome.borrow_mut().take() {
        Some(Ok(call)) => call,
        other => panic!("unexpected dial outcome: {other:?}"),
    };
    assert_eq!(call.path(), path("voicecall01"));
    assert_eq!(call.state(), CallState::Dialing);
    assert!(call.is_originating());
    assert!(call.is_connected());
    assert_eq!(call.remote().as_deref(), Some("+358501234567"));
    assert_eq!(call.emergency(), None);
    assert_eq!(modem.service.pending_dials(), 0);
    assert!(modem.event_labels().is_empty(), "dialled calls are not announced");
}

#[rstest]
fn dial_failure_reaches_the_caller_mapped(modem: ModemHarness) {
    let (_, outcome) = modem.dial("+358501234567").expect("dial accepted");
    modem.transport.reply_to(
        "Dial",
        Err(ModemError::remote_exception("org.ofono.Error.Failed", "no network")),
    );

    let error = match outcome.borrow_mut().take() {
        Some(Err(error)) => error,
        other => panic!("unexpected dial outcome: {other:?}"),
    };
    assert_eq!(error.code(), &ErrorCode::Ofono(OfonoError::Failed));
    assert_eq!(modem.service.pending_dials(), 0);
}

#[rstest]
fn dial_reply_without_a_path_is_an_error(modem: ModemHarness) {
    let (_, outcome) = modem.dial("+358501234567").expect("dial accepted");
    modem.transport.succeed("Dial", json!(42));

    assert!(matches!(outcome.borrow().as_ref(), Some(Err(_))));
    assert!(modem.service.get_calls().is_empty());
}

#[rstest]
fn emergency_dial_marks_the_call(modem: ModemHarness) {
    let (_, outcome) = modem.dial("112").expect("dial accepted");
    modem.answer_dial("voicecall01");

    assert!(matches!(outcome.borrow().as_ref(), Some(Ok(_))));
    assert_eq!(modem.call("voicecall01").emergency().as_deref(), Some(SOS_URN));
}

#[rstest]
fn cancelled_dial_releases_the_call_silently(modem: ModemHarness) {
    let (request, outcome) = modem.dial("+358501234567").expect("dial accepted");
    request.cancel();

    assert!(modem.transport.cancelled().is_empty(), "dial stays in flight");
    assert_eq!(modem.transport.parked_methods(), vec!["Dial"]);

    modem.answer_dial("voicecall01");

    assert!(outcome.borrow().is_none());
    assert_eq!(modem.transport.parked_methods(), vec!["Hangup"]);
    let hangup = modem.transport.issued().pop().expect("hangup issued");
    assert_eq!(hangup.path, path("voicecall01"));
    assert_eq!(modem.service.pending_dials(), 0);
}

#[rstest]
fn repeated_cancel_keeps_the_dial_queue_moving(modem: ModemHarness) {
    let (request, cancelled) = modem.dial("+3581").expect("dial accepted");
    request.cancel();
    request.cancel();
    assert!(modem.transport.cancelled().is_empty(), "dial stays in flight");

    modem.add_call("voicecall02", "dialing", "+3582");
    let (_, outcome) = modem.dial("+3583").expect("dial accepted");
    assert_eq!(modem.service.pending_dials(), 2);

    modem.answer_dial("voicecall03");
    assert!(cancelled.borrow().is_none());
    assert!(modem.event_labels().is_empty());

    modem.answer_dial("voicecall04");
    assert!(matches!(
        outcome.borrow().as_ref(),
        Some(Ok(call)) if call.name() == "voicecall04"
    ));
    assert_eq!(modem.service.pending_dials(), 0);
    assert_eq!(modem.event_labels(), vec!["created voicecall02"]);
}

#[rstest]
fn aborted_dial_leaves_the_queue(modem: ModemHarness) {
    let (request, outcome) = modem.dial("+3581").expect("dial accepted");
    modem.add_call("voicecall02", "dialing", "+3582");

    request.abort();

    assert!(outcome.borrow().is_none());
    assert_eq!(modem.transport.cancelled().len(), 1);
    assert_eq!(modem.service.pending_dials(), 0);
    assert_eq!(modem.event_labels(), vec!["created voicecall02"]);
}

#[rstest]
fn originating_calls_wait_for_pending_dials(modem: ModemHarness) {
    let (_, outcome) = modem.dial("+3581").expect("dial accepted");

    modem.add_call("voicecall02", "dialing", "+3582");
    modem.add_call("voicecall03", "incoming", "+3583");
    assert_eq!(modem.event_labels(), vec!["incoming voicecall03"]);

    modem.answer_dial("voicecall01");
    assert!(matches!(outcome.borrow().as_ref(), Some(Ok(_))));
    assert_eq!(modem.event_labels(), vec!["created voicecall02"]);
}

#[rstest]
fn dial_reply_claims_its_announced_call(modem: ModemHarness) {
    let (_, outcome) = modem.dial("+3581").expect("dial accepted");
    modem.add_call("voicecall01", "dialing", "+3581");
    let announced = modem.call("voicecall01");

    modem.answer_dial("voicecall01");

    let dialled = match outcome.borrow_mut().take() {
        Some(Ok(call)) => call,
        other => panic!("unexpected dial outcome: {other:?}"),
    };
    assert_eq!(dialled, announced);
    assert!(modem.event_labels().is_empty());
}

#[rstest]
fn deferred_calls_are_announced_in_arrival_order(modem: ModemHarness) {
    let _first = modem.dial("+3581").expect("dial accepted");
    let _second = modem.dial("+3582").expect("dial accepted");
    modem.add_call("voicecall04", "alerting", "+3584");
    modem.add_call("voicecall03", "dialing", "+3583");

    modem.answer_dial("voicecall01");
    assert!(modem.event_labels().is_empty());

    modem.answer_dial("voicecall02");
    assert_eq!(
        modem.event_labels(),
        vec!["created voicecall04", "created voicecall03"]
    );
}

// ------------------------------------------------------------------------
// Emergency numbers
// ------------------------------------------------------------------------

#[rstest]
fn configured_numbers_apply_until_the_network_reports() {
    let modem = ModemHarness::new();
    assert!(modem.service.emergency_numbers().contains(&String::from("112")));

    assert!(modem.service.connect());
    modem
        .transport
        .succeed("GetProperties", json!({ "EmergencyNumbers": ["999"] }));
    modem.transport.succeed("GetCalls", json!([]));

    assert_eq!(modem.service.emergency_numbers(), vec!["999"]);
    assert!(
        !modem
            .event_labels()
            .iter()
            .any(|label| label.starts_with("emergency")),
        "numbers fetched while connecting are not announced"
    );
}

#[rstest]
fn network_number_updates_are_announced(modem: ModemHarness) {
    modem.set_manager_property("EmergencyNumbers", json!(["911", "000"]));

    assert_eq!(modem.event_labels(), vec!["emergency 911,000"]);
    assert_eq!(modem.service.emergency_service("112"), None);
    assert_eq!(modem.service.emergency_service("911p1").as_deref(), Some(SOS_URN));
    assert_eq!(
        modem.service.emergency_service("urn:service:sos.fire").as_deref(),
        Some("urn:service:sos.fire")
    );
}

// ------------------------------------------------------------------------
// Manager operations
// ------------------------------------------------------------------------

#[rstest]
#[case("SwapCalls")]
#[case("HangupMultiparty")]
#[case("HangupAll")]
fn manager_operations_target_the_modem(modem: ModemHarness, #[case] method: &str) {
    let outcome = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&outcome);
    let reply = move |_: &super::CallService, result: Result<(), ModemError>| {
        *slot.borrow_mut() = Some(result);
    };
    let issued = match method {
        "SwapCalls" => modem.service.swap_calls(reply),
        "HangupMultiparty" => modem.service.hangup_conference(reply),
        _ => modem.service.hangup_all(reply),
    };
    issued.expect("connected registry accepts requests");

    let call = modem.transport.issued().pop().expect("request issued");
    assert_eq!(call.method, method);
    assert_eq!(call.path, MODEM_PATH);

    modem.transport.reply_to(
        method,
        Err(ModemError::remote_exception("org.ofono.Error.InProgress", "busy")),
    );
    let error = outcome
        .borrow_mut()
        .take()
        .and_then(Result::err)
        .expect("error reported");
    assert_eq!(error.code(), &ErrorCode::Ofono(OfonoError::InProgress));
}

#[rstest]
fn manager_operations_require_a_connected_registry() {
    let modem = ModemHarness::new();
    assert!(matches!(
        modem.service.hangup_all(|_, _| {}),
        Err(LocalError::NotConnected { .. })
    ));
}

// ------------------------------------------------------------------------
// Resume and teardown
// ------------------------------------------------------------------------

#[rstest]
fn resume_replays_live_calls(modem: ModemHarness) {
    modem.add_call("voicecall01", "incoming", "+3581");
    modem.add_call("voicecall02", "active", "+3582");
    drop(modem.events.drain());

    modem.service.resume();

    let numbers = modem.service.emergency_numbers().join(",");
    assert_eq!(
        modem.event_labels(),
        vec![
            format!("emergency {numbers}"),
            String::from("incoming voicecall01"),
            String::from("state voicecall01 INCOMING"),
            String::from("created voicecall02"),
            String::from("state voicecall02 ACTIVE"),
        ]
    );
}

#[rstest]
fn resume_does_nothing_before_connecting() {
    let modem = ModemHarness::new();
    modem.service.resume();
    assert!(modem.events.is_empty());
}

#[rstest]
fn disconnect_aborts_dials_and_drops_calls(modem: ModemHarness) {
    modem.add_call("voicecall01", "active", "+3581");
    let call = modem.call("voicecall01");
    let (request, outcome) = modem.dial("+3582").expect("dial accepted");
    request.cancel();
    drop(modem.events.drain());

    modem.service.disconnect();

    assert_eq!(modem.transport.cancelled().len(), 1, "teardown aborts the dial");
    assert!(!request.is_pending());
    assert!(outcome.borrow().is_none());
    assert!(modem.service.get_calls().is_empty());
    assert!(modem.service.active_call().is_none());
    assert!(!call.is_connected());
    assert_eq!(modem.transport.subscription_count(), 0);
    assert_eq!(
        modem.event_labels(),
        vec!["connected org.ofono.VoiceCallManager false"]
    );

    modem.add_call("voicecall02", "incoming", "+3583");
    assert!(modem.service.get_calls().is_empty());
}

#[rstest]
fn slots_only_ever_name_calls_in_their_state() {
    const STATES: [&str; 3] = ["active", "held", "disconnected"];
    const CALLS: [&str; 2] = ["voicecall01", "voicecall02"];
    let moves: Vec<(&str, &str)> = CALLS
        .iter()
        .flat_map(|call| STATES.iter().map(move |state| (*call, *state)))
        .collect();

    for first in &moves {
        for second in &moves {
            for third in &moves {
                let modem = ModemHarness::connected();
                modem.add_call("voicecall01", "active", "+3581");
                modem.add_call("voicecall02", "incoming", "+3582");
                for (name, state) in [first, second, third] {
                    modem.set_call_state(name, state);

                    let active = modem.service.active_call();
                    let held = modem.service.held_call();
                    let sequence = [first, second, third];
                    assert!(
                        active.as_ref().is_none_or(|call| call.is_active()),
                        "active slot holds a call in another state after {sequence:?}"
                    );
                    assert!(
                        held.as_ref().is_none_or(|call| call.is_held()),
                        "held slot holds a call in another state after {sequence:?}"
                    );
                    assert!(
                        active.is_none() || active != held,
                        "one call holds both slots after {sequence:?}"
                    );
                }
            }
        }
    }
}
