mod common;

use std::time::Duration;

use common::{config, echoed, engine, engine_with, lbl, run, st};
use hotscript_interpret::{Admission, EngineConfig, Trigger};

#[test]
fn a_label_already_running_refuses_another_thread() {
    let engine = run(vec![
        st("Fire", &["hk"]),
        st("Sleep", &["0"]),
        st("Echo", &["main"]),
        st("return", &[]),
        lbl("hk"),
        st("Echo", &["hk start"]),
        st("Fire", &["hk"]),
        st("Sleep", &["0"]),
        st("Echo", &["hk end"]),
        st("return", &[]),
    ]);
    assert_eq!(echoed(&engine), ["hk start", "hk end", "main"]);
}

#[test]
fn a_different_label_nests_and_the_outer_thread_resumes() {
    let engine = run(vec![
        st("Fire", &["a"]),
        st("Sleep", &["0"]),
        st("Echo", &["main"]),
        st("return", &[]),
        lbl("a"),
        st("Echo", &["a1"]),
        st("Fire", &["b"]),
        st("Sleep", &["0"]),
        st("Echo", &["a2"]),
        st("return", &[]),
        lbl("b"),
        st("Echo", &["b"]),
        st("return", &[]),
    ]);
    assert_eq!(echoed(&engine), ["a1", "b", "a2", "main"]);
    assert_eq!(engine.thread_depth(), 0);
}

#[test]
fn lower_priority_waits_for_the_current_thread() {
    let mut engine = run(vec![
        st("Fire", &["low", "-1"]),
        st("Sleep", &["0"]),
        st("Echo", &["main"]),
        st("return", &[]),
        lbl("low"),
        st("Echo", &["low"]),
        st("return", &[]),
    ]);
    assert_eq!(echoed(&engine), ["main"]);
    assert_eq!(engine.run_pending(), 1);
    assert_eq!(echoed(&engine), ["main", "low"]);
}

#[test]
fn a_fresh_thread_is_uninterruptible_except_while_waiting() {
    let config = EngineConfig {
        uninterruptible_ms: 60_000,
        batch_lines: 1,
        batch_ms: 0,
        ..EngineConfig::default()
    };
    let mut engine = engine_with(
        vec![
            st("Fire", &["t"]),
            st("Echo", &["one"]),
            st("Echo", &["two"]),
            st("Sleep", &["0"]),
            st("Echo", &["three"]),
            st("return", &[]),
            lbl("t"),
            st("Echo", &["interrupt"]),
            st("return", &[]),
        ],
        config,
    );
    engine.run_auto_execute();
    assert_eq!(echoed(&engine), ["one", "two", "interrupt", "three"]);
}

#[test]
fn error_level_is_restored_after_an_interruption() {
    let engine = run(vec![
        st("SetLevel", &["1"]),
        st("Fire", &["t"]),
        st("Wait", &[]),
        st("Echo", &["level %ErrorLevel%"]),
        st("return", &[]),
        lbl("t"),
        st("SetLevel", &["5"]),
        st("Echo", &["inner %ErrorLevel%"]),
        st("return", &[]),
    ]);
    assert_eq!(echoed(&engine), ["inner 5", "level 1"]);
}

#[test]
fn outer_text_survives_an_inner_thread_and_scratch_is_released() {
    let big = "x".repeat(20_000);
    let mut engine = run(vec![
        st("=", &["a", "left"]),
        st("=", &["b", "right"]),
        st("Fire", &["grow"]),
        st("Loop", &["Parse", "a", ","]),
        st("{", &[]),
        st("Sleep", &["0"]),
        st("Echo", &["%A_LoopField%-%b%"]),
        st("}", &[]),
        st("return", &[]),
        lbl("grow"),
        st("=", &["big", &big]),
        st("Echo", &["%big%%big%"]),
        st("return", &[]),
    ]);
    assert!(engine.take_errors().is_empty());
    let seen = echoed(&engine);
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].len(), 40_000);
    assert_eq!(seen[1], "left-right");
    assert_eq!(engine.scratch_in_use(), 0);
    assert!(engine.scratch_capacity() >= 40_000);
}

#[test]
fn scratch_capacity_never_shrinks() {
    let mut engine = engine(vec![
        st("Echo", &["%big%"]),
        st("return", &[]),
        lbl("small"),
        st("Echo", &["tiny"]),
        st("return", &[]),
    ]);
    engine.run_auto_execute();
    let before = engine.scratch_capacity();
    assert_eq!(engine.dispatch(Trigger::hotkey("small")), Admission::Ran);
    assert!(engine.scratch_capacity() >= before);
    assert_eq!(engine.scratch_in_use(), 0);
}

#[test]
fn expansion_past_the_memory_ceiling_ends_the_thread() {
    let config = EngineConfig {
        max_mem: 64,
        ..config()
    };
    let long = "y".repeat(100);
    let mut engine = engine_with(
        vec![
            st("=", &["v", &long]),
            st("Echo", &["%v%"]),
            st("Echo", &["unreached"]),
        ],
        config,
    );
    engine.run_auto_execute();
    let errors = engine.take_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("out of memory"), "{}", errors[0]);
    assert!(echoed(&engine).is_empty());
}

#[test]
fn dispatch_reports_admission() {
    let mut engine = engine(vec![
        st("return", &[]),
        lbl("known"),
        st("Echo", &["known"]),
        st("return", &[]),
    ]);
    engine.run_auto_execute();
    assert_eq!(engine.dispatch(Trigger::hotkey("known")), Admission::Ran);
    assert_eq!(engine.dispatch(Trigger::hotkey("unknown")), Admission::Refused);
    assert_eq!(echoed(&engine), ["known"]);
}

#[test]
fn triggers_from_another_thread_are_queued_in_order() {
    let mut engine = engine(vec![
        st("return", &[]),
        lbl("a"),
        st("Echo", &["a"]),
        st("return", &[]),
        lbl("b"),
        st("Echo", &["b"]),
        st("return", &[]),
    ]);
    engine.run_auto_execute();
    let sender = engine.sender();
    let producer = std::thread::spawn(move || {
        sender.send(Trigger::hotkey("b"));
        sender.send(Trigger::hotkey("a"));
    });
    producer.join().unwrap();
    assert_eq!(engine.run_pending(), 2);
    assert_eq!(echoed(&engine), ["b", "a"]);
}

#[test]
fn suspended_hotkeys_are_dropped_unless_exempt() {
    let engine = run(vec![
        st("Suspend", &["On"]),
        st("Fire", &["hk"]),
        st("Fire", &["exempt"]),
        st("Sleep", &["0"]),
        st("Echo", &["main"]),
        st("return", &[]),
        lbl("hk"),
        st("Echo", &["hk"]),
        st("return", &[]),
        lbl("exempt"),
        st("Suspend", &["Permit"]),
        st("Echo", &["exempt"]),
        st("return", &[]),
    ]);
    assert_eq!(echoed(&engine), ["exempt", "main"]);
    assert!(engine.is_suspended());
}

#[test]
fn this_and_prior_hotkey() {
    let mut engine = engine(vec![
        st("return", &[]),
        lbl("first"),
        st("Echo", &["%A_ThisLabel%"]),
        st("return", &[]),
        lbl("second"),
        st("Echo", &["%A_ThisHotkey% after %A_PriorHotkey%"]),
        st("return", &[]),
    ]);
    engine.run_auto_execute();
    engine.dispatch(Trigger::hotkey("first"));
    engine.dispatch(Trigger::hotkey("second"));
    assert_eq!(echoed(&engine), ["first", "second after first"]);
}

#[test]
fn timer_runs_until_it_turns_itself_off() {
    let mut engine = run(vec![
        st("=", &["n", "0"]),
        st("SetTimer", &["tick", "5"]),
        st("return", &[]),
        lbl("tick"),
        st("+=", &["n", "1"]),
        st("if", &["n", ">=", "3"]),
        st("SetTimer", &["tick", "Off"]),
        st("return", &[]),
    ]);
    assert!(engine.has_enabled_timers());
    let mut waited = 0;
    while engine.has_enabled_timers() && waited < 200 {
        engine.idle(Duration::from_millis(10));
        waited += 1;
    }
    assert_eq!(engine.var_text("n").as_deref(), Some("3"));
    assert!(!engine.has_enabled_timers());
}

#[test]
fn one_shot_timer_fires_once() {
    let mut engine = run(vec![
        st("SetTimer", &["once", "-1"]),
        st("return", &[]),
        lbl("once"),
        st("Echo", &["fired"]),
        st("return", &[]),
    ]);
    engine.idle(Duration::from_millis(60));
    assert_eq!(echoed(&engine), ["fired"]);
    assert!(!engine.has_enabled_timers());
}

#[test]
fn host_exit_runs_the_exit_routine() {
    let mut engine = run(vec![
        st("OnExit", &["bye"]),
        st("return", &[]),
        lbl("bye"),
        st("Echo", &["bye"]),
        st("return", &[]),
    ]);
    assert!(!engine.is_terminated());
    engine.exit_app();
    assert!(engine.is_terminated());
    assert_eq!(echoed(&engine), ["bye"]);
    assert_eq!(engine.dispatch(Trigger::hotkey("bye")), Admission::Refused);
}
