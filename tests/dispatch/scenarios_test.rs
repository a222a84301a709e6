/*!
 * Scenario Tests
 * Every named scenario against every backend
 */

use super::common::{direct, indexed, queued, supports};
use io_dispatch::scenarios::{self, RunReport};
use io_dispatch::syscalls::OpKind;
use io_dispatch::{AddressingMode, Advisory, Dispatcher, Scenario, ScenarioContext, ScenarioError};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// Opcodes each scenario submits
fn kinds(scenario: Scenario) -> &'static [OpKind] {
    match scenario {
        Scenario::OpenAt => &[OpKind::OpenAt, OpKind::Close],
        Scenario::Read => &[OpKind::OpenAt, OpKind::Read, OpKind::Close],
        Scenario::Connect => &[OpKind::Socket, OpKind::Connect, OpKind::Write, OpKind::Close],
        Scenario::Socket => &[OpKind::Socket, OpKind::Close],
        Scenario::SymlinkAt => &[OpKind::SymlinkAt, OpKind::UnlinkAt],
        Scenario::LinkAt => &[OpKind::LinkAt, OpKind::UnlinkAt],
        Scenario::UnlinkAt => &[OpKind::OpenAt, OpKind::Close, OpKind::UnlinkAt],
        Scenario::MkdirAt => &[OpKind::MkdirAt, OpKind::UnlinkAt],
        Scenario::RenameAt => &[OpKind::OpenAt, OpKind::Close, OpKind::RenameAt, OpKind::UnlinkAt],
        Scenario::Bind => &[OpKind::Socket, OpKind::Bind, OpKind::Close],
    }
}

fn ipv6_available() -> bool {
    std::net::TcpListener::bind("[::]:0").is_ok()
}

/// Scenario root plus a source file we own, on the same filesystem
fn sandbox() -> (TempDir, ScenarioContext) {
    let dir = tempdir().unwrap();
    let source = dir.path().join("passwd");
    std::fs::write(&source, b"root:x:0:0:root:/root:/bin/sh\n").unwrap();
    let ctx = ScenarioContext::new(dir.path()).with_source(source);
    (dir, ctx)
}

fn assert_passed(report: &RunReport, dispatcher: &Dispatcher, skip: &[Scenario]) {
    for scenario in Scenario::ALL {
        if skip.contains(&scenario) || !supports(dispatcher, kinds(scenario)) {
            continue;
        }
        let outcome = report.get(scenario).unwrap();
        assert_eq!((scenario, outcome.error.as_deref()), (scenario, None));
    }
}

fn assert_clean(root: &Path) {
    let mut left: Vec<String> = std::fs::read_dir(root)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    left.sort();
    assert_eq!(left, vec!["passwd".to_string()]);
}

#[test]
fn test_all_scenarios_direct() {
    let (dir, ctx) = sandbox();
    let mut d = direct();

    let report = scenarios::run(&mut d, &ctx, &Scenario::ALL);
    assert_eq!(report.scenarios.len(), Scenario::ALL.len());

    let skip: &[Scenario] = if ipv6_available() { &[] } else { &[Scenario::Bind] };
    assert_passed(&report, &d, skip);
    assert!(report.scenarios.iter().all(|s| s.advisories.is_empty()));
    assert_clean(dir.path());
}

#[test]
fn test_all_scenarios_queued() {
    let Some(mut d) = queued() else { return };
    let (dir, ctx) = sandbox();

    let report = scenarios::run(&mut d, &ctx, &Scenario::ALL);
    let skip: &[Scenario] = if ipv6_available() { &[] } else { &[Scenario::Bind] };
    assert_passed(&report, &d, skip);

    let ring = report.ring.as_ref().unwrap();
    assert_eq!(ring.in_flight, 0);
    assert_eq!(ring.discarded, 0);
    assert_eq!(ring.submissions, ring.completions);
    assert_clean(dir.path());
}

#[test]
fn test_all_scenarios_indexed() {
    let Some(mut d) = indexed() else { return };
    assert_eq!(d.addressing(), AddressingMode::Indexed);
    let (_dir, ctx) = sandbox();

    let report = scenarios::run(&mut d, &ctx, &Scenario::ALL);
    // Bind hands a slot number to the kernel as a descriptor.
    assert_passed(&report, &d, &[Scenario::Bind]);
    let bind = report.get(Scenario::Bind).unwrap();
    if !bind.passed {
        assert!(bind.note.is_some());
    }
    assert!(report.get(Scenario::OpenAt).unwrap().note.is_none());

    let advisories = |scenario| report.get(scenario).unwrap().advisories.clone();
    assert!(advisories(Scenario::OpenAt).is_empty());
    assert!(advisories(Scenario::Read).is_empty());
    assert!(advisories(Scenario::Connect).is_empty());
    if ipv6_available() {
        assert_eq!(
            advisories(Scenario::Bind),
            vec![Advisory { op: OpKind::Bind }; 3]
        );
    }
    assert_eq!(
        advisories(Scenario::RenameAt),
        vec![
            Advisory { op: OpKind::RenameAt },
            Advisory { op: OpKind::UnlinkAt }
        ]
    );
}

fn repeat_connect(d: &mut Dispatcher, rounds: usize) {
    if !supports(d, kinds(Scenario::Connect)) {
        return;
    }
    let (_dir, ctx) = sandbox();
    for round in 0..rounds {
        let report = scenarios::run(d, &ctx, &[Scenario::Connect]);
        let outcome = report.get(Scenario::Connect).unwrap();
        assert_eq!((round, outcome.error.as_deref()), (round, None));
    }
}

#[test]
fn test_connect_is_stable_direct() {
    repeat_connect(&mut direct(), 200);
}

#[test]
fn test_connect_is_stable_queued() {
    let Some(mut d) = queued() else { return };
    repeat_connect(&mut d, 200);
}

#[test]
fn test_connect_is_stable_indexed() {
    let Some(mut d) = indexed() else { return };
    repeat_connect(&mut d, 200);
}

#[test]
fn test_failed_rename_removes_original() {
    let (dir, ctx) = sandbox();
    // A non-empty directory at the destination survives stale cleanup and
    // makes renaming a file onto it fail.
    let blocker = dir.path().join("newfilename");
    std::fs::create_dir(&blocker).unwrap();
    std::fs::write(blocker.join("keep"), b"x").unwrap();
    let mut d = direct();

    let result = Scenario::RenameAt.execute(&mut d, &ctx);
    match result {
        Err(ScenarioError::Step { step, source }) => {
            assert_eq!(step, "rename");
            assert!(!source.is_dispatch_fault());
        }
        other => panic!("expected rename failure, got {other:?}"),
    }
    assert!(!dir.path().join("oldfilename").exists());
    assert!(blocker.join("keep").exists());
}

#[test]
fn test_only_selected_scenarios_run() {
    let (_dir, ctx) = sandbox();
    let mut d = direct();

    let report = scenarios::run(&mut d, &ctx, &[Scenario::Socket, Scenario::OpenAt]);
    let names: Vec<&str> = report.scenarios.iter().map(|s| s.scenario.name()).collect();
    assert_eq!(names, vec!["socket", "openat"]);
    assert!(report.all_passed());
}

#[test]
fn test_failure_does_not_stop_the_run() {
    let dir = tempdir().unwrap();
    let ctx = ScenarioContext::new(dir.path()).with_source(dir.path().join("missing"));
    let mut d = direct();

    let report = scenarios::run(&mut d, &ctx, &[Scenario::OpenAt, Scenario::Socket]);
    assert_eq!(report.failed(), 1);
    let error = report.get(Scenario::OpenAt).unwrap().error.clone().unwrap();
    assert!(error.contains("ENOENT"), "{error}");
    assert!(report.get(Scenario::Socket).unwrap().passed);
}

#[test]
fn test_report_json_shape() {
    let (_dir, ctx) = sandbox();
    let mut d = direct();

    let report = scenarios::run(&mut d, &ctx, &[Scenario::MkdirAt]);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["backend"], "direct");
    assert_eq!(json["addressing"], "raw");
    assert_eq!(json["scenarios"][0]["scenario"], "mkdirat");
    assert_eq!(json["scenarios"][0]["passed"], true);
    assert!(json.get("ring").is_none());
}

/// Scenarios that only touch fixed paths under /tmp and the system passwd file
#[test]
#[serial]
fn test_default_root_scenarios() {
    let ctx = ScenarioContext::default();
    let mut d = direct();

    let selected = [
        Scenario::OpenAt,
        Scenario::Read,
        Scenario::SymlinkAt,
        Scenario::UnlinkAt,
        Scenario::MkdirAt,
        Scenario::RenameAt,
    ];
    let report = scenarios::run(&mut d, &ctx, &selected);
    assert!(report.all_passed(), "{report:#?}");
    assert!(!Path::new("/tmp/newfilename").exists());
    assert!(!Path::new("/tmp/tempdir").exists());
}
