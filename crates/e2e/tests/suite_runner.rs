//! Whole-suite runs through `SuiteRunner`

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::FakeSession;
use heroes_e2e::report::ReportSummary;
use heroes_e2e::{
    BrowserSession, LifecycleCoordinator, SuiteRunner, TestCase, TestFailure, TestStatus,
};

fn load_summary(path: &std::path::Path) -> ReportSummary {
    let json_path = path.with_extension("json");
    serde_json::from_str(&std::fs::read_to_string(json_path).unwrap()).unwrap()
}

/// One failing test with one session, run with the coordinator or teardown
/// capturing. Returns the session after the run.
fn run_failing_suite(listener_takes_screenshots: bool) -> (Arc<FakeSession>, tempfile::TempDir) {
    let out = tempfile::tempdir().unwrap();
    let session = FakeSession::new("s1", &out.path().join("raw"));
    let coordinator = Arc::new(LifecycleCoordinator::new(common::config(
        out.path(),
        listener_takes_screenshots,
    )));

    let registered = session.clone();
    let case = TestCase::new("T1", "heroes::users::LoginTests", move |ctx| {
        ctx.register_session(registered.clone());
        Err(TestFailure::failed("boom"))
    })
    .with_default_teardown();

    let summary = SuiteRunner::new(coordinator).run("Suite1", vec![case]).unwrap();
    assert_eq!(summary.failed, 1);
    assert!(!summary.success());
    (session, out)
}

#[test]
fn coordinator_capture_means_exactly_one_screenshot() {
    let (session, out) = run_failing_suite(true);
    assert_eq!(session.capture_names(), vec!["T1".to_string()]);
    assert_eq!(session.quit_count(), 1);
    assert!(out.path().join("Suite1").join("T1.png").exists());
}

#[test]
fn teardown_capture_means_exactly_one_screenshot() {
    let (session, out) = run_failing_suite(false);
    assert_eq!(session.capture_names(), vec!["T1".to_string()]);
    assert_eq!(session.quit_count(), 1);
    // Local captures stay out of the report folder
    assert!(!out.path().join("Suite1").join("T1.png").exists());
}

#[test]
fn sessions_released_once_for_every_outcome() {
    let out = tempfile::tempdir().unwrap();
    let raw = out.path().join("raw");
    let coordinator = Arc::new(LifecycleCoordinator::new(common::config(out.path(), true)));

    let passing = FakeSession::new("pass", &raw);
    let failing = FakeSession::new("fail", &raw);
    let skipping = FakeSession::new("skip", &raw);
    let panicking = FakeSession::new("panic", &raw);

    let cases = vec![
        {
            let s = passing.clone();
            TestCase::new("passes", "heroes::Smoke", move |ctx| {
                ctx.register_session(s.clone());
                Ok(())
            })
        },
        {
            let s = failing.clone();
            TestCase::new("fails", "heroes::Smoke", move |ctx| {
                ctx.register_session(s.clone());
                Err(TestFailure::failed("expected 3 heroes, got 2"))
            })
        },
        {
            let s = skipping.clone();
            TestCase::new("skips", "heroes::Smoke", move |ctx| {
                ctx.register_session(s.clone());
                Err(TestFailure::skip("backend not seeded"))
            })
        },
        {
            let s = panicking.clone();
            TestCase::new("panics", "heroes::Smoke", move |ctx| {
                ctx.register_session(s.clone());
                panic!("element #hero-list not found");
            })
        },
    ]
    .into_iter()
    .map(TestCase::with_default_teardown)
    .collect();

    let summary = SuiteRunner::new(coordinator).run("Lifecycle", cases).unwrap();
    assert_eq!((summary.passed, summary.failed, summary.skipped), (1, 2, 1));

    for session in [&passing, &failing, &skipping, &panicking] {
        assert_eq!(session.quit_count(), 1, "session {} released once", session.id());
    }
    assert_eq!(failing.capture_names(), vec!["fails".to_string()]);
    assert_eq!(panicking.capture_names(), vec!["panics".to_string()]);
    assert!(passing.capture_names().is_empty());
    assert!(skipping.capture_names().is_empty());

    let panicked = summary.outcome("panics").unwrap();
    assert_eq!(panicked.status, TestStatus::Failure);
    let detail = panicked.failure.as_ref().unwrap();
    assert_eq!(detail.message, "element #hero-list not found");
    assert!(detail.stack_trace.starts_with("panicked at "));
    assert!(detail.stack_trace.contains("suite_runner.rs"));

    let failed = summary.outcome("fails").unwrap().failure.as_ref().unwrap();
    assert!(!failed.stack_trace.is_empty());
    assert_ne!(failed.stack_trace, "disabled backtrace");
}

#[test]
fn statically_skipped_case_never_runs() {
    let out = tempfile::tempdir().unwrap();
    let coordinator = Arc::new(LifecycleCoordinator::new(common::config(out.path(), true)));
    let case = TestCase::new("disabled", "heroes::Smoke", |_| panic!("must not run"))
        .skipped("flaky on webkit");

    let summary = SuiteRunner::new(coordinator).run("Skips", vec![case]).unwrap();
    assert_eq!(summary.skipped, 1);

    let report = load_summary(summary.report_path.as_deref().unwrap());
    assert_eq!(report.skipped, 1);
}

#[test]
fn panicking_cleanup_does_not_break_the_run() {
    let out = tempfile::tempdir().unwrap();
    let coordinator = Arc::new(LifecycleCoordinator::new(common::config(out.path(), true)));
    let cases = vec![
        TestCase::new("first", "heroes::Smoke", |_| Ok(()))
            .with_cleanup(|_, _| panic!("cleanup exploded")),
        TestCase::new("second", "heroes::Smoke", |_| Ok(())),
    ];

    let summary = SuiteRunner::new(coordinator).run("Cleanup", cases).unwrap();
    assert_eq!(summary.passed, 2);
}

#[test]
fn multi_session_failure_through_runner() {
    let out = tempfile::tempdir().unwrap();
    let raw = out.path().join("raw");
    let coordinator = Arc::new(LifecycleCoordinator::new(common::config(out.path(), true)));
    let alice = FakeSession::new("alice", &raw);
    let bob = FakeSession::new("bob", &raw);

    let (a, b) = (alice.clone(), bob.clone());
    let case = TestCase::new("T2", "heroes::users::ChatTests", move |ctx| {
        ctx.register_sessions(vec![
            a.clone() as Arc<dyn BrowserSession>,
            b.clone() as Arc<dyn BrowserSession>,
        ]);
        Err(TestFailure::failed("bob never saw the message"))
    })
    .with_default_teardown();

    let summary = SuiteRunner::new(coordinator).run("Suite1", vec![case]).unwrap();

    assert_eq!(alice.capture_names(), vec!["T2.1".to_string()]);
    assert_eq!(bob.capture_names(), vec!["T2.2".to_string()]);
    assert_eq!(alice.quit_count(), 1);
    assert_eq!(bob.quit_count(), 1);

    let report = load_summary(summary.report_path.as_deref().unwrap());
    let entry = report.entries.iter().find(|e| e.name == "T2").unwrap();
    let media: Vec<&str> = entry.records.iter().filter_map(|r| r.media.as_deref()).collect();
    assert_eq!(media, vec!["Suite1/T2.1.png", "Suite1/T2.2.png"]);
}

#[test]
fn single_and_listed_sessions_are_all_released() {
    for listener_takes_screenshots in [true, false] {
        let out = tempfile::tempdir().unwrap();
        let raw = out.path().join("raw");
        let coordinator = Arc::new(LifecycleCoordinator::new(common::config(
            out.path(),
            listener_takes_screenshots,
        )));
        let main = FakeSession::new("main", &raw);
        let alice = FakeSession::new("alice", &raw);
        let bob = FakeSession::new("bob", &raw);

        let (m, a, b) = (main.clone(), alice.clone(), bob.clone());
        let case = TestCase::new("T", "heroes::users::ChatTests", move |ctx| {
            ctx.register_session(m.clone());
            ctx.register_sessions(vec![
                a.clone() as Arc<dyn BrowserSession>,
                b.clone() as Arc<dyn BrowserSession>,
            ]);
            let registered = ctx.sessions()?;
            if registered.len() != 3 {
                return Err(TestFailure::failed(format!("{} sessions registered", registered.len())));
            }
            Err(TestFailure::failed("chat window closed"))
        })
        .with_default_teardown();

        let summary = SuiteRunner::new(coordinator).run("Mixed", vec![case]).unwrap();
        let failure = summary.outcome("T").unwrap().failure.as_ref().unwrap();
        assert_eq!(failure.message, "chat window closed");

        for (session, shot) in [(&main, "T.1"), (&alice, "T.2"), (&bob, "T.3")] {
            assert_eq!(session.quit_count(), 1, "session {} released once", session.id());
            assert_eq!(session.capture_names(), vec![shot.to_string()]);
        }
    }
}

#[test]
fn parallel_tests_keep_their_own_entries() {
    let out = tempfile::tempdir().unwrap();
    let raw = out.path().join("raw");
    let coordinator = Arc::new(LifecycleCoordinator::new(common::config(out.path(), true)));

    let mut sessions = HashMap::new();
    let mut cases = Vec::new();
    for i in 0..40 {
        let name = format!("hero_{:02}", i);
        let session = FakeSession::new(&name, &raw);
        sessions.insert(name.clone(), session.clone());
        let fails = i % 2 == 0;
        cases.push(
            TestCase::new(name.clone(), "heroes::heroes::HeroDetailTests", move |ctx| {
                ctx.register_session(session.clone());
                std::thread::yield_now();
                if fails {
                    Err(TestFailure::failed(format!("{} has no powers", ctx.name())))
                } else {
                    Ok(())
                }
            })
            .with_default_teardown(),
        );
    }

    let summary = SuiteRunner::new(coordinator)
        .with_threads(8)
        .run("Parallel", cases)
        .unwrap();
    assert_eq!((summary.total, summary.passed, summary.failed), (40, 20, 20));

    for (name, session) in &sessions {
        assert_eq!(session.quit_count(), 1, "{} released once", name);
    }

    let report = load_summary(summary.report_path.as_deref().unwrap());
    assert_eq!(report.total, 40);
    for entry in &report.entries {
        let index: usize = entry.name["hero_".len()..].parse().unwrap();
        let media: Vec<&str> = entry.records.iter().filter_map(|r| r.media.as_deref()).collect();
        if index % 2 == 0 {
            assert_eq!(media, vec![format!("Parallel/{}.png", entry.name)]);
            assert!(entry
                .records
                .iter()
                .any(|r| r.message.contains(&format!("{} has no powers", entry.name))));
            assert_eq!(sessions[&entry.name].capture_names(), vec![entry.name.clone()]);
        } else {
            assert!(media.is_empty());
            assert!(sessions[&entry.name].capture_names().is_empty());
        }
    }
}

#[test]
fn run_parameters_reach_tests() {
    let out = tempfile::tempdir().unwrap();
    let coordinator = Arc::new(LifecycleCoordinator::new(common::config(out.path(), true)));
    let case = TestCase::new("reads_param", "heroes::users::LoginTests", |ctx| {
        assert_eq!(ctx.info().namespace(), "heroes::users");
        match ctx.parameter("baseUrl") {
            Some("http://localhost:4200") => Ok(()),
            other => Err(TestFailure::failed(format!("unexpected baseUrl {:?}", other))),
        }
    });

    let summary = SuiteRunner::new(coordinator)
        .with_parameters(heroes_e2e::RunParameters::from_pairs([("baseUrl", "http://localhost:4200")]))
        .run("Params", vec![case])
        .unwrap();
    assert!(summary.success());
}
