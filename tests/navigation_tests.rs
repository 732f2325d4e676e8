//! Integration tests for entry list operations
//!
//! navigate / back / forward / traverse_to / reload / update_current_entry
//! against an in-memory host.

mod common;

use common::*;
use history_navigator::*;
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn test_navigate_appends_and_commits() {
    let (nav, host) = setup();

    go_to(&nav, "/a").await;
    go_to(&nav, "/b").await;

    assert_eq!(urls(&nav), vec![url("/"), url("/a"), url("/b")]);
    assert_eq!(nav.current_entry().url(), url("/b"));
    assert!(nav.can_go_back());
    assert!(!nav.can_go_forward());

    assert_eq!(host.length(), 3);
    assert_eq!(host.location(), url("/b"));
}

#[tokio::test(start_paused = true)]
async fn test_back_on_initial_entry_is_rejected() {
    let (nav, _host) = setup();

    let result = nav.back();
    assert!(matches!(
        result.committed.await,
        Err(NavigationError::InitialState { .. })
    ));
    assert!(matches!(
        result.finished.await,
        Err(NavigationError::InitialState { .. })
    ));
    assert_eq!(nav.entries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wizard_steps_back_and_forward() {
    let (nav, _host) = setup();
    go_to(&nav, "/wizard/").await;

    go_to(&nav, "./step1").await;
    go_to(&nav, "./step2").await;
    assert_eq!(nav.current_entry().url(), url("/wizard/step2"));

    nav.back().finished.await.unwrap();
    assert_eq!(nav.current_entry().url(), url("/wizard/step1"));
    assert!(nav.can_go_forward());

    nav.forward(None).finished.await.unwrap();
    assert_eq!(nav.current_entry().url(), url("/wizard/step2"));
    assert!(!nav.can_go_forward());
    assert_eq!(nav.entries().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_push_after_traverse_drops_forward_entries() {
    let (nav, host) = setup();
    for path in ["/1", "/2", "/3", "/4"] {
        go_to(&nav, path).await;
    }
    let third = nav.entries()[2].key().clone();

    nav.traverse_to(&third, None).finished.await.unwrap();
    assert_eq!(nav.current_index(), 2);

    go_to(&nav, "/new").await;
    assert_eq!(urls(&nav), vec![url("/"), url("/1"), url("/2"), url("/new")]);
    assert_eq!(nav.current_index(), 3);

    settle().await;
    assert_eq!(host.length(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_replace_keeps_length_and_key() {
    let (nav, _host) = setup();
    go_to(&nav, "/a").await;
    let key = nav.current_entry().key().clone();

    nav.navigate(
        "/b",
        NavigateOptions::new()
            .history(HistoryBehavior::Replace)
            .state(json!({"step": 2})),
    )
    .finished
    .await
    .unwrap();

    assert_eq!(nav.entries().len(), 2);
    let current = nav.current_entry();
    assert_eq!(current.url(), url("/b"));
    assert_eq!(current.key(), &key);
    assert_eq!(current.state(), Some(&json!({"step": 2})));
}

#[tokio::test(start_paused = true)]
async fn test_legacy_replace_flag() {
    let (nav, _host) = setup();
    nav.navigate("/r", NavigateOptions::new().replace(true))
        .finished
        .await
        .unwrap();
    assert_eq!(urls(&nav), vec![url("/r")]);
}

#[tokio::test(start_paused = true)]
async fn test_traverse_to_unknown_key() {
    let (nav, _host) = setup();
    go_to(&nav, "/a").await;

    let result = nav.traverse_to(&EntryKey::from("nope"), None);
    assert_eq!(
        result.committed.await,
        Err(NavigationError::target_not_found("nope"))
    );
    assert_eq!(
        result.finished.await,
        Err(NavigationError::target_not_found("nope"))
    );
    assert_eq!(nav.current_entry().url(), url("/a"));
}

#[tokio::test(start_paused = true)]
async fn test_forward_at_end_is_rejected() {
    let (nav, _host) = setup();
    let result = nav.forward(None);
    assert!(matches!(
        result.finished.await,
        Err(NavigationError::TargetEntryNotFound { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_update_current_entry_announces_once() {
    let (nav, _host) = setup();
    go_to(&nav, "/a").await;
    let recorder = Recorder::attach(&nav);

    nav.update_current_entry(json!({"scroll": 120}));
    settle().await;

    assert_eq!(recorder.events(), vec!["currententrychange:replace"]);
    assert_eq!(nav.current_entry().state(), Some(&json!({"scroll": 120})));
    assert_eq!(nav.entries().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reload_reloads_host_after_finish() {
    let (nav, host) = setup();
    go_to(&nav, "/a").await;
    let recorder = Recorder::attach(&nav);

    nav.reload(Some(json!("refresh"))).finished.await.unwrap();
    settle().await;

    assert_eq!(host.reload_count(), 1);
    assert_eq!(nav.entries().len(), 2);
    assert_eq!(recorder.count("navigate:reload"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_destination() {
    let host = std::sync::Arc::new(MemoryHistory::new("not-absolute"));
    let nav = Navigation::register(host, NavigationOptions::default());

    let result = nav.navigate("./x", NavigateOptions::new());
    assert!(matches!(
        result.finished.await,
        Err(NavigationError::InvalidUrl { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_transition_cleared_after_finish() {
    let (nav, _host) = setup();

    let result = nav.navigate("/a", NavigateOptions::new());
    tokio::task::yield_now().await;
    let transition = nav.transition().expect("transition should be active");
    assert_eq!(transition.navigation_type(), NavigationType::Push);
    assert_eq!(transition.from().map(|e| e.url().to_string()), Some(url("/")));

    result.finished.await.unwrap();
    assert!(nav.transition().is_none());
    assert!(transition.finished().is_settled());
    assert_eq!(nav.phase(), DispatchPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_entries_survive_snapshot_round_trip_in_host() {
    let (nav, host) = setup();
    nav.navigate("/a", NavigateOptions::new().state(json!([1, 2])))
        .finished
        .await
        .unwrap();

    let stored = host.state().expect("host slot should carry state");
    let snapshot = EntrySnapshot::from_host_state(&stored).expect("snapshot");
    let current = nav.current_entry();
    assert_eq!(snapshot.id, current.id());
    assert_eq!(&snapshot.key, current.key());
    assert_eq!(snapshot.index, 1);
    assert_eq!(snapshot.state, Some(json!([1, 2])));
}

#[tokio::test(start_paused = true)]
async fn test_step_states_follow_traversal() {
    let (nav, _host) = setup();

    nav.navigate("/step1", NavigateOptions::new().state("step1"))
        .finished
        .await
        .unwrap();
    let current = nav.current_entry();
    assert!(current.url().ends_with("/step1"));
    assert_eq!(current.state(), Some(&json!("step1")));
    assert!(nav.can_go_back());

    nav.navigate("/step2", NavigateOptions::new().state("step2"))
        .finished
        .await
        .unwrap();

    nav.back().finished.await.unwrap();
    assert_eq!(nav.current_entry().state(), Some(&json!("step1")));
    assert!(nav.can_go_forward());

    nav.forward(None).finished.await.unwrap();
    assert_eq!(nav.current_entry().state(), Some(&json!("step2")));
}

#[tokio::test(start_paused = true)]
async fn test_second_navigate_wins() {
    let (nav, _host) = setup();

    let a = nav.navigate("/a", NavigateOptions::new());
    let b = nav.navigate("/b", NavigateOptions::new());

    assert_eq!(
        a.finished.await,
        Err(NavigationError::AbortedBySupersedingTransition)
    );
    b.finished.await.unwrap();
    assert!(nav.current_entry().url().ends_with("/b"));
}
