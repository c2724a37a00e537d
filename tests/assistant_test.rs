//! Hotkey handling end to end: queueing, the one-analysis-at-a-time rule,
//! the enable toggle, and what reaches the clipboard and notifications.

mod helpers;

use ai_assistant_lib::assistant::Assistant;
use ai_assistant_lib::capture::CaptureQueue;
use ai_assistant_lib::config::ConfigStore;
use ai_assistant_lib::credentials::CredentialPool;
use ai_assistant_lib::delivery::DeliveryReport;
use ai_assistant_lib::hotkey::HotkeyEvent;
use ai_assistant_lib::pipeline::Orchestrator;
use helpers::{
    keys, quota_error, CallLog, CountingScreens, FakeClipboard, RecordingNotifier, ScriptedClient,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Rig {
    assistant: Arc<Assistant<ScriptedClient>>,
    calls: Arc<CallLog>,
    clipboard: Arc<FakeClipboard>,
    notes: Arc<RecordingNotifier>,
    _dir: TempDir,
}

fn rig(client: ScriptedClient, queue_capacity: usize, auto_paste: bool) -> Rig {
    rig_with_screens(client, CountingScreens::default(), queue_capacity, auto_paste)
}

fn rig_with_screens(
    client: ScriptedClient,
    screens: CountingScreens,
    queue_capacity: usize,
    auto_paste: bool,
) -> Rig {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ConfigStore::open(dir.path().join("config.json")).unwrap());
    store
        .update(|c| {
            c.auto_paste.enabled = auto_paste;
            c.auto_paste.delay_ms = 0;
            c.auto_paste.restore_clipboard = false;
        })
        .unwrap();

    let calls = client.log();
    let screens = Arc::new(screens);
    let clipboard = Arc::new(FakeClipboard::default());
    let notes = Arc::new(RecordingNotifier::default());
    let orchestrator = Orchestrator::new(
        Arc::new(CredentialPool::in_memory(keys(1), true)),
        Arc::new(CaptureQueue::new(queue_capacity)),
        screens.clone(),
        client,
    );
    let assistant = Arc::new(Assistant::new(
        orchestrator,
        store,
        screens,
        clipboard.clone(),
        notes.clone(),
    ));
    Rig {
        assistant,
        calls,
        clipboard,
        notes,
        _dir: dir,
    }
}

#[tokio::test]
async fn capture_hotkey_queues_and_reports_total() {
    let r = rig(ScriptedClient::new(), 20, false);

    r.assistant.handle(HotkeyEvent::Capture).unwrap().await.unwrap();
    r.assistant.handle(HotkeyEvent::Capture).unwrap().await.unwrap();

    assert_eq!(r.assistant.queue().len(), 2);
    assert_eq!(
        r.notes.messages(),
        vec!["Screenshot Queued (Total: 1)", "Screenshot Queued (Total: 2)"]
    );
    assert!(r.calls.positions().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_capture_does_not_reorder_the_queue() {
    let screens = CountingScreens::slow_first(Duration::from_millis(300));
    let r = rig_with_screens(ScriptedClient::new(), screens, 20, false);

    let first = r.assistant.handle(HotkeyEvent::Capture).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = r.assistant.handle(HotkeyEvent::Capture).unwrap();
    first.await.unwrap();
    second.await.unwrap();

    let order: Vec<u8> = r
        .assistant
        .queue()
        .drain_all()
        .into_iter()
        .map(|item| item.png[0])
        .collect();
    assert_eq!(order, vec![1, 2]);
    assert_eq!(
        r.notes.messages(),
        vec!["Screenshot Queued (Total: 1)", "Screenshot Queued (Total: 2)"]
    );
}

#[tokio::test]
async fn full_queue_is_reported_and_rejected() {
    let r = rig(ScriptedClient::new(), 1, false);

    r.assistant.handle(HotkeyEvent::Capture).unwrap().await.unwrap();
    r.assistant.handle(HotkeyEvent::Capture).unwrap().await.unwrap();

    assert_eq!(r.assistant.queue().len(), 1);
    let messages = r.notes.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].starts_with("Screenshot queue is full"));
}

#[tokio::test]
async fn analyze_pastes_the_answer_and_sends_queued_captures() {
    let r = rig(ScriptedClient::new().reply(0, Ok("42")), 20, true);
    r.assistant.handle(HotkeyEvent::Capture).unwrap().await.unwrap();
    r.assistant.handle(HotkeyEvent::Capture).unwrap().await.unwrap();

    r.assistant.handle(HotkeyEvent::Analyze).unwrap().await.unwrap();

    assert_eq!(r.calls.images(), vec![vec![vec![1u8], vec![2u8]]]);
    assert!(r.assistant.queue().is_empty());
    assert_eq!(r.clipboard.content.lock().unwrap().as_deref(), Some("42"));
    assert_eq!(*r.clipboard.pastes.lock().unwrap(), 1);
    assert_eq!(r.notes.messages().last().unwrap(), "Response pasted!");
}

#[tokio::test]
async fn second_analyze_while_in_flight_is_dropped() {
    let client = ScriptedClient::new()
        .reply(0, Ok("done"))
        .with_delay(Duration::from_millis(200));
    let r = rig(client, 20, false);

    let first = r.assistant.handle(HotkeyEvent::Analyze).unwrap();
    assert!(r.assistant.is_busy());
    assert!(r.assistant.handle(HotkeyEvent::Analyze).is_none());

    // Capture presses still queue while an analysis runs.
    r.assistant.handle(HotkeyEvent::Capture).unwrap().await.unwrap();
    assert_eq!(r.assistant.queue().len(), 1);

    first.await.unwrap();
    assert!(!r.assistant.is_busy());
    assert_eq!(r.calls.positions(), vec![0]);

    // Once finished, the next press starts a new run.
    r.assistant.handle(HotkeyEvent::Analyze).unwrap().await.unwrap();
    assert_eq!(r.calls.positions(), vec![0, 0]);
}

#[tokio::test]
async fn failure_notifies_once_and_leaves_clipboard_alone() {
    let r = rig(ScriptedClient::new().reply(0, Err(quota_error())), 20, true);

    let report = r.assistant.analyze_and_deliver().await;

    assert_eq!(report, DeliveryReport::Notified);
    assert!(r.clipboard.content.lock().unwrap().is_none());
    let messages = r.notes.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("All API keys exhausted"));
}

#[tokio::test]
async fn disabled_assistant_ignores_hotkeys_until_toggled_back() {
    let r = rig(ScriptedClient::new().reply(0, Ok("ok")), 20, false);

    assert!(r.assistant.handle(HotkeyEvent::Toggle).is_none());
    assert!(!r.assistant.is_enabled());
    assert!(r.assistant.handle(HotkeyEvent::Analyze).is_none());
    assert!(r.assistant.handle(HotkeyEvent::Capture).is_none());
    assert!(r.assistant.queue().is_empty());

    r.assistant.handle(HotkeyEvent::Toggle);
    assert!(r.assistant.is_enabled());
    assert_eq!(
        r.notes.messages(),
        vec!["Assistant disabled", "Assistant enabled"]
    );
    assert!(r.assistant.handle(HotkeyEvent::Capture).is_some());
}

#[tokio::test]
async fn disabling_lets_the_running_analysis_finish() {
    let client = ScriptedClient::new()
        .reply(0, Ok("finished"))
        .with_delay(Duration::from_millis(100));
    let r = rig(client, 20, false);

    let running = r.assistant.handle(HotkeyEvent::Analyze).unwrap();
    r.assistant.set_enabled(false);
    running.await.unwrap();

    assert_eq!(
        r.clipboard.content.lock().unwrap().as_deref(),
        Some("finished")
    );
}
