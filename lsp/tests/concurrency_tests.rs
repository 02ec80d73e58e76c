//! Harness behavior under load, cancellation and timeouts, exercised
//! against real compiles.

mod test_utils;

use lsp_types::Uri;
use lume_lsp::core::analysis::Analysis;
use lume_lsp::core::worker::{CancelToken, QueryError, Worker};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use test_utils::uri;

const POLL: Duration = Duration::from_millis(5);
const PLENTY: Duration = Duration::from_secs(10);

fn shared_with(path: &str, text: &str) -> (Arc<Mutex<Analysis>>, Uri) {
    let u = uri(path);
    let analysis = Analysis::shared();
    analysis.lock().store.set_text(&u, text.to_string());
    (analysis, u)
}

#[test]
fn a_timed_out_compile_does_not_poison_the_next_query() {
    let worker = Worker::new();
    let (analysis, u) = shared_with("isolation.lume", "ok is\n  say \"fine\"\n");

    // Deliberately slow occupant of the worker.
    let slow = worker.run_tracked(&CancelToken::new(), POLL, Duration::from_millis(50), || {
        std::thread::sleep(Duration::from_millis(400));
        "too slow"
    });
    assert_eq!(slow, Err(QueryError::DeadlineExceeded));

    // An unrelated query right after must still complete correctly.
    let analysis2 = Arc::clone(&analysis);
    let name = worker
        .run_tracked(&CancelToken::new(), POLL, PLENTY, move || {
            let mut a = analysis2.lock();
            let snap = a.snapshot(&u).unwrap();
            snap.ast.decl(snap.ast.top_level[0]).name.clone()
        })
        .expect("healthy query after a timeout");
    assert_eq!(name, "ok");
}

#[test]
fn results_reflect_text_in_effect_at_submission() {
    let worker = Worker::new();
    let (analysis, u) = shared_with("order.lume", "one is\n  say \"1\"\n");

    // First query against the current text, then an edit plus a second
    // query; strict worker ordering means the second sees the new text.
    let a1 = Arc::clone(&analysis);
    let u1 = u.clone();
    let first = worker.submit(move || {
        let mut a = a1.lock();
        let snap = a.snapshot(&u1).unwrap();
        snap.ast.decl(snap.ast.top_level[0]).name.clone()
    });

    analysis
        .lock()
        .store
        .set_text(&u, "two is\n  say \"2\"\n".to_string());

    let a2 = Arc::clone(&analysis);
    let u2 = u.clone();
    let second = worker.submit(move || {
        let mut a = a2.lock();
        let snap = a.snapshot(&u2).unwrap();
        snap.ast.decl(snap.ast.top_level[0]).name.clone()
    });

    let take = |p: &lume_lsp::core::worker::Pending<String>| loop {
        if let Some(r) = p.try_take() {
            break r.unwrap();
        }
        std::thread::sleep(POLL);
    };
    assert_eq!(take(&first), "one");
    assert_eq!(take(&second), "two");
}

#[test]
fn cancellation_and_timeout_are_distinct_outcomes() {
    let worker = Worker::new();

    let cancel = CancelToken::new();
    cancel.fire();
    let cancelled =
        worker.run_tracked(&cancel, POLL, PLENTY, || "never observed");
    assert_eq!(cancelled, Err(QueryError::Cancelled));

    let timed_out = worker.run_tracked(&CancelToken::new(), POLL, Duration::from_millis(40), || {
        std::thread::sleep(Duration::from_millis(300));
        "late"
    });
    assert_eq!(timed_out, Err(QueryError::DeadlineExceeded));
    assert_ne!(cancelled, timed_out);
}

#[test]
fn background_work_runs_off_the_sequential_worker() {
    let worker = Worker::new();
    let (tx, rx) = std::sync::mpsc::channel();

    // Occupy the sequential worker...
    let _busy = worker.submit(|| std::thread::sleep(Duration::from_millis(200)));

    // ...while background work completes immediately.
    Worker::run_in_background(move || {
        tx.send("done").ok();
    });
    let got = rx.recv_timeout(Duration::from_millis(100));
    assert_eq!(got, Ok("done"));
}
