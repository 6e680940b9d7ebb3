use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flowdag::{Executor, Flow};

#[test]
fn completed_flow_can_run_again() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut flow = Flow::new("chain");
    let a = {
        let log = Arc::clone(&log);
        flow.task("A", move || log.lock().unwrap().push("A"))
    };
    let b = {
        let log = Arc::clone(&log);
        flow.task("B", move || log.lock().unwrap().push("B"))
    };
    a.precede(&b);

    let executor = Executor::new(2).unwrap();
    executor.run(&flow).wait();
    executor.run(&flow).wait();

    assert_eq!(*log.lock().unwrap(), vec!["A", "B", "A", "B"]);
}

#[test]
fn cancelled_flow_resets_on_next_run() {
    let fail_first = Arc::new(AtomicBool::new(true));
    let downstream = Arc::new(AtomicUsize::new(0));

    let mut flow = Flow::new("flaky");
    let a = {
        let fail_first = Arc::clone(&fail_first);
        flow.task("A", move || {
            if fail_first.swap(false, Ordering::SeqCst) {
                panic!("first run fails");
            }
        })
    };
    let b = {
        let downstream = Arc::clone(&downstream);
        flow.task("B", move || {
            downstream.fetch_add(1, Ordering::SeqCst);
        })
    };
    a.precede(&b);

    let executor = Executor::new(2).unwrap();

    executor.run(&flow).wait();
    assert!(flow.cancelled());
    assert_eq!(downstream.load(Ordering::SeqCst), 0);

    executor.run(&flow).wait();
    assert!(!flow.cancelled());
    assert_eq!(downstream.load(Ordering::SeqCst), 1);
}

#[test]
fn reruns_double_the_profile() {
    let mut flow = Flow::new("chain");
    let a = flow.task("A", || {});
    let b = flow.task("B", || {});
    a.precede(&b);

    let executor = Executor::new(2).unwrap();
    executor.run(&flow).wait();
    executor.run(&flow).wait();

    let mut out = Vec::new();
    executor.profile(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 4);
}
