use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flowdag::{Executor, Flow};

fn log_task(log: &Arc<Mutex<Vec<String>>>, name: &str) -> impl Fn() + Send + Sync + 'static {
    let log = Arc::clone(log);
    let name = name.to_string();
    move || log.lock().unwrap().push(name.clone())
}

fn profile_stacks(executor: &Executor) -> Vec<String> {
    let mut out = Vec::new();
    executor.profile(&mut out).unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| line.rsplit_once(' ').unwrap().0.to_string())
        .collect()
}

fn nested_flow(log: &Arc<Mutex<Vec<String>>>) -> Flow {
    let mut flow = Flow::new("outer");
    let p1 = flow.task("P1", log_task(log, "P1"));
    let sf = {
        let log = Arc::clone(log);
        flow.subflow("SF", move |sub| {
            let s1 = sub.task("S1", log_task(&log, "S1"));
            let s2 = sub.task("S2", log_task(&log, "S2"));
            s1.precede(&s2);
        })
    };
    let p2 = flow.task("P2", log_task(log, "P2"));
    p1.precede(&sf);
    sf.precede(&p2);
    flow
}

#[test]
fn subflow_runs_between_its_neighbours() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let flow = nested_flow(&log);

    // The subflow's dispatcher occupies a worker slot while S1/S2 need one
    // of their own.
    let executor = Executor::new(2).unwrap();
    executor.run(&flow).wait();

    assert_eq!(*log.lock().unwrap(), vec!["P1", "S1", "S2", "P2"]);
}

#[test]
fn subflow_spans_nest_under_the_subflow() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let flow = nested_flow(&log);

    let executor = Executor::new(2).unwrap();
    executor.run(&flow).wait();

    assert_eq!(
        profile_stacks(&executor),
        vec!["P1", "P2", "SF", "SF;S1", "SF;S2"]
    );
}

#[test]
fn doubly_nested_subflows_stack_their_spans() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut flow = Flow::new("outer");
    let outer = {
        let log = Arc::clone(&log);
        flow.subflow("Outer", move |mid| {
            let log = Arc::clone(&log);
            mid.subflow("Inner", move |leafs| {
                leafs.task("Leaf", log_task(&log, "Leaf"));
            });
        })
    };
    let done = flow.task("done", log_task(&log, "done"));
    outer.precede(&done);

    let executor = Executor::new(3).unwrap();
    executor.run(&flow).wait();

    assert_eq!(*log.lock().unwrap(), vec!["Leaf", "done"]);
    assert_eq!(
        profile_stacks(&executor),
        vec!["Outer", "Outer;Inner", "Outer;Inner;Leaf", "done"]
    );
}

#[test]
fn subflow_builder_runs_once_across_runs() {
    let built = Arc::new(AtomicUsize::new(0));
    let ran = Arc::new(AtomicUsize::new(0));

    let mut flow = Flow::new("outer");
    {
        let built = Arc::clone(&built);
        let ran = Arc::clone(&ran);
        flow.subflow("SF", move |sub| {
            built.fetch_add(1, Ordering::SeqCst);
            let ran = Arc::clone(&ran);
            sub.task("S1", move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        });
    }

    let executor = Executor::new(2).unwrap();
    executor.run(&flow).wait();
    executor.run(&flow).wait();

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(ran.load(Ordering::SeqCst), 2);
}

#[test]
fn panic_inside_subflow_cancels_parent() {
    let after = Arc::new(AtomicUsize::new(0));

    let mut flow = Flow::new("outer");
    let sf = flow.subflow("SF", |sub| {
        sub.task("boom", || panic!("inner task failure"));
    });
    let p2 = {
        let after = Arc::clone(&after);
        flow.task("P2", move || {
            after.fetch_add(1, Ordering::SeqCst);
        })
    };
    sf.precede(&p2);

    let executor = Executor::new(2).unwrap();
    executor.run(&flow).wait();

    assert!(flow.cancelled());
    assert_eq!(after.load(Ordering::SeqCst), 0);
    // The subflow itself completed its dispatch; only the panicking task's
    // span is missing.
    assert_eq!(profile_stacks(&executor), vec!["SF"]);
}

#[test]
fn panic_in_builder_cancels_parent_and_drops_span() {
    let after = Arc::new(AtomicUsize::new(0));

    let mut flow = Flow::new("outer");
    let p1 = flow.task("P1", || {});
    let sf = flow.subflow("SF", |_sub| panic!("builder failure"));
    let p2 = {
        let after = Arc::clone(&after);
        flow.task("P2", move || {
            after.fetch_add(1, Ordering::SeqCst);
        })
    };
    p1.precede(&sf);
    sf.precede(&p2);

    let executor = Executor::new(2).unwrap();
    executor.run(&flow).wait();

    assert!(flow.cancelled());
    assert_eq!(after.load(Ordering::SeqCst), 0);
    assert_eq!(profile_stacks(&executor), vec!["P1"]);
}
