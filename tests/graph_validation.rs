use flowdag::{Executor, Flow, FlowdagError};

#[test]
fn acyclic_flow_validates() {
    let mut flow = Flow::new("ok");
    let a = flow.task("A", || {});
    let b = flow.task("B", || {});
    let c = flow.task("C", || {});
    a.precede(&b);
    a.precede(&c);
    c.succeed(&b);

    assert!(flow.validate().is_ok());
}

#[test]
fn cycle_is_reported_with_an_involved_task() {
    let mut flow = Flow::new("cyclic");
    let a = flow.task("A", || {});
    let b = flow.task("B", || {});
    a.precede(&b);
    b.precede(&a);

    match flow.validate() {
        Err(FlowdagError::GraphCycle(name)) => {
            assert!(name == "A" || name == "B", "unexpected task: {name}");
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
}

#[test]
fn loop_through_a_condition_is_not_a_cycle() {
    let mut flow = Flow::new("loop");
    let a = flow.task("A", || {});
    let b = flow.task("B", || {});
    let again = flow.condition("again", || 1);
    let done = flow.task("done", || {});
    a.precede(&b);
    b.precede(&again);
    again.precede(&b);
    again.precede(&done);

    assert!(flow.validate().is_ok());
}

#[test]
#[should_panic(expected = "cannot precede itself")]
fn self_edge_panics_at_insertion() {
    let mut flow = Flow::new("selfie");
    let a = flow.task("A", || {});
    a.precede(&a);
}

#[test]
fn zero_concurrency_is_rejected() {
    assert!(matches!(
        Executor::new(0),
        Err(FlowdagError::ZeroConcurrency)
    ));
}
