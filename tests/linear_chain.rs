use std::io::Read;
use std::sync::{Arc, Mutex};

use flowdag::{Executor, Flow};

fn log_task(log: &Arc<Mutex<Vec<String>>>, name: &str) -> impl Fn() + Send + Sync + 'static {
    let log = Arc::clone(log);
    let name = name.to_string();
    move || log.lock().unwrap().push(name.clone())
}

fn chain(log: &Arc<Mutex<Vec<String>>>) -> Flow {
    let mut flow = Flow::new("chain");
    let a = flow.task("A", log_task(log, "A"));
    let b = flow.task("B", log_task(log, "B"));
    let c = flow.task("C", log_task(log, "C"));
    a.precede(&b);
    b.precede(&c);
    flow
}

#[test]
fn chain_runs_in_dependency_order() {
    let _ = flowdag::logging::init_logging(None);

    let log = Arc::new(Mutex::new(Vec::new()));
    let flow = chain(&log);

    let executor = Executor::new(2).unwrap();
    executor.run(&flow).wait();

    assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);
    assert!(!flow.cancelled());
}

#[test]
fn chain_profile_has_one_flat_line_per_task() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let flow = chain(&log);

    let executor = Executor::new(2).unwrap();
    executor.run(&flow).wait();

    let mut out = Vec::new();
    executor.profile(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let stacks: Vec<&str> = text
        .lines()
        .map(|line| line.rsplit_once(' ').expect("line has a duration").0)
        .collect();
    assert_eq!(stacks, vec!["A", "B", "C"]);

    for line in text.lines() {
        let (_, micros) = line.rsplit_once(' ').unwrap();
        micros.parse::<u64>().expect("duration is integer microseconds");
    }
}

#[test]
fn profile_can_be_written_to_a_file() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let flow = chain(&log);

    let executor = Executor::new(2).unwrap();
    executor.run(&flow).wait();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    executor.profile(file.as_file_mut()).unwrap();

    let mut text = String::new();
    file.reopen().unwrap().read_to_string(&mut text).unwrap();
    assert_eq!(text.lines().count(), 3);
}
