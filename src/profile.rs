// src/profile.rs

//! Execution profiler: one span per successfully-executed vertex, emitted
//! after the fact as collapsed-stack flame-graph text.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use crate::dag::node::NodeKind;

/// One vertex execution. `parent` is the span of the subflow dispatch that
/// enqueued this vertex, if any; the chain of parents becomes the stack in
/// the flame graph.
pub(crate) struct Span {
    kind: NodeKind,
    name: String,
    begin: Instant,
    cost_micros: AtomicU64,
    parent: Option<Weak<Span>>,
}

impl Span {
    pub(crate) fn begin(kind: NodeKind, name: &str, parent: Option<&Arc<Span>>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            name: name.to_string(),
            begin: Instant::now(),
            cost_micros: AtomicU64::new(0),
            parent: parent.map(Arc::downgrade),
        })
    }

    /// Fix the span's duration. Called exactly once, from the invoker's
    /// finaliser, whether or not the payload panicked.
    pub(crate) fn finish(&self) {
        let micros = self.begin.elapsed().as_micros() as u64;
        self.cost_micros.store(micros, Ordering::SeqCst);
    }

    fn stack(&self) -> String {
        let mut names = vec![self.name.clone()];
        let mut parent = self.parent.clone();
        while let Some(weak) = parent {
            let Some(span) = weak.upgrade() else {
                break;
            };
            names.push(span.name.clone());
            parent = span.parent.clone();
        }
        names.reverse();
        names.join(";")
    }
}

/// Thread-safe span sink. Only written during a run; read once, after
/// `wait` has returned.
#[derive(Default)]
pub(crate) struct Profiler {
    spans: Mutex<Vec<Arc<Span>>>,
}

impl Profiler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, span: Arc<Span>) {
        debug!(kind = span.kind.as_str(), span = %span.name, "recorded span");
        self.spans.lock().push(span);
    }

    /// Emit collapsed-stack flame-graph text: one `a;b;leaf micros` line per
    /// span, no header or trailer. Lines are sorted so output is stable
    /// across runs of the same graph.
    pub(crate) fn draw<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        let mut lines: Vec<String> = self
            .spans
            .lock()
            .iter()
            .map(|span| {
                format!(
                    "{} {}",
                    span.stack(),
                    span.cost_micros.load(Ordering::SeqCst)
                )
            })
            .collect();
        lines.sort();

        for line in lines {
            writeln!(w, "{line}")?;
        }
        Ok(())
    }
}
