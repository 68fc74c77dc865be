//! The parallel runner: a fixed-size worker pool plus a completion tree.
//!
//! Tasks (global tests and, optionally, sub-tests) are claimed from a shared
//! queue by index under a single lock, so no task runs twice and the queue
//! can keep growing while workers iterate, since a running test may submit
//! its own sub-tests. Result mutation is fine-grained: every in-flight set has
//! its own [`SetCell`] with its own lock, so unrelated subtrees never
//! serialize on each other.
//!
//! The drain cannot simply join the workers that existed when it started,
//! because tasks spawn tasks at runtime. Instead a completion tree tracks,
//! per task, whether its own body finished and how many of its children are
//! still outstanding; the drain polls the root at a coarse interval and
//! returns only when every task ever submitted has transitively completed.
//!
//! Known gaps, by design: a task that never returns stalls the drain
//! forever, and child order within a set is completion order, which is not
//! reproducible across runs.

use std::mem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::registry::{Entry, TestAction};
use crate::results::{ResultNode, ResultSet};
use crate::runner::{self, TestHandle};

/// How often the drain (and idle workers) re-check the completion root.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Lock helper that shrugs off poisoning; a panicking test body never holds
/// one of these locks, so the data cannot be torn.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// COMPLETION TREE
// =============================================================================

/// Arena index of a completion-tree node.
pub(crate) type NodeId = usize;

struct NodeState {
    body_done: AtomicBool,
    outstanding: AtomicUsize,
    /// Guards parent notification so a node propagates at most once.
    completed: AtomicBool,
    parent: Option<NodeId>,
}

/// Tracks transitively whether every dynamically spawned task has finished.
///
/// Nodes are arena-allocated and addressed by id, so parent back-references
/// are plain indices and no ownership cycle exists. A node is done iff its
/// own body finished and its outstanding-child counter is zero; completing
/// a node decrements its parent's counter, recursively.
pub(crate) struct CompletionTree {
    nodes: Mutex<Vec<Arc<NodeState>>>,
}

impl CompletionTree {
    /// The run root. Seeded as done so an empty run drains immediately.
    pub(crate) const ROOT: NodeId = 0;

    fn new() -> Self {
        let root = Arc::new(NodeState {
            body_done: AtomicBool::new(true),
            outstanding: AtomicUsize::new(0),
            completed: AtomicBool::new(false),
            parent: None,
        });
        Self {
            nodes: Mutex::new(vec![root]),
        }
    }

    fn node(&self, id: NodeId) -> Arc<NodeState> {
        Arc::clone(&lock(&self.nodes)[id])
    }

    /// Register a task under `parent`, incrementing its outstanding count.
    pub(crate) fn alloc(&self, parent: NodeId) -> NodeId {
        let mut nodes = lock(&self.nodes);
        nodes[parent].outstanding.fetch_add(1, Ordering::SeqCst);
        nodes.push(Arc::new(NodeState {
            body_done: AtomicBool::new(false),
            outstanding: AtomicUsize::new(0),
            completed: AtomicBool::new(false),
            parent: Some(parent),
        }));
        nodes.len() - 1
    }

    /// Record that a task's own body returned. Children it spawned may still
    /// be outstanding; completion propagates upward only once both hold.
    pub(crate) fn mark_body_done(&self, id: NodeId) {
        self.node(id).body_done.store(true, Ordering::SeqCst);
        self.try_complete(id);
    }

    pub(crate) fn is_done(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.body_done.load(Ordering::SeqCst) && node.outstanding.load(Ordering::SeqCst) == 0
    }

    fn try_complete(&self, id: NodeId) {
        let mut current = id;
        loop {
            let node = self.node(current);
            if !node.body_done.load(Ordering::SeqCst)
                || node.outstanding.load(Ordering::SeqCst) != 0
            {
                return;
            }
            if node.completed.swap(true, Ordering::SeqCst) {
                return;
            }
            let Some(parent) = node.parent else {
                return;
            };
            if self.node(parent).outstanding.fetch_sub(1, Ordering::SeqCst) != 1 {
                return;
            }
            // The parent just lost its last outstanding child; it may now be
            // fully done itself, so re-run the check one level up.
            current = parent;
        }
    }
}

// =============================================================================
// SHARED RESULT CELLS
// =============================================================================

/// A result set under construction that other tasks may still append to.
///
/// The owned [`ResultSet`] tree cannot be shared across workers, so while the
/// pool runs, each in-flight test accumulates children here behind the cell's
/// own lock. [`SetCell::freeze`] converts the finished cell tree back into
/// the plain owned tree once the drain confirms nothing is still writing.
pub(crate) struct SetCell {
    name: &'static str,
    level: u32,
    duration: Mutex<Duration>,
    children: Mutex<Vec<CellChild>>,
}

enum CellChild {
    Node(ResultNode),
    Set(Arc<SetCell>),
}

impl SetCell {
    pub(crate) fn new(name: &'static str, level: u32) -> Self {
        Self {
            name,
            level,
            duration: Mutex::new(Duration::ZERO),
            children: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_node(&self, node: ResultNode) {
        lock(&self.children).push(CellChild::Node(node));
    }

    pub(crate) fn push_set(&self, cell: Arc<SetCell>) {
        lock(&self.children).push(CellChild::Set(cell));
    }

    pub(crate) fn set_duration(&self, duration: Duration) {
        *lock(&self.duration) = duration;
    }

    /// Convert the cell tree into the owned result tree, re-deriving the
    /// aggregated failed flags bottom-up. Children appear in completion
    /// order.
    pub(crate) fn freeze(&self) -> ResultSet {
        let mut set = ResultSet::new(self.name, self.level);
        for child in mem::take(&mut *lock(&self.children)) {
            match child {
                CellChild::Node(node) => set.add(node),
                CellChild::Set(cell) => set.add(ResultNode::Set(cell.freeze())),
            }
        }
        set.finalize(*lock(&self.duration));
        set
    }
}

// =============================================================================
// WORKER POOL
// =============================================================================

type TaskBody = Box<dyn FnOnce(&mut TestHandle) + Send>;

struct Task {
    name: &'static str,
    level: u32,
    /// Completion node for this task, not its parent.
    node: NodeId,
    parent: Arc<SetCell>,
    body: TaskBody,
}

struct TaskQueue {
    tasks: Vec<Option<Task>>,
    next: usize,
}

pub(crate) struct ThreadPool {
    queue: Mutex<TaskQueue>,
    completion: CompletionTree,
    workers: usize,
    parallel_subs: bool,
}

impl ThreadPool {
    pub(crate) fn new(workers: usize, parallel_subs: bool) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(TaskQueue {
                tasks: Vec::new(),
                next: 0,
            }),
            completion: CompletionTree::new(),
            workers,
            parallel_subs,
        })
    }

    pub(crate) fn parallel_subs(&self) -> bool {
        self.parallel_subs
    }

    /// Enqueue one test body. Safe to call from worker threads while the
    /// drain is in progress; the completion node is registered before the
    /// task becomes claimable.
    pub(crate) fn submit(
        &self,
        name: &'static str,
        level: u32,
        parent_node: NodeId,
        parent: Arc<SetCell>,
        body: TaskBody,
    ) {
        let node = self.completion.alloc(parent_node);
        lock(&self.queue).tasks.push(Some(Task {
            name,
            level,
            node,
            parent,
            body,
        }));
    }

    /// Claim the next unclaimed task by index. The queue is never trimmed,
    /// so indices stay stable while tasks keep arriving.
    fn claim(&self) -> Option<Task> {
        let mut queue = lock(&self.queue);
        if queue.next < queue.tasks.len() {
            let next = queue.next;
            let task = queue.tasks[next].take();
            queue.next += 1;
            task
        } else {
            None
        }
    }

    /// Spawn the workers and block until the completion tree reports the
    /// whole run done, including tasks submitted after this call started.
    pub(crate) fn run_until_drained(self: &Arc<Self>) {
        let workers: Vec<_> = (0..self.workers)
            .map(|_| {
                let pool = Arc::clone(self);
                thread::spawn(move || worker_loop(pool))
            })
            .collect();
        while !self.completion.is_done(CompletionTree::ROOT) {
            thread::sleep(POLL_INTERVAL);
        }
        for worker in workers {
            let _ = worker.join();
        }
    }
}

fn worker_loop(pool: Arc<ThreadPool>) {
    loop {
        match pool.claim() {
            Some(task) => run_task(&pool, task),
            None => {
                if pool.completion.is_done(CompletionTree::ROOT) {
                    return;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn run_task(pool: &Arc<ThreadPool>, task: Task) {
    let cell = Arc::new(SetCell::new(task.name, task.level));
    let mut handle = TestHandle::pooled(task.level, Arc::clone(&cell), Arc::clone(pool), task.node);
    let started = Instant::now();
    let body = task.body;
    if let Some(error) = runner::run_guarded(|| body(&mut handle)) {
        cell.push_node(ResultNode::UncaughtError(error));
    }
    cell.set_duration(started.elapsed());
    // Attach to the parent before marking done, so a drain that observes the
    // root as done always finds every result in place.
    task.parent.push_set(Arc::clone(&cell));
    pool.completion.mark_body_done(task.node);
}

/// Run all registered test actions across the pool and return the frozen
/// run root.
pub(crate) fn run_tests(entries: Vec<Entry<TestAction>>, config: &Config) -> ResultSet {
    let pool = ThreadPool::new(config.threads.max(1), config.parallel_subs);
    let root = Arc::new(SetCell::new("", 0));
    for entry in entries {
        pool.submit(
            entry.name,
            1,
            CompletionTree::ROOT,
            Arc::clone(&root),
            Box::new(entry.action),
        );
    }
    pool.run_until_drained();
    root.freeze()
}
