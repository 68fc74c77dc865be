//! The hierarchical result model.
//!
//! Every outcome a run produces is a [`ResultNode`]: a closed set of variants
//! over composite test sets ([`ResultSet`]), single assertion evaluations
//! ([`AssertionResult`]), and panics that escaped a test body
//! ([`UncaughtErrorResult`]). Sets exclusively own their children, so the
//! whole run forms a tree rooted at an anonymous depth-0 set.
//!
//! Failure aggregation is strictly bottom-up and monotonic: [`ResultSet::add`]
//! ORs the child's failed flag into the parent, and once a subtree reports
//! failed no later child can clear it. Depth is a presentation aid only
//! (1 for global tests, +1 per nesting level); it carries no semantics.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

// =============================================================================
// SOURCE LOCATIONS
// =============================================================================

/// A file/line pair identifying where an assertion or panic happened.
///
/// Assertion macros build these from `file!()`/`line!()`; the panic hook
/// builds them from the panic site, which is why the file is a `Cow` rather
/// than a plain `&'static str`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    file: Cow<'static, str>,
    line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<Cow<'static, str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

// =============================================================================
// RESULT NODES
// =============================================================================

/// One outcome in the result tree.
#[derive(Debug)]
pub enum ResultNode {
    /// A finished test or sub-test with its children.
    Set(ResultSet),
    /// A single assertion evaluation.
    Assertion(AssertionResult),
    /// A panic that escaped a test body.
    UncaughtError(UncaughtErrorResult),
}

impl ResultNode {
    /// Whether this node (or, for sets, any of its descendants) failed.
    pub fn failed(&self) -> bool {
        match self {
            ResultNode::Set(set) => set.failed(),
            ResultNode::Assertion(req) => req.failed(),
            ResultNode::UncaughtError(_) => true,
        }
    }

    /// Nesting depth, assigned by the owning set when the node is attached.
    pub fn depth(&self) -> u32 {
        match self {
            ResultNode::Set(set) => set.depth,
            ResultNode::Assertion(req) => req.depth,
            ResultNode::UncaughtError(err) => err.depth,
        }
    }

    pub(crate) fn set_depth(&mut self, depth: u32) {
        match self {
            // A set's own children were already numbered relative to its
            // level at construction time, so only the set itself moves.
            ResultNode::Set(set) => set.depth = depth,
            ResultNode::Assertion(req) => req.depth = depth,
            ResultNode::UncaughtError(err) => err.depth = depth,
        }
    }
}

// =============================================================================
// RESULT SETS
// =============================================================================

/// Composite node for one test, sub-test, or the run root.
///
/// Created when a test begins execution, grown as assertions and sub-tests
/// complete, and sealed by [`ResultSet::finalize`]. Reporting code must only
/// read a set after finalization; this is a documented contract, not a
/// compile-time guarantee.
#[derive(Debug)]
pub struct ResultSet {
    name: &'static str,
    depth: u32,
    failed: bool,
    duration: Duration,
    children: Vec<ResultNode>,
}

impl ResultSet {
    /// Create an empty set at the given nesting level (0 for the run root,
    /// 1 for global tests, parent + 1 for sub-tests).
    pub fn new(name: &'static str, depth: u32) -> Self {
        Self {
            name,
            depth,
            failed: false,
            duration: Duration::ZERO,
            children: Vec::new(),
        }
    }

    /// Append a child, numbering it one level below this set and folding its
    /// failed flag into the aggregate.
    ///
    /// The aggregation invariant holds after every call: `self.failed()` is
    /// the OR over all direct children. No child outcome depends on sibling
    /// order.
    pub fn add(&mut self, mut child: ResultNode) {
        child.set_depth(self.depth + 1);
        self.failed |= child.failed();
        self.children.push(child);
    }

    /// Stamp the wall-clock duration of the test body plus its synchronous
    /// sub-tests. After this call the set is considered immutable.
    pub fn finalize(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Single-level traversal over direct children, in insertion order.
    ///
    /// Recursive walks (see [`crate::report`]) are built on top of this;
    /// the iteration itself is restartable and side-effect free.
    pub fn children(&self) -> std::slice::Iter<'_, ResultNode> {
        self.children.iter()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

// =============================================================================
// LEAF NODES
// =============================================================================

/// Leaf node recording one assertion evaluation. Immutable after creation.
#[derive(Debug)]
pub struct AssertionResult {
    location: SourceLocation,
    actual: String,
    expected: String,
    actual_type: &'static str,
    expected_type: &'static str,
    operator: &'static str,
    expression: &'static str,
    failed: bool,
    depth: u32,
}

impl AssertionResult {
    /// Build an assertion record. Normally invoked by the [`req!`] macro,
    /// which stringifies both sides exactly once.
    ///
    /// [`req!`]: crate::req
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        location: SourceLocation,
        actual: String,
        expected: String,
        actual_type: &'static str,
        expected_type: &'static str,
        operator: &'static str,
        expression: &'static str,
        failed: bool,
    ) -> Self {
        Self {
            location,
            actual,
            expected,
            actual_type,
            expected_type,
            operator,
            expression,
            failed,
            depth: 0,
        }
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// The actual value, rendered with `Debug` at evaluation time.
    pub fn actual(&self) -> &str {
        &self.actual
    }

    /// The expected value, rendered with `Debug` at evaluation time.
    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn actual_type(&self) -> &'static str {
        self.actual_type
    }

    pub fn expected_type(&self) -> &'static str {
        self.expected_type
    }

    pub fn operator(&self) -> &'static str {
        self.operator
    }

    /// The literal source expression, e.g. `a == b`.
    pub fn expression(&self) -> &'static str {
        self.expression
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// Leaf node recording a panic that escaped a test body. Always failed.
#[derive(Debug)]
pub struct UncaughtErrorResult {
    location: Option<SourceLocation>,
    message: String,
    depth: u32,
}

impl UncaughtErrorResult {
    pub fn new(location: Option<SourceLocation>, message: String) -> Self {
        Self {
            location,
            message,
            depth: 0,
        }
    }

    /// The panic site, when the hook managed to capture one.
    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}
