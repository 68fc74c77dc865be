//! Reading and printing the finished result tree.
//!
//! Everything here is built on the single-level [`ResultSet::children`]
//! contract: the recursive visitors walk sets lazily, and the default
//! printer renders the tree with colored BEGIN/PASS/FAIL banners. Printing
//! is presentation only; nothing in this module mutates results.

use std::io::Write;
use std::time::Duration;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::config::Config;
use crate::results::{AssertionResult, ResultNode, ResultSet, UncaughtErrorResult};

// =============================================================================
// TRAVERSAL
// =============================================================================

/// Visit every test and sub-test set below `data`, depth first.
pub fn visit_sets<F: FnMut(&ResultSet)>(data: &ResultSet, func: &mut F) {
    for child in data.children() {
        if let ResultNode::Set(set) = child {
            func(set);
            visit_sets(set, func);
        }
    }
}

/// Visit every failed test and sub-test set below `data`, depth first.
/// A passing subtree is skipped whole; it cannot contain failures.
pub fn visit_failed_sets<F: FnMut(&ResultSet)>(data: &ResultSet, func: &mut F) {
    for child in data.children() {
        if let ResultNode::Set(set) = child {
            if set.failed() {
                func(set);
                visit_failed_sets(set, func);
            }
        }
    }
}

/// Fraction of passing top-level tests, in `[0, 1]`. An empty run passes.
pub fn pass_rate(data: &ResultSet) -> f64 {
    let total = data.children().count();
    if total == 0 {
        return 1.0;
    }
    let failed = data.children().filter(|child| child.failed()).count();
    1.0 - failed as f64 / total as f64
}

/// Mean duration of the top-level tests, in milliseconds.
pub fn average_time_ms(data: &ResultSet) -> f64 {
    let total = data.children().count();
    if total == 0 {
        return 0.0;
    }
    let sum: f64 = data
        .children()
        .filter_map(|child| match child {
            ResultNode::Set(set) => Some(millis(set.duration())),
            _ => None,
        })
        .sum();
    sum / total as f64
}

// =============================================================================
// PREBUILT REPORT PIECES
// =============================================================================

/// List every failed test and sub-test, indented by nesting depth.
pub fn report_failed_tests(data: &ResultSet) {
    println!("Failed tests:");
    visit_failed_sets(data, &mut |set| {
        println!("{} * {}", indent(set.depth()), set.name());
    });
}

/// Print the pass rate over top-level tests with colored counters.
pub fn report_pass_rate(data: &ResultSet) {
    let total = data.children().count();
    let failed = data.children().filter(|child| child.failed()).count();
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = write!(stdout, "Pass rate: {}% ", pass_rate(data) * 100.0);
    label(&mut stdout, Color::Red, &format!(" {failed} failed "));
    label(&mut stdout, Color::Green, &format!(" {} passed ", total - failed));
    label(&mut stdout, Color::Blue, &format!(" {total} total "));
    let _ = writeln!(stdout);
}

/// Print the mean top-level test duration.
pub fn report_average_time(data: &ResultSet) {
    println!("Average time: {:.3} ms", average_time_ms(data));
}

// =============================================================================
// DEFAULT TREE PRINTER
// =============================================================================

/// Print the whole run below `root` as an indented tree.
pub fn print_tree(root: &ResultSet, config: &Config) {
    let mut stdout = stream(config);
    for child in root.children() {
        print_node(&mut stdout, child);
    }
}

pub(crate) fn print_report_frame_open() {
    println!("------------------------------");
    println!("# Final report:");
}

pub(crate) fn print_report_frame_close() {
    println!("------------------------------");
}

/// Print the end-of-run verdict plus total wall-clock time.
pub(crate) fn print_final_banner(root: &ResultSet, total: Duration, config: &Config) {
    let mut stdout = stream(config);
    if root.failed() {
        label(&mut stdout, Color::Red, " ✕ FAILED ✕ ");
    } else {
        label(&mut stdout, Color::Green, " ✓ SUCCEEDED ✓ ");
    }
    label(&mut stdout, Color::Blue, &format!(" {:.3} ms used ", millis(total)));
    let _ = writeln!(stdout);
    let _ = writeln!(stdout);
}

fn stream(config: &Config) -> StandardStream {
    let choice = if config.color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

fn print_node(out: &mut StandardStream, node: &ResultNode) {
    match node {
        ResultNode::Set(set) => print_set(out, set),
        ResultNode::Assertion(req) => print_assertion(out, req),
        ResultNode::UncaughtError(err) => print_uncaught(out, err),
    }
}

fn print_set(out: &mut StandardStream, set: &ResultSet) {
    let pad = indent(set.depth());
    let _ = write!(out, "{pad}");
    label(out, Color::Blue, " BEGIN ");
    let _ = writeln!(out, " {}", set.name());
    for child in set.children() {
        print_node(out, child);
    }
    let _ = write!(out, "{pad}");
    if set.failed() {
        label(out, Color::Red, " FAIL  ");
    } else {
        label(out, Color::Green, " PASS  ");
    }
    let _ = writeln!(out, " {} {:.3} ms", set.name(), millis(set.duration()));
}

// Passing assertions stay silent; only failures earn a line.
fn print_assertion(out: &mut StandardStream, req: &AssertionResult) {
    if !req.failed() {
        return;
    }
    let pad = indent(req.depth());
    let _ = write!(out, "{pad}");
    label(out, Color::Red, " FAIL  ");
    let _ = writeln!(out, " {}: REQ [{}] failed", req.location(), req.expression());
    let op_gap = " ".repeat(req.operator().len());
    let _ = writeln!(out, "{pad}    ├───── ACTUAL: {op_gap} {}", req.actual());
    let _ = writeln!(out, "{pad}    └─── EXPECTED: {} {}", req.operator(), req.expected());
}

fn print_uncaught(out: &mut StandardStream, err: &UncaughtErrorResult) {
    let _ = write!(out, "{}", indent(err.depth()));
    label(out, Color::Red, " ERROR ");
    let site = err
        .location()
        .map(ToString::to_string)
        .unwrap_or_else(|| "<unknown>".to_string());
    let _ = writeln!(out, " {site}: uncaught error [{}]", err.message());
}

fn label(out: &mut StandardStream, color: Color, text: &str) {
    let _ = out.set_color(ColorSpec::new().set_bg(Some(color)).set_fg(Some(Color::Black)));
    let _ = write!(out, "{text}");
    let _ = out.reset();
}

// Three spaces per level below the global tests; a tab can be too wide.
fn indent(depth: u32) -> String {
    "   ".repeat(depth.saturating_sub(1) as usize)
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
