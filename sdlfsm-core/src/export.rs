//! Graphviz export of a process graph.

use crate::action::Action;
use crate::connector::Links;
use crate::process::Process;
use std::fmt::Write;

/// Escapes a label for a double-quoted DOT string.
fn escape(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// Renders states, handlers and the connector graph of `process` as DOT.
///
/// Node ids are stable for a given construction order: `START`,
/// `STATE_<id>`, `HANDLER_<id>` and `AC_<id>`.
pub fn to_dot(process: &Process) -> String {
    let names = process.names();
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "digraph process_{} {{", process.id());
    let _ = writeln!(out, "  rankdir=TB;");
    let _ = writeln!(out, "  node [fontname=\"monospace\"];");

    if let Some(start) = process.start_connector() {
        let _ = writeln!(out, "  START [shape=circle, label=\"start\"];");
        let _ = writeln!(out, "  START -> AC_{};", start);
    }

    for state in process.states() {
        let peripheries = if process.initial_state() == Some(state.id()) { 2 } else { 1 };
        let _ = writeln!(
            out,
            "  STATE_{} [shape=box, style=rounded, peripheries={}, label=\"{}\"];",
            state.id(),
            peripheries,
            escape(state.name())
        );
    }

    for handler in process.signal_handlers() {
        let _ = writeln!(
            out,
            "  HANDLER_{} [shape=cds, label=\"{}\"];",
            handler.id(),
            escape(handler.signal())
        );
        let _ = writeln!(out, "  STATE_{} -> HANDLER_{};", handler.state_id(), handler.id());
        if let Some(first) = handler.first_action() {
            let _ = writeln!(out, "  HANDLER_{} -> AC_{};", handler.id(), first);
        }
    }

    for connector in process.connectors() {
        let action = connector.action();
        let is_condition = matches!(action, Action::Condition { .. });
        let shape = if connector.is_switch() || is_condition {
            "diamond"
        } else {
            "box"
        };
        let _ = writeln!(
            out,
            "  AC_{} [shape={}, label=\"{}\"];",
            connector.id(),
            shape,
            escape(&action.label(names))
        );

        match connector.links() {
            Links::Linear { next, alt_next } => {
                let (next_label, alt_label) = if is_condition {
                    (" [label=\"true\"]", " [label=\"false\"]")
                } else {
                    ("", "")
                };
                if let Some(next) = next {
                    let _ = writeln!(out, "  AC_{} -> AC_{}{};", connector.id(), next, next_label);
                }
                if let Some(alt) = alt_next {
                    let _ = writeln!(out, "  AC_{} -> AC_{}{};", connector.id(), alt, alt_label);
                }
            }
            Links::Switch { default, cases } => {
                for (index, case) in cases.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "  AC_{} -> AC_{} [label=\"case {}\"];",
                        connector.id(),
                        case,
                        index + 1
                    );
                }
                if let Some(default) = default {
                    let _ = writeln!(
                        out,
                        "  AC_{} -> AC_{} [label=\"default\"];",
                        connector.id(),
                        default
                    );
                }
            }
        }

        if let Action::NextState { state_id } = action {
            let _ = writeln!(out, "  AC_{} -> STATE_{} [style=dashed];", connector.id(), state_id);
        }
    }

    let memory = process.memory();
    let mut decls = Vec::new();
    for c in memory.constants() {
        decls.push(format!("const {} : {} = {}", c.name(), c.data_type(), c.value()));
    }
    for v in memory.variables() {
        decls.push(format!("var {} : {} = {}", v.name(), v.data_type(), v.value()));
    }
    for t in process.timers() {
        decls.push(format!("timer {}", t.name()));
    }
    if !decls.is_empty() {
        let label: Vec<String> = decls.iter().map(|d| escape(d)).collect();
        let _ = writeln!(
            out,
            "  DECLARATIONS [shape=note, label=\"{}\\l\"];",
            label.join("\\l")
        );
    }

    out.push_str("}\n");
    out
}
