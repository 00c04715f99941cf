// Copyright (c) 2017-2021 Fabian Schuiki

//! Header emission
//!
//! Turns the hierarchical names collected during declaration into nested
//! `$scope`/`$upscope` blocks with one `$var` line per signal.

use std::collections::BTreeMap;

/// Emit the scope and variable definitions of a header.
///
/// `names` maps hierarchical names (scopes separated by spaces, a tab before
/// the signal name) to `$var` lines. Every emitted line is passed to `out`,
/// including its trailing newline. If any signal has no enclosing scope, all
/// signals are wrapped in a `top` scope, since viewers reject variables
/// outside of a scope.
pub fn write_scopes(names: &BTreeMap<String, String>, out: &mut dyn FnMut(&str)) {
    let null_scope = names.keys().any(|k| k.starts_with('\t'));
    let mut printer = ScopePrinter { depth: 0, out };

    printer.line(1, "\n");
    let mut last: Vec<String> = Vec::new();
    for (hier_name, decl) in names {
        let scope_part = hier_name.split('\t').next().unwrap_or("");
        let mut scopes: Vec<String> = Vec::new();
        if null_scope {
            scopes.push("top".to_owned());
        }
        scopes.extend(
            scope_part
                .split(' ')
                .filter(|s| !s.is_empty())
                .map(scope_name),
        );

        // Leave the scopes not shared with the previous signal, then enter
        // the new ones.
        let common = last
            .iter()
            .zip(scopes.iter())
            .take_while(|(a, b)| a == b)
            .count();
        for _ in common..last.len() {
            printer.line(-1, "$upscope $end\n");
        }
        for scope in &scopes[common..] {
            printer.line(1, &format!("$scope module {} $end\n", scope));
        }
        printer.line(0, decl);
        last = scopes;
    }
    for _ in 0..last.len() {
        printer.line(-1, "$upscope $end\n");
    }
    printer.line(-1, "$enddefinitions $end\n\n\n");
    debug_assert_eq!(printer.depth, 0);
}

/// Render a scope name for VCD, which does not allow brackets in scopes.
fn scope_name(name: &str) -> String {
    name.chars()
        .filter(|&c| c != '\x0c')
        .map(|c| match c {
            '[' => '(',
            ']' => ')',
            c => c,
        })
        .collect()
}

struct ScopePrinter<'a> {
    depth: usize,
    out: &'a mut dyn FnMut(&str),
}

impl ScopePrinter<'_> {
    /// Print a line indented by the nesting depth. Leaving a scope dedents
    /// before the line, entering one indents after it.
    fn line(&mut self, depth_change: isize, text: &str) {
        if depth_change < 0 {
            self.depth -= (-depth_change) as usize;
        }
        let indented = format!("{:indent$}{}", "", text, indent = self.depth);
        (self.out)(&indented);
        if depth_change > 0 {
            self.depth += depth_change as usize;
        }
    }
}
