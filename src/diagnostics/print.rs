// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Human-readable rendering of a [`DiagnosticResult`].

use std::io::{self, Write};

use console::{measure_text_width, Style};
use itertools::Itertools as _;

use crate::step::Location;

use super::{DiagnosticResult, UnmatchedStep};

/// Suggested implementation of an unmatched step.
const SNIPPET: &str = "\
steps.define_step(\"[expression]\", |world, ctx| {
    // [arguments]
    async { Ok(Outcome::Pending) }.boxed_local()
})?;";

fn error_label() -> String {
    Style::new().red().apply_to("Error").to_string()
}

fn location(loc: Option<&Location>) -> String {
    loc.map_or_else(
        || "unknown location".to_owned(),
        |l| format!("{}:{}", l.path, l.line),
    )
}

fn list<'i>(items: impl IntoIterator<Item = &'i String>) -> String {
    items.into_iter().map(|i| format!("  - {i}")).join("\n")
}

/// Prints the whole report: the usage table, then every ambiguous and
/// unmatched step, or `No problems found.` if there are none.
///
/// # Errors
///
/// If writing into the `out` fails.
pub fn report(
    out: &mut dyn Write,
    result: &DiagnosticResult,
) -> io::Result<()> {
    print_definitions_usage(out, result)?;
    writeln!(out)?;

    if !result.ambiguous_steps.is_empty() {
        print_ambiguous_steps(out, result)?;
        writeln!(out)?;
    }
    if !result.unmatched_steps.is_empty() {
        print_unmatched_steps(out, result)?;
    }
    if !result.has_problems() {
        writeln!(out, "No problems found.")?;
    }
    Ok(())
}

/// Prints a table of every definition along with the steps using it,
/// grouped by the definition's file.
///
/// # Errors
///
/// If writing into the `out` fails.
pub fn print_definitions_usage(
    out: &mut dyn Write,
    result: &DiagnosticResult,
) -> io::Result<()> {
    let unused = Style::new().yellow().apply_to("unused").to_string();
    let rows = result
        .definitions_usage
        .iter()
        .sorted_by(|(a, _), (b, _)| {
            let path = |l: &Option<Location>| {
                l.as_ref().map(|l| l.path.clone())
            };
            path(&a.location).cmp(&path(&b.location))
        })
        .map(|(def, steps)| {
            let pattern = if steps.is_empty() {
                format!("{} ({unused})", def.expression)
            } else {
                def.expression.clone()
            };
            let left = std::iter::once(pattern)
                .chain(steps.iter().map(|s| format!("  {}", s.text)))
                .join("\n");
            let right = std::iter::once(location(def.location.as_ref()))
                .chain(steps.iter().map(|s| format!("{}:{}", s.source, s.line)))
                .join("\n");
            [left, right]
        })
        .collect::<Vec<_>>();

    writeln!(out, "{}", table(["Pattern / Text", "Location"], &rows))
}

/// Prints every step matched by several definitions.
///
/// # Errors
///
/// If writing into the `out` fails.
pub fn print_ambiguous_steps(
    out: &mut dyn Write,
    result: &DiagnosticResult,
) -> io::Result<()> {
    for ambiguous in &result.ambiguous_steps {
        let step = &ambiguous.step;
        writeln!(
            out,
            "{}: Multiple matching step definitions at {}:{} for\n\
             \n  {}\n\
             \nStep matched the following definitions:\n",
            error_label(),
            step.source,
            step.line,
            step.text,
        )?;
        for def in &ambiguous.definitions {
            writeln!(
                out,
                "  - {} ({})",
                def.expression,
                location(def.location.as_ref()),
            )?;
        }
    }
    Ok(())
}

/// Prints every step without a definition, along with where definitions
/// were searched for and suggested implementations.
///
/// # Errors
///
/// If writing into the `out` fails.
pub fn print_unmatched_steps(
    out: &mut dyn Write,
    result: &DiagnosticResult,
) -> io::Result<()> {
    for unmatched in &result.unmatched_steps {
        let UnmatchedStep { step, hints, .. } = unmatched;
        writeln!(
            out,
            "{}: Step implementation missing at {}:{}\n\
             \n  {}\n\
             \nWe tried searching for files containing step definitions \
             using the following search pattern template(s):\n\
             \n{}\n\
             \nThese templates resolved to the following search pattern(s):\n\
             \n{}\n",
            error_label(),
            step.source,
            step.line,
            step.text,
            list(&hints.step_definitions),
            list(&hints.step_definition_patterns),
        )?;

        if hints.step_definition_paths.is_empty() {
            writeln!(
                out,
                "These patterns matched *no files* containing step \
                 definitions. This almost certainly means that you have \
                 misconfigured `stepDefinitions`. Alternatively, you can \
                 implement it using the suggestion(s) below.",
            )?;
        } else {
            writeln!(
                out,
                "These patterns matched the following file(s):\n\
                 \n{}\n\
                 \nHowever, none of these files contained a matching step \
                 definition. You can implement it using the suggestion(s) \
                 below.",
                list(&hints.step_definition_paths),
            )?;
        }

        for snippet in snippets(unmatched) {
            let indented =
                snippet.lines().map(|l| format!("  {l}")).join("\n");
            writeln!(out, "\n{indented}")?;
        }
    }
    Ok(())
}

/// Suggested step definitions of the `unmatched` step.
fn snippets(unmatched: &UnmatchedStep) -> Vec<String> {
    unmatched
        .suggestions
        .iter()
        .map(|generated| {
            let expression = generated
                .source
                .replace('\\', "\\\\")
                .replace('"', "\\\"");
            let arguments = generated
                .parameter_names
                .iter()
                .map(String::as_str)
                .chain(unmatched.argument.map(|a| a.name()))
                .join(", ");
            let snippet = SNIPPET.replace("[expression]", &expression);
            if arguments.is_empty() {
                snippet
                    .lines()
                    .filter(|l| !l.contains("[arguments]"))
                    .join("\n")
            } else {
                let arguments = format!("Arguments: {arguments}.");
                snippet.replace("[arguments]", &arguments)
            }
        })
        .collect()
}

/// Renders a bordered table with multi-line cells.
fn table<const N: usize>(head: [&str; N], rows: &[[String; N]]) -> String {
    let mut widths = head.map(measure_text_width);
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = cell.lines().map(measure_text_width).fold(*w, usize::max);
        }
    }

    let border = |l: &str, m: &str, r: &str| {
        format!("{l}{}{r}", widths.iter().map(|w| "─".repeat(w + 2)).join(m))
    };
    let line = |cells: [&str; N]| {
        let cells = cells.iter().zip(&widths).map(|(c, w)| {
            format!(" {c}{} ", " ".repeat(w - measure_text_width(c)))
        });
        format!("│{}│", cells.format("│"))
    };

    let mut out = vec![border("┌", "┬", "┐"), line(head)];
    for row in rows {
        out.push(border("├", "┼", "┤"));
        let height =
            row.iter().map(|c| c.lines().count()).max().unwrap_or(1).max(1);
        for i in 0..height {
            out.push(line(std::array::from_fn(|n| {
                row[n].lines().nth(i).unwrap_or("")
            })));
        }
    }
    out.push(border("└", "┴", "┘"));
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use crate::{
        diagnostics::{
            AmbiguousStep, ArgumentKind, DefinitionKey, DiagnosticResult,
            DiagnosticStep, UnmatchedStep,
        },
        expression::GeneratedExpression,
        step::Location,
        step_definitions::StepDefinitionHints,
    };

    use super::{report, snippets, table};

    fn render(result: &DiagnosticResult) -> String {
        let mut out = vec![];
        report(&mut out, result).unwrap();
        console::strip_ansi_codes(&String::from_utf8(out).unwrap()).into_owned()
    }

    fn step(text: &str) -> DiagnosticStep {
        DiagnosticStep {
            source: "a.feature".into(),
            line: 3,
            text: text.into(),
        }
    }

    fn key(expr: &str, line: u32) -> DefinitionKey {
        DefinitionKey {
            expression: format!("{expr:?}"),
            location: Some(Location::new("steps.rs", line, 5)),
        }
    }

    #[test]
    fn table_fits_widest_cell() {
        let rendered = table(["A", "B"], &[["x\nlonger".into(), "1".into()]]);

        assert_eq!(
            rendered,
            "┌────────┬───┐\n\
             │ A      │ B │\n\
             ├────────┼───┤\n\
             │ x      │ 1 │\n\
             │ longer │   │\n\
             └────────┴───┘",
        );
    }

    #[test]
    fn clean_result_has_no_problems() {
        let mut result = DiagnosticResult::default();
        drop(
            result
                .definitions_usage
                .insert(key("a step", 1), vec![step("a step")]),
        );

        let out = render(&result);

        let row = |loc: &str| {
            out.lines().find(|l| l.contains(loc)).unwrap_or_default()
        };
        assert!(row("steps.rs:1").starts_with("│ \"a step\" "), "{out}");
        assert!(row("a.feature:3").starts_with("│   a step "), "{out}");
        assert!(out.ends_with("No problems found.\n"), "{out}");
    }

    #[test]
    fn unused_and_ambiguous_definitions() {
        let mut result = DiagnosticResult::default();
        drop(result.definitions_usage.insert(key("a step", 1), vec![]));
        drop(result.definitions_usage.insert(key("a {word}", 2), vec![]));
        result.ambiguous_steps.push(AmbiguousStep {
            step: step("a step"),
            definitions: vec![key("a step", 1), key("a {word}", 2)],
        });

        let out = render(&result);

        assert!(out.contains("\"a step\" (unused)"), "{out}");
        assert!(out.contains(
            "Error: Multiple matching step definitions at a.feature:3 for\n\
             \n  a step\n\
             \nStep matched the following definitions:\n\
             \n  - \"a step\" (steps.rs:1)\n  - \"a {word}\" (steps.rs:2)\n",
        ), "{out}");
        assert!(!out.contains("No problems found."));
    }

    #[test]
    fn unmatched_step_suggests_snippets() {
        let unmatched = UnmatchedStep {
            step: step("I have 5 \"red\" cukes"),
            argument: Some(ArgumentKind::DataTable),
            hints: StepDefinitionHints {
                step_definitions: vec!["[filepath].rs".into()],
                step_definition_patterns: vec!["a.rs".into()],
                step_definition_paths: vec![],
            },
            suggestions: vec![GeneratedExpression {
                source: "I have {int} {string} cukes".into(),
                parameter_names: vec!["int".into(), "string".into()],
            }],
        };

        assert_eq!(
            snippets(&unmatched),
            ["steps.define_step(\"I have {int} {string} cukes\", \
              |world, ctx| {\n    \
              // Arguments: int, string, dataTable.\n    \
              async { Ok(Outcome::Pending) }.boxed_local()\n\
              })?;"],
        );

        let mut result = DiagnosticResult::default();
        result.unmatched_steps.push(unmatched);
        let out = render(&result);

        assert!(
            out.contains("Error: Step implementation missing at a.feature:3"),
            "{out}",
        );
        assert!(out.contains("matched *no files* containing step"), "{out}");
        assert!(out.contains("\n  steps.define_step(\"I have {int}"), "{out}");
    }
}
