// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Actionable message of a step without a definition.

use std::fmt::Write as _;

use crate::step_definitions::StepDefinitionHints;

/// Signature of a missing step definition, as searched in failure messages.
pub const MISSING_SIGNATURE: &str = "Step implementation missing";

/// Explains where definitions of the step `text` were searched for.
///
/// In `interactive` mode the first `*` of every listed item is escaped, so
/// that markdown-rendering runners don't swallow it.
pub(crate) fn message(
    text: &str,
    hints: &StepDefinitionHints,
    interactive: bool,
) -> String {
    let list = |items: &[String]| {
        items
            .iter()
            .map(|item| {
                if interactive {
                    format!("  - {}", item.replacen('*', "\\*", 1))
                } else {
                    format!("  - {item}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut out = format!(
        "{MISSING_SIGNATURE} for \"{text}\".\n\
         \n\
         We tried searching for files containing step definitions using the \
         following search pattern templates:\n\
         \n\
         {}\n\
         \n\
         These templates resolved to the following search patterns:\n\
         \n\
         {}\n\
         \n",
        list(&hints.step_definitions),
        list(&hints.step_definition_patterns),
    );

    if hints.step_definition_paths.is_empty() {
        out.push_str(
            "These patterns matched **no files** containing step definitions. \
             This almost certainly means that you have misconfigured \
             `stepDefinitions`.",
        );
    } else {
        _ = write!(
            out,
            "These patterns matched the following files:\n\
             \n\
             {}\n\
             \n\
             However, none of these files contained a step definition \
             matching \"{text}\".",
            list(&hints.step_definition_paths),
        );
    }
    out
}
