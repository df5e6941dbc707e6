// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Generation of [Cucumber Expressions][1] out of literal step text, used for
//! snippet suggestions.
//!
//! [1]: https://github.com/cucumber/cucumber-expressions

use std::collections::HashMap;

use itertools::Itertools as _;
use regex::Regex;

use crate::parameter::{ParameterRegistry, ParameterType};

/// Upper bound of generated combinations for a single text.
const MAX_COMBINATIONS: usize = 256;

/// Expression suggested for a literal step text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeneratedExpression {
    /// Source of the suggested [Cucumber Expression][1].
    ///
    /// [1]: https://github.com/cucumber/cucumber-expressions
    pub source: String,

    /// Argument names for the parameters, in order (`int`, `int2`...).
    pub parameter_names: Vec<String>,
}

/// Occurrence of a [`ParameterType`] in the text.
#[derive(Clone, Copy, Debug)]
struct Occurrence {
    start: usize,
    end: usize,
}

/// Finds the first full-word occurrence of `regex` at or after `from`.
fn find_from(regex: &Regex, text: &str, mut from: usize) -> Option<Occurrence> {
    let is_boundary = |c: char| c.is_whitespace() || c.is_ascii_punctuation();

    while from <= text.len() {
        let m = regex.find_at(text, from)?;
        let starts_word =
            text[..m.start()].chars().next_back().map_or(true, is_boundary);
        let ends_word =
            text[m.end()..].chars().next().map_or(true, is_boundary);
        if !m.is_empty() && starts_word && ends_word {
            return Some(Occurrence { start: m.start(), end: m.end() });
        }
        from = m.start()
            + text[m.start()..].chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// Escapes characters of literal text having a meaning in expressions.
fn escape(text: &str) -> String {
    text.replace('(', "\\(").replace('{', "\\{").replace('/', "\\/")
}

/// Generalizes the literal `text` against the snippet [`ParameterType`]s of
/// the `parameters` registry.
///
/// Scanning left to right, the earliest full-word match wins, the longest one
/// on ties. [`ParameterType`]s matching the very same span yield alternative
/// expressions, in registration order.
#[must_use]
pub fn generate_expressions(
    text: &str,
    parameters: &ParameterRegistry,
) -> Vec<GeneratedExpression> {
    let matchers = parameters
        .snippet_types()
        .filter_map(|ty| {
            Regex::new(&format!("(?:{})", ty.regexp())).ok().map(|re| (ty, re))
        })
        .collect::<Vec<_>>();

    let mut literals = Vec::<&str>::new();
    let mut slots = Vec::<Vec<&ParameterType>>::new();
    let mut pos = 0;
    loop {
        let found = matchers
            .iter()
            .filter_map(|(ty, re)| find_from(re, text, pos).map(|o| (*ty, o)))
            .collect::<Vec<_>>();
        let Some(best) = found
            .iter()
            .map(|(_, o)| *o)
            .min_by_key(|o| (o.start, usize::MAX - (o.end - o.start)))
        else {
            break;
        };

        literals.push(&text[pos..best.start]);
        slots.push(
            found
                .iter()
                .filter(|(_, o)| o.start == best.start && o.end == best.end)
                .map(|(ty, _)| *ty)
                .collect(),
        );
        pos = best.end;
    }
    literals.push(&text[pos..]);

    slots
        .iter()
        .map(|tys| tys.iter().copied())
        .multi_cartesian_product()
        .take(MAX_COMBINATIONS)
        .map(|combination| build(&literals, &combination))
        .pad_using(1, |_| build(&literals, &[]))
        .collect()
}

fn build(literals: &[&str], types: &[&ParameterType]) -> GeneratedExpression {
    let mut source = String::new();
    let mut parameter_names = Vec::with_capacity(types.len());
    let mut usage = HashMap::<&str, usize>::new();

    for (i, literal) in literals.iter().enumerate() {
        source.push_str(&escape(literal));
        if let Some(ty) = types.get(i) {
            source.push('{');
            source.push_str(ty.name());
            source.push('}');

            let count = usage.entry(ty.name()).or_default();
            *count += 1;
            parameter_names.push(if *count == 1 {
                ty.name().to_owned()
            } else {
                format!("{}{count}", ty.name())
            });
        }
    }

    GeneratedExpression { source, parameter_names }
}

#[cfg(test)]
mod tests {
    use crate::parameter::ParameterRegistry;

    use super::generate_expressions;

    fn sources(text: &str) -> Vec<String> {
        generate_expressions(text, &ParameterRegistry::new())
            .into_iter()
            .map(|e| e.source)
            .collect()
    }

    #[test]
    fn literal_text_stays() {
        assert_eq!(sources("I open the page"), ["I open the page"]);
    }

    #[test]
    fn numbers_yield_alternatives() {
        assert_eq!(sources("a is 1"), ["a is {int}", "a is {float}"]);
        assert_eq!(sources("pi is 3.14"), ["pi is {float}"]);
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(
            sources(r#"I type "hello" in (the) box/field"#),
            [r#"I type {string} in \(the) box\/field"#],
        );
    }

    #[test]
    fn partial_words_are_ignored() {
        assert_eq!(sources("see page2"), ["see page2"]);
    }

    #[test]
    fn names_are_numbered() {
        let generated =
            generate_expressions(r#""a" and "b""#, &ParameterRegistry::new());

        assert_eq!(generated.len(), 1);
        assert_eq!(generated[0].source, "{string} and {string}");
        assert_eq!(generated[0].parameter_names, ["string", "string2"]);
    }
}
