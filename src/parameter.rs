// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [Parameter types][1] of [Cucumber Expressions][2].
//!
//! [1]: https://github.com/cucumber/cucumber-expressions#parameter-types
//! [2]: https://github.com/cucumber/cucumber-expressions

use std::{any::Any, fmt, rc::Rc, str::FromStr};

use derive_more::{Display, Error};
use regex::Regex;

/// Converts the matched text of a parameter into its typed value.
pub type Transformer = Rc<dyn Fn(&str) -> anyhow::Result<Rc<dyn Any>>>;

/// Error of defining a [`ParameterType`].
#[derive(Clone, Debug, Display, Error)]
pub enum Error {
    /// [`ParameterType`] with the same name is registered already.
    #[display("There is already a parameter type with name `{_0}`")]
    Duplicate(#[error(not(source))] String),

    /// Name contains characters reserved by the expression syntax.
    #[display(
        "Illegal character in parameter name `{_0}`. Parameter names may not \
         contain '{{', '}}', '(', ')', '\\' or '/'"
    )]
    IllegalName(#[error(not(source))] String),

    /// Pattern of a [`ParameterType`] isn't a valid regular expression.
    #[display(
        "Invalid regular expression of parameter type `{name}`: {source}"
    )]
    Regex {
        /// Name of the [`ParameterType`].
        #[error(not(source))]
        name: String,

        /// Underlying [`regex`] error.
        source: regex::Error,
    },
}

/// Named capture vocabulary of [Cucumber Expressions][1].
///
/// [1]: https://github.com/cucumber/cucumber-expressions
#[derive(Clone)]
pub struct ParameterType {
    name: String,
    regexp: String,
    transformer: Transformer,
    use_for_snippets: bool,
}

impl fmt::Debug for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterType")
            .field("name", &self.name)
            .field("regexp", &self.regexp)
            .field("use_for_snippets", &self.use_for_snippets)
            .finish_non_exhaustive()
    }
}

impl ParameterType {
    /// Creates a new [`ParameterType`] transforming matched text with the
    /// provided `transformer`.
    ///
    /// Custom types are offered in snippet suggestions.
    pub fn new<T, F>(
        name: impl Into<String>,
        regexp: impl Into<String>,
        transformer: F,
    ) -> Self
    where
        T: 'static,
        F: Fn(&str) -> anyhow::Result<T> + 'static,
    {
        Self {
            name: name.into(),
            regexp: regexp.into(),
            transformer: Rc::new(move |s| {
                transformer(s).map(|v| Rc::new(v) as Rc<dyn Any>)
            }),
            use_for_snippets: true,
        }
    }

    /// Creates a built-in [`ParameterType`] parsing matched text with
    /// [`FromStr`].
    fn parsed<T>(name: &str, regexp: &str, use_for_snippets: bool) -> Self
    where
        T: FromStr + 'static,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        Self {
            use_for_snippets,
            ..Self::new(name, regexp, |s| Ok(s.parse::<T>()?))
        }
    }

    /// Sets whether this [`ParameterType`] is used in snippet suggestions.
    #[must_use]
    pub fn use_for_snippets(mut self, yes: bool) -> Self {
        self.use_for_snippets = yes;
        self
    }

    /// Name of this [`ParameterType`], as written between `{}`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Regular expression source matching this [`ParameterType`].
    #[must_use]
    pub fn regexp(&self) -> &str {
        &self.regexp
    }

    /// Indicates whether this [`ParameterType`] is used in snippets.
    #[must_use]
    pub const fn is_used_for_snippets(&self) -> bool {
        self.use_for_snippets
    }

    /// Converts the matched `text` into a typed value.
    ///
    /// # Errors
    ///
    /// If the transformer rejects the `text`.
    pub fn transform(&self, text: &str) -> anyhow::Result<Rc<dyn Any>> {
        (self.transformer)(text)
    }
}

/// Strips quotes of a `{string}` match and unescapes the quote character.
fn unquote(s: &str) -> String {
    let mut chars = s.chars();
    let quote = chars.next();
    let inner = chars.as_str();
    let inner = inner.strip_suffix(|c| Some(c) == quote).unwrap_or(inner);
    match quote {
        Some('"') => inner.replace("\\\"", "\""),
        Some('\'') => inner.replace("\\'", "'"),
        _ => inner.to_owned(),
    }
}

/// Set of [`ParameterType`]s available to expressions.
///
/// Starts with the built-in `int`, `float`, `word`, `string`, anonymous `{}`,
/// `double`, `long`, `short` and `byte` types.
#[derive(Clone, Debug)]
pub struct ParameterRegistry {
    types: Vec<ParameterType>,
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self {
            types: vec![
                ParameterType::parsed::<i64>("int", r"-?\d+|\d+", true),
                ParameterType::parsed::<f64>(
                    "float",
                    r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?",
                    true,
                ),
                ParameterType::new("word", r"[^\s]+", |s| Ok(s.to_owned()))
                    .use_for_snippets(false),
                ParameterType::new(
                    "string",
                    r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#,
                    |s| Ok(unquote(s)),
                ),
                ParameterType::new("", ".*", |s| Ok(s.to_owned()))
                    .use_for_snippets(false),
                ParameterType::parsed::<f64>(
                    "double",
                    r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?",
                    false,
                ),
                ParameterType::parsed::<i64>("long", r"-?\d+|\d+", false),
                ParameterType::parsed::<i16>("short", r"-?\d+|\d+", false),
                ParameterType::parsed::<i8>("byte", r"-?\d+|\d+", false),
            ],
        }
    }
}

impl ParameterRegistry {
    /// Creates a new [`ParameterRegistry`] with the built-in types only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom [`ParameterType`].
    ///
    /// # Errors
    ///
    /// If a type with the same name exists already, the name is illegal, or
    /// the pattern is not a valid regular expression.
    pub fn define(&mut self, ty: ParameterType) -> Result<(), Error> {
        if ty.name.chars().any(|c| "{}()\\/".contains(c)) {
            return Err(Error::IllegalName(ty.name));
        }
        if self.lookup(&ty.name).is_some() {
            return Err(Error::Duplicate(ty.name));
        }
        if let Err(source) = Regex::new(&ty.regexp) {
            return Err(Error::Regex { name: ty.name, source });
        }
        self.types.push(ty);
        Ok(())
    }

    /// Looks up a [`ParameterType`] by its `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&ParameterType> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Looks up a [`ParameterType`] whose pattern is exactly `regexp`.
    ///
    /// Built-ins win over custom types, matching the registration order.
    #[must_use]
    pub fn lookup_by_regexp(&self, regexp: &str) -> Option<&ParameterType> {
        self.types.iter().find(|t| t.regexp == regexp)
    }

    /// Iterates over [`ParameterType`]s used for snippet suggestions, in
    /// registration order.
    pub fn snippet_types(&self) -> impl Iterator<Item = &ParameterType> {
        self.types.iter().filter(|t| t.use_for_snippets)
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ParameterRegistry, ParameterType};

    #[test]
    fn builtins_transform() {
        let reg = ParameterRegistry::new();

        let int = reg.lookup("int").unwrap().transform("-42").unwrap();
        assert_eq!(int.downcast_ref::<i64>(), Some(&-42));

        let float = reg.lookup("float").unwrap().transform("1.5").unwrap();
        assert_eq!(float.downcast_ref::<f64>(), Some(&1.5));

        let string =
            reg.lookup("string").unwrap().transform(r#""say \"hi\"""#).unwrap();
        assert_eq!(
            string.downcast_ref::<String>().map(String::as_str),
            Some(r#"say "hi""#),
        );

        let single = reg.lookup("string").unwrap().transform("'a'").unwrap();
        let single = single.downcast_ref::<String>().map(String::as_str);
        assert_eq!(single, Some("a"));
    }

    #[test]
    fn byte_overflow_fails() {
        let reg = ParameterRegistry::new();

        assert!(reg.lookup("byte").unwrap().transform("300").is_err());
    }

    #[test]
    fn custom_types() {
        let mut reg = ParameterRegistry::new();
        reg.define(ParameterType::new("color", "red|blue", |s| {
            Ok(s.to_uppercase())
        }))
        .unwrap();

        let v = reg.lookup("color").unwrap().transform("red").unwrap();
        assert_eq!(v.downcast_ref::<String>().map(String::as_str), Some("RED"));
        assert_eq!(
            reg.snippet_types().map(ParameterType::name).collect::<Vec<_>>(),
            ["int", "float", "string", "color"],
        );
    }

    #[test]
    fn rejects_invalid_definitions() {
        let mut reg = ParameterRegistry::new();

        assert!(matches!(
            reg.define(ParameterType::new("int", r"\d", |s| Ok(s.to_owned()))),
            Err(Error::Duplicate(_)),
        ));
        assert!(matches!(
            reg.define(ParameterType::new("a/b", r"\d", |s| Ok(s.to_owned()))),
            Err(Error::IllegalName(_)),
        ));
        assert!(matches!(
            reg.define(ParameterType::new("paren", r"(", |s| Ok(s.to_owned()))),
            Err(Error::Regex { .. }),
        ));
    }
}
