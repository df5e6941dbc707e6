// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step definitions, parameter types and hooks of one unit of work.
//!
//! Definitions are collected by a [`RegistryBuilder`] and compiled exactly
//! once by [`RegistryBuilder::finalize()`]. Only the resulting [`Registry`]
//! resolves step text, so no resolution can happen before compilation.

use std::{cell::Cell, fmt, panic, rc::Rc};

use futures::future::LocalBoxFuture;

use crate::{
    error::{Error, Result},
    expression::{CucumberExpression, Expression, RegularExpression},
    hook::{self, Hook, HookFn, Keyword},
    id::IdGenerator,
    message::{self, Envelope},
    parameter::{ParameterRegistry, ParameterType},
    step::{
        context::{Capture, Scope},
        AmbiguousMatchError, Context, Description, Locator,
        MissingDefinitionError, Outcome, ResolveError, RunError,
        StepArgument, StepDefinition, StepFn,
    },
    tag::TagExpression,
};

/// Step definition not compiled yet.
struct Preliminary<W> {
    description: Description,
    implementation: StepFn<W>,
    caller: &'static panic::Location<'static>,
}

/// Collector of definitions, turned into a [`Registry`] by
/// [`RegistryBuilder::finalize()`].
pub struct RegistryBuilder<W> {
    ids: Rc<IdGenerator>,
    locator: Option<Rc<dyn Locator>>,
    parameters: ParameterRegistry,
    steps: Vec<Preliminary<W>>,
    hooks: Vec<(Hook<W>, &'static panic::Location<'static>)>,
}

impl<W> fmt::Debug for RegistryBuilder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("steps", &self.steps.len())
            .field("hooks", &self.hooks.len())
            .field("locator", &self.locator.is_some())
            .finish_non_exhaustive()
    }
}

impl<W> Default for RegistryBuilder<W> {
    fn default() -> Self {
        Self::new(Rc::new(IdGenerator::default()))
    }
}

impl<W> RegistryBuilder<W> {
    /// Creates a new empty [`RegistryBuilder`] drawing ids from `ids`.
    #[must_use]
    pub fn new(ids: Rc<IdGenerator>) -> Self {
        Self {
            ids,
            locator: None,
            parameters: ParameterRegistry::default(),
            steps: vec![],
            hooks: vec![],
        }
    }

    /// Resolves definition positions with the given [`Locator`].
    ///
    /// Without one, every position stays absent.
    #[must_use]
    pub fn with_locator(mut self, locator: impl Locator + 'static) -> Self {
        self.locator = Some(Rc::new(locator));
        self
    }

    /// Registers a step definition.
    ///
    /// String descriptions become [Cucumber Expressions][1] and [`Regex`]es
    /// stay regular expressions once [finalized](Self::finalize).
    ///
    /// # Errors
    ///
    /// [`Error::MalformedArgument`] if the `description` is empty.
    ///
    /// [`Regex`]: regex::Regex
    /// [1]: https://github.com/cucumber/cucumber-expressions
    #[track_caller]
    pub fn define_step<F>(
        &mut self,
        description: impl Into<Description>,
        implementation: F,
    ) -> Result<&mut Self>
    where
        F: for<'a> Fn(
                &'a mut W,
                Context,
            ) -> LocalBoxFuture<'a, anyhow::Result<Outcome>>
            + 'static,
    {
        let description = description.into();
        if description.is_empty() {
            return Err(Error::malformed(
                "step definition",
                "expected a string or a regular expression",
            ));
        }
        self.steps.push(Preliminary {
            description,
            implementation: Rc::new(implementation),
            caller: panic::Location::caller(),
        });
        Ok(self)
    }

    /// Registers a custom [`ParameterType`].
    ///
    /// # Errors
    ///
    /// If the [`ParameterType`] is invalid or defined already.
    pub fn define_parameter_type(
        &mut self,
        ty: ParameterType,
    ) -> Result<&mut Self> {
        self.parameters.define(ty)?;
        Ok(self)
    }

    /// Registers a `Before` hook, applying to pickles matching `tags`, or to
    /// all of them if [`None`].
    ///
    /// # Errors
    ///
    /// [`Error::MalformedArgument`] if `tags` is not a valid tag expression.
    #[track_caller]
    pub fn define_before<F>(
        &mut self,
        tags: Option<&str>,
        implementation: F,
    ) -> Result<&mut Self>
    where
        F: for<'a> Fn(
                &'a mut W,
                hook::Context,
            ) -> LocalBoxFuture<'a, anyhow::Result<()>>
            + 'static,
    {
        self.define_hook(Keyword::Before, tags, Rc::new(implementation))
    }

    /// Registers an `After` hook, applying to pickles matching `tags`, or to
    /// all of them if [`None`].
    ///
    /// # Errors
    ///
    /// [`Error::MalformedArgument`] if `tags` is not a valid tag expression.
    #[track_caller]
    pub fn define_after<F>(
        &mut self,
        tags: Option<&str>,
        implementation: F,
    ) -> Result<&mut Self>
    where
        F: for<'a> Fn(
                &'a mut W,
                hook::Context,
            ) -> LocalBoxFuture<'a, anyhow::Result<()>>
            + 'static,
    {
        self.define_hook(Keyword::After, tags, Rc::new(implementation))
    }

    #[track_caller]
    fn define_hook(
        &mut self,
        keyword: Keyword,
        tags: Option<&str>,
        implementation: HookFn<W>,
    ) -> Result<&mut Self> {
        let tag_source = tags.map(str::trim).filter(|t| !t.is_empty());
        let filter = tag_source
            .map(str::parse::<TagExpression>)
            .transpose()
            .map_err(|e| Error::malformed(hook_kind(keyword), e.to_string()))?;
        let hook = Hook {
            id: self.ids.next_id(),
            keyword,
            tags: filter,
            tag_source: tag_source.map(str::to_owned),
            implementation,
            location: None,
        };
        self.hooks.push((hook, panic::Location::caller()));
        Ok(self)
    }

    /// Compiles every registered step definition against the final set of
    /// parameter types and resolves definition positions.
    ///
    /// # Errors
    ///
    /// If some description is not a valid expression.
    pub fn finalize(self) -> Result<Registry<W>> {
        let Self { ids, locator, parameters, steps, hooks } = self;
        let locate = |caller: &'static panic::Location<'static>| {
            locator.as_ref().and_then(|l| l.locate(caller))
        };

        let steps = steps
            .into_iter()
            .map(|p| -> Result<StepDefinition<W>> {
                let expression = match p.description {
                    Description::Expression(s) => Expression::Cucumber(
                        CucumberExpression::new(s, &parameters)?,
                    ),
                    Description::Regex(re) => {
                        Expression::Regular(RegularExpression::new(re))
                    }
                };
                Ok(StepDefinition {
                    id: ids.next_id(),
                    expression,
                    implementation: p.implementation,
                    location: locate(p.caller),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let hooks = hooks
            .into_iter()
            .map(|(mut h, caller)| {
                h.location = locate(caller);
                h
            })
            .collect();

        tracing::debug!(steps = steps.len(), "registry finalized");

        Ok(Registry { ids, parameters, steps, hooks, active: Cell::new(false) })
    }
}

const fn hook_kind(keyword: Keyword) -> &'static str {
    match keyword {
        Keyword::Before => "Before hook",
        Keyword::After => "After hook",
    }
}

/// Compiled definitions resolving step text to implementations.
pub struct Registry<W> {
    ids: Rc<IdGenerator>,
    parameters: ParameterRegistry,
    steps: Vec<StepDefinition<W>>,
    hooks: Vec<Hook<W>>,
    active: Cell<bool>,
}

impl<W> fmt::Debug for Registry<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("steps", &self.steps)
            .field("hooks", &self.hooks)
            .field("active", &self.active.get())
            .finish_non_exhaustive()
    }
}

impl<W> Registry<W> {
    /// Generator of every id in this unit of work.
    #[must_use]
    pub fn ids(&self) -> &Rc<IdGenerator> {
        &self.ids
    }

    /// [`ParameterType`]s the step definitions were compiled against.
    #[must_use]
    pub const fn parameters(&self) -> &ParameterRegistry {
        &self.parameters
    }

    /// All step definitions, in registration order.
    #[must_use]
    pub fn step_definitions(&self) -> &[StepDefinition<W>] {
        &self.steps
    }

    /// All hooks, in registration order.
    #[must_use]
    pub fn hooks(&self) -> &[Hook<W>] {
        &self.hooks
    }

    /// Every step definition matching `text`, in registration order.
    #[must_use]
    pub fn matching_step_definitions(
        &self,
        text: &str,
    ) -> Vec<&StepDefinition<W>> {
        self.steps
            .iter()
            .filter(|d| d.expression.is_match(text))
            .collect()
    }

    /// Resolves `text` to exactly one step definition.
    ///
    /// # Errors
    ///
    /// If zero or more than one definitions match.
    pub fn resolve_step_definition(
        &self,
        text: &str,
    ) -> Result<&StepDefinition<W>, ResolveError> {
        let matching = self.matching_step_definitions(text);
        match matching.as_slice() {
            [] => {
                return Err(
                    MissingDefinitionError { text: text.to_owned() }.into()
                );
            }
            [single] => return Ok(*single),
            _ => {}
        }
        Err(AmbiguousMatchError {
            text: text.to_owned(),
            possible_matches: matching
                .iter()
                .map(|d| (d.expression.to_string(), d.location.clone()))
                .collect(),
        }
        .into())
    }

    /// Resolves `text` and invokes the matching implementation with its
    /// captures followed by the trailing `argument`.
    ///
    /// The returned future yields whatever the implementation does.
    ///
    /// # Errors
    ///
    /// If `text` doesn't resolve, or some capture cannot be transformed.
    pub fn run_step_definition<'w>(
        &self,
        world: &'w mut W,
        text: &str,
        argument: Option<StepArgument>,
        scope: Scope,
    ) -> Result<LocalBoxFuture<'w, anyhow::Result<Outcome>>, RunError> {
        let definition = self.resolve_step_definition(text)?;
        let captures = definition
            .expression
            .match_text(text)
            .unwrap_or_default()
            .into_iter()
            .map(|m| {
                let value = m.value().map_err(|e| RunError::Transform {
                    parameter: m
                        .parameter_type
                        .as_ref()
                        .map(|t| t.name().to_owned())
                        .unwrap_or_default(),
                    text: m.text.clone().unwrap_or_default(),
                    reason: format!("{e:#}"),
                })?;
                Ok(Capture { text: m.text, value })
            })
            .collect::<Result<Vec<_>, RunError>>()?;

        tracing::trace!(
            step = text,
            definition = %definition.expression,
            "running step definition",
        );

        let ctx = Context::new(scope, captures, argument);
        Ok((definition.implementation)(world, ctx))
    }

    /// `Before` hooks applying to `tags`, in registration order.
    pub fn resolve_before_hooks<'t, I>(&self, tags: I) -> Vec<&Hook<W>>
    where
        I: IntoIterator<Item = &'t str> + Clone,
    {
        self.resolve_hooks(Keyword::Before, tags)
    }

    /// `After` hooks applying to `tags`, in registration order.
    pub fn resolve_after_hooks<'t, I>(&self, tags: I) -> Vec<&Hook<W>>
    where
        I: IntoIterator<Item = &'t str> + Clone,
    {
        self.resolve_hooks(Keyword::After, tags)
    }

    fn resolve_hooks<'t, I>(&self, keyword: Keyword, tags: I) -> Vec<&Hook<W>>
    where
        I: IntoIterator<Item = &'t str> + Clone,
    {
        self.hooks
            .iter()
            .filter(|h| h.keyword == keyword && h.applies_to(tags.clone()))
            .collect()
    }

    /// `stepDefinition` and `hook` envelopes describing this [`Registry`].
    #[must_use]
    pub fn envelopes(&self) -> Vec<Envelope> {
        let steps = self.steps.iter().map(|d| {
            Envelope::StepDefinition(message::StepDefinition {
                id: d.id.clone(),
                pattern: message::StepDefinitionPattern {
                    source: d.expression.source().to_owned(),
                    ty: match d.expression {
                        Expression::Cucumber(_) => {
                            message::PatternType::CucumberExpression
                        }
                        Expression::Regular(_) => {
                            message::PatternType::RegularExpression
                        }
                    },
                },
                source_reference: d.location.as_ref().into(),
            })
        });
        let hooks = self.hooks.iter().map(|h| {
            Envelope::Hook(message::Hook {
                id: h.id.clone(),
                tag_expression: h.tag_source.clone(),
                source_reference: h.location.as_ref().into(),
            })
        });
        steps.chain(hooks).collect()
    }

    /// Opens this [`Registry`]'s window of work.
    ///
    /// Callers must not activate two windows at once: this is only traced,
    /// not prevented.
    pub fn acquire(&self) {
        if self.active.replace(true) {
            tracing::warn!("registry acquired while already active");
        } else {
            tracing::trace!("registry acquired");
        }
    }

    /// Closes this [`Registry`]'s window of work.
    pub fn release(&self) {
        if self.active.replace(false) {
            tracing::trace!("registry released");
        }
    }

    /// Indicates whether this [`Registry`] is inside a window of work.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use futures::FutureExt as _;
    use regex::Regex;

    use crate::{
        error::Error,
        hook,
        id::IdGenerator,
        parameter::ParameterType,
        step::{
            context::Scope, Context, Location, Outcome, ResolveError,
            StepArgument,
        },
        LocalBoxFuture,
    };

    use super::RegistryBuilder;

    #[derive(Default)]
    struct Calc {
        seen: Vec<i64>,
    }

    fn builder() -> RegistryBuilder<Calc> {
        RegistryBuilder::new(Rc::new(IdGenerator::incrementing()))
    }

    fn passed(
        _: &mut Calc,
        _: Context,
    ) -> LocalBoxFuture<'_, anyhow::Result<Outcome>> {
        async { Ok(Outcome::Passed) }.boxed_local()
    }

    fn noop(
        _: &mut Calc,
        _: hook::Context,
    ) -> LocalBoxFuture<'_, anyhow::Result<()>> {
        async { Ok(()) }.boxed_local()
    }

    #[test]
    fn resolves_zero_one_and_many() {
        let mut b = builder();
        b.define_step("a is {int}", passed)
            .unwrap()
            .define_step(Regex::new("^b is (.*)$").unwrap(), passed)
            .unwrap()
            .define_step("b is {word}", passed)
            .unwrap();
        let registry = b.finalize().unwrap();

        assert!(matches!(
            registry.resolve_step_definition("c is 1"),
            Err(ResolveError::Missing(_)),
        ));
        let single = registry.resolve_step_definition("a is 1").unwrap();
        assert_eq!(single.expression.to_string(), "a is {int}");
        let Err(ResolveError::Ambiguous(err)) =
            registry.resolve_step_definition("b is x")
        else {
            panic!("expected ambiguous match");
        };
        assert_eq!(
            err.possible_matches
                .iter()
                .map(|(e, _)| e.as_str())
                .collect::<Vec<_>>(),
            ["/^b is (.*)$/", "b is {word}"],
        );
    }

    #[test]
    fn empty_description_is_malformed() {
        let err = builder()
            .define_step("", passed)
            .map(|_| ())
            .unwrap_err();

        assert!(matches!(err, Error::MalformedArgument { .. }), "{err}");
    }

    #[test]
    fn invalid_hook_tags_are_malformed() {
        let err = builder()
            .define_before(Some("@a and"), noop)
            .map(|_| ())
            .unwrap_err();

        assert!(matches!(err, Error::MalformedArgument { .. }), "{err}");
    }

    #[test]
    fn parameter_types_defined_after_steps_apply() {
        let mut b = builder();
        b.define_step("the {color} door", passed).unwrap();
        b.define_parameter_type(ParameterType::new("color", "red|blue", |s| {
            Ok(s.to_uppercase())
        }))
        .unwrap();

        let registry = b.finalize().unwrap();

        assert!(registry.resolve_step_definition("the red door").is_ok());
    }

    #[tokio::test]
    async fn runs_with_typed_captures_and_argument() {
        let mut b = builder();
        b.define_step("add {int}", |w: &mut Calc, ctx| {
            async move {
                w.seen.push(*ctx.get::<i64>(0).unwrap_or(&-1));
                w.seen.push(ctx.get::<i32>(0).map_or(-1, |v| i64::from(*v)));
                assert_eq!(ctx.doc_string(), Some("doc"));
                Ok(Outcome::Pending)
            }
            .boxed_local()
        })
        .unwrap();
        let registry = b.finalize().unwrap();
        let mut world = Calc::default();

        let outcome = registry
            .run_step_definition(
                &mut world,
                "add 5",
                Some(StepArgument::DocString("doc".into())),
                Scope::default(),
            )
            .unwrap()
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Pending);
        assert_eq!(world.seen, [5, -1]);
    }

    #[test]
    fn hooks_keep_registration_order_and_filter() {
        let mut b = builder();
        b.define_before(None, noop)
            .unwrap()
            .define_after(Some("@db"), noop)
            .unwrap()
            .define_before(Some("not @slow"), noop)
            .unwrap();
        let registry = b.finalize().unwrap();

        assert_eq!(registry.resolve_before_hooks(["@fast"]).len(), 2);
        assert_eq!(registry.resolve_before_hooks(["@slow"]).len(), 1);
        assert!(registry.resolve_after_hooks(["@fast"]).is_empty());
        assert_eq!(registry.resolve_after_hooks(["@db"]).len(), 1);
    }

    #[test]
    fn locations_are_absent_without_locator() {
        let mut b = builder();
        b.define_step("x", passed).unwrap();

        assert_eq!(b.finalize().unwrap().step_definitions()[0].location, None);
    }

    #[test]
    fn locator_resolves_positions() {
        let mut b = builder().with_locator(
            |c: &'static std::panic::Location<'static>| {
                Some(Location::new("steps.rs", c.line(), 1))
            },
        );
        b.define_step("x", passed).unwrap();
        let registry = b.finalize().unwrap();

        let loc = registry.step_definitions()[0].location.clone().unwrap();
        assert_eq!(loc.path, "steps.rs");
        assert_eq!(registry.envelopes().len(), 1);
    }
}
