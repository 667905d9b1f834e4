//! Layout resolution.
//!
//! Turns one view into one artifact. A view without `@extends` is compiled
//! directly. A view with `@extends` contributes only its sections: each
//! `@section` body is compiled on its own and stored by name, then the layout
//! is compiled with its `@yield`s replaced by those bodies.
//!
//! Layouts may extend further layouts. Sections gathered from a descendant
//! win over same-named sections of an ancestor, and within one view the last
//! occurrence of a section wins.
//!
//! All state lives on the stack of a single call: the [`CompilationContext`]
//! is fresh per view, and the [`CompilingSet`] is threaded explicitly through
//! nested `@include` compiles.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::directive;
use crate::{TemplateError, ViewName};

/// Views currently being compiled in one call chain, outermost first.
#[derive(Debug, Default)]
pub(crate) struct CompilingSet {
    stack: Vec<ViewName>,
}

impl CompilingSet {
    /// Mark `view` as being compiled until the returned guard is dropped.
    ///
    /// Fails with [`TemplateError::CircularCompilation`] if the view is
    /// already on the stack.
    pub(crate) fn enter(&mut self, view: &ViewName) -> Result<CompilingGuard<'_>, TemplateError> {
        if self.contains(view) {
            return Err(TemplateError::CircularCompilation {
                view: view.to_string(),
                chain: self.stack.iter().map(ToString::to_string).collect(),
            });
        }
        self.stack.push(view.clone());
        Ok(CompilingGuard { set: self })
    }

    pub(crate) fn contains(&self, view: &ViewName) -> bool {
        self.stack.contains(view)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Releases a [`CompilingSet`] entry on drop, on success and error alike.
#[derive(Debug)]
pub(crate) struct CompilingGuard<'a> {
    set: &'a mut CompilingSet,
}

impl Deref for CompilingGuard<'_> {
    type Target = CompilingSet;

    fn deref(&self) -> &CompilingSet {
        self.set
    }
}

impl DerefMut for CompilingGuard<'_> {
    fn deref_mut(&mut self) -> &mut CompilingSet {
        self.set
    }
}

impl Drop for CompilingGuard<'_> {
    fn drop(&mut self) {
        self.set.stack.pop();
    }
}

/// Layout and compiled sections of the view being compiled.
#[derive(Debug, Default)]
pub(crate) struct CompilationContext {
    pub(crate) layout: Option<ViewName>,
    pub(crate) sections: HashMap<String, String>,
}

/// What the resolver needs from the engine.
pub(crate) trait ResolveEnv {
    /// Source text of a view, `None` if it does not exist.
    fn source(&self, view: &ViewName) -> Result<Option<String>, TemplateError>;

    /// Bring the artifact of an `@include`d view up to date.
    fn ensure_included(
        &self,
        view: &ViewName,
        compiling: &mut CompilingSet,
    ) -> Result<(), TemplateError>;
}

/// Compile `view` into artifact text.
pub(crate) fn resolve(
    env: &dyn ResolveEnv,
    view: &ViewName,
    compiling: &mut CompilingSet,
) -> Result<String, TemplateError> {
    let mut compiling = compiling.enter(view)?;
    let mut ctx = CompilationContext::default();

    let source = env
        .source(view)?
        .ok_or_else(|| TemplateError::ViewNotFound(view.to_string()))?;

    let Some(layout) = directive::find_extends(&source) else {
        return compile_text(env, &source, &ctx, &mut compiling);
    };
    let mut layout = ViewName::new(layout)?;

    for (name, body) in directive::find_sections(&source) {
        let compiled = compile_text(env, body, &ctx, &mut compiling)?;
        ctx.sections.insert(name.to_owned(), compiled);
    }

    let mut chain = vec![view.clone()];
    loop {
        if chain.contains(&layout) {
            return Err(TemplateError::CircularCompilation {
                view: layout.to_string(),
                chain: chain.iter().map(ToString::to_string).collect(),
            });
        }

        let extender = chain.last().map_or_else(|| view.to_string(), ToString::to_string);
        let text = env
            .source(&layout)?
            .ok_or_else(|| TemplateError::LayoutNotFound {
                view: extender,
                layout: layout.to_string(),
            })?;
        ctx.layout = Some(layout.clone());

        let Some(parent) = directive::find_extends(&text) else {
            tracing::debug!(
                view = %view,
                layout = ?ctx.layout,
                sections = ctx.sections.len(),
                "resolved layout"
            );
            return compile_text(env, &text, &ctx, &mut compiling);
        };
        let parent = ViewName::new(parent)?;

        let mut level = HashMap::new();
        for (name, body) in directive::find_sections(&text) {
            level.insert(name.to_owned(), compile_text(env, body, &ctx, &mut compiling)?);
        }
        for (name, body) in level {
            ctx.sections.entry(name).or_insert(body);
        }

        chain.push(layout);
        layout = parent;
    }
}

fn compile_text(
    env: &dyn ResolveEnv,
    text: &str,
    ctx: &CompilationContext,
    compiling: &mut CompilingSet,
) -> Result<String, TemplateError> {
    directive::compile(text, &ctx.sections, |view| {
        env.ensure_included(view, compiling)
    })
}
