//! Render executor.
//!
//! Walks a parsed [`Program`] with the render context's variables in scope
//! and collects the output. Echoed values are always HTML-escaped.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::artifact::{Node, Program};
use crate::context::{RenderContext, Session};
use crate::expr::{Expr, ForeachHeader, Scope};
use crate::value::{escape_html, is_truthy, to_text, type_name};
use crate::{TemplateError, ViewName};

/// Session key holding the CSRF token.
pub const CSRF_TOKEN_KEY: &str = "_token";

/// Engine variable bound to the name of the view being evaluated.
const VIEW_VAR: &str = "__view";

/// Supplies up-to-date programs for included views.
pub(crate) trait ProgramLoader {
    fn program(&self, view: &ViewName) -> Result<Arc<Program>, TemplateError>;
}

/// Variables visible to expressions: loop frames over the render context.
struct Frames<'a> {
    base: &'a Map<String, Value>,
    frames: Vec<Map<String, Value>>,
}

impl Scope for Frames<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.base.get(name))
    }
}

pub(crate) struct Executor<'a> {
    loader: &'a dyn ProgramLoader,
    session: &'a dyn Session,
    scope: Frames<'a>,
    /// Views being evaluated, outermost first.
    stack: Vec<ViewName>,
    out: String,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(
        loader: &'a dyn ProgramLoader,
        ctx: &'a RenderContext,
        session: &'a dyn Session,
    ) -> Self {
        Self {
            loader,
            session,
            scope: Frames {
                base: ctx.vars(),
                frames: Vec::new(),
            },
            stack: Vec::new(),
            out: String::new(),
        }
    }

    pub(crate) fn into_output(self) -> String {
        self.out
    }

    /// Evaluate `program` as the body of `view`.
    pub(crate) fn run(&mut self, view: &ViewName, program: &Program) -> Result<(), TemplateError> {
        if self.stack.contains(view) {
            return Err(TemplateError::CircularCompilation {
                view: view.to_string(),
                chain: self.stack.iter().map(ToString::to_string).collect(),
            });
        }

        let mut frame = Map::new();
        frame.insert(VIEW_VAR.to_owned(), Value::String(view.to_string()));
        self.stack.push(view.clone());
        self.scope.frames.push(frame);

        let result = self.nodes(view, &program.nodes);

        self.scope.frames.pop();
        self.stack.pop();
        result
    }

    fn nodes(&mut self, view: &ViewName, nodes: &[Node]) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Echo(expr) => {
                    let value = self.eval(view, expr)?;
                    self.out.push_str(&escape_html(&to_text(&value)));
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut chosen = otherwise.as_deref();
                    for (cond, body) in branches {
                        if is_truthy(&self.eval(view, cond)?) {
                            chosen = Some(body);
                            break;
                        }
                    }
                    if let Some(body) = chosen {
                        self.nodes(view, body)?;
                    }
                }
                Node::Foreach { header, body } => self.foreach(view, header, body)?,
                Node::Include(included) => {
                    let program = self.loader.program(included)?;
                    self.run(included, &program)?;
                }
                Node::Csrf => {
                    let token = self.session.get_or(CSRF_TOKEN_KEY, "");
                    self.out.push_str(&escape_html(&token));
                }
            }
        }
        Ok(())
    }

    fn foreach(
        &mut self,
        view: &ViewName,
        header: &ForeachHeader,
        body: &[Node],
    ) -> Result<(), TemplateError> {
        let items: Vec<(Value, Value)> = match self.eval(view, &header.iterable)? {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v))
                .collect(),
            Value::Object(map) => map.into_iter().map(|(k, v)| (Value::String(k), v)).collect(),
            other => {
                return Err(TemplateError::eval(
                    view.as_str(),
                    format!("cannot iterate over {}", type_name(&other)),
                ));
            }
        };

        for (key, value) in items {
            let mut frame = Map::new();
            if let Some(key_var) = &header.key {
                frame.insert(key_var.clone(), key);
            }
            frame.insert(header.value.clone(), value);

            self.scope.frames.push(frame);
            let result = self.nodes(view, body);
            self.scope.frames.pop();
            result?;
        }
        Ok(())
    }

    fn eval(&self, view: &ViewName, expr: &Expr) -> Result<Value, TemplateError> {
        expr.eval(&self.scope)
            .map_err(|message| TemplateError::eval(view.as_str(), message))
    }
}
