//! Compiled artifact format.
//!
//! Artifacts are plain text with embedded instructions:
//!
//! ```text
//! <%= expr %>                 escaped echo
//! <% if expr %>               conditional (with elseif / else / endif)
//! <% foreach expr %>          iteration (closed by endforeach)
//! <% include view.name %>     splice another view's artifact
//! <% csrf %>                  session CSRF token
//! <%%                         literal "<%"
//! ```
//!
//! [`Program::parse`] turns artifact text into a tree of [`Node`]s. Parsing
//! happens before an artifact is persisted, so unbalanced blocks are
//! rejected at compile time.

use crate::ViewName;
use crate::expr::{self, Expr, ForeachHeader};

pub(crate) const OPEN: &str = "<%";
pub(crate) const CLOSE: &str = "%>";
pub(crate) const ESCAPED_OPEN: &str = "<%%";

pub(crate) fn instruction(body: &str) -> String {
    format!("{OPEN} {body} {CLOSE}")
}

pub(crate) fn echo(expr: &str) -> String {
    format!("{OPEN}= {expr} {CLOSE}")
}

pub(crate) fn include(view: &ViewName) -> String {
    instruction(&format!("include {view}"))
}

/// A node of a parsed artifact.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Echo(Expr),
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        otherwise: Option<Vec<Node>>,
    },
    Foreach {
        header: ForeachHeader,
        body: Vec<Node>,
    },
    Include(ViewName),
    Csrf,
}

/// A parsed artifact ready for evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Program {
    pub(crate) nodes: Vec<Node>,
}

/// Open block while parsing.
enum Frame {
    If {
        /// Closed `if` / `elseif` branches.
        branches: Vec<(Expr, Vec<Node>)>,
        /// Condition of the branch being filled.
        cond: Expr,
        body: Vec<Node>,
        otherwise: Option<Vec<Node>>,
    },
    Foreach {
        header: ForeachHeader,
        body: Vec<Node>,
    },
}

impl Frame {
    fn body_mut(&mut self) -> &mut Vec<Node> {
        match self {
            Self::If {
                otherwise: Some(body),
                ..
            }
            | Self::If { body, .. }
            | Self::Foreach { body, .. } => body,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::If { .. } => "if",
            Self::Foreach { .. } => "foreach",
        }
    }
}

struct Builder {
    root: Vec<Node>,
    stack: Vec<Frame>,
}

impl Builder {
    fn body(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(frame) => frame.body_mut(),
            None => &mut self.root,
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let body = self.body();
        if let Some(Node::Text(last)) = body.last_mut() {
            last.push_str(text);
        } else {
            body.push(Node::Text(text.to_owned()));
        }
    }

    fn instruction(&mut self, body: &str) -> Result<(), String> {
        if let Some(expr) = body.strip_prefix('=') {
            let expr = expr::parse_expression(expr.trim())?;
            self.body().push(Node::Echo(expr));
            return Ok(());
        }

        let body = body.trim();
        let (keyword, rest) = body
            .split_once(char::is_whitespace)
            .map_or((body, ""), |(k, r)| (k, r.trim()));

        match (keyword, rest.is_empty()) {
            ("if", false) => self.stack.push(Frame::If {
                branches: Vec::new(),
                cond: expr::parse_expression(rest)?,
                body: Vec::new(),
                otherwise: None,
            }),
            ("elseif", false) => {
                let next = expr::parse_expression(rest)?;
                match self.stack.last_mut() {
                    Some(Frame::If {
                        branches,
                        cond,
                        body,
                        otherwise: None,
                    }) => {
                        let done = std::mem::replace(cond, next);
                        branches.push((done, std::mem::take(body)));
                    }
                    Some(Frame::If { .. }) => return Err("elseif after else".to_owned()),
                    _ => return Err("elseif without matching if".to_owned()),
                }
            }
            ("else", true) => match self.stack.last_mut() {
                Some(Frame::If {
                    otherwise: otherwise @ None,
                    ..
                }) => *otherwise = Some(Vec::new()),
                Some(Frame::If { .. }) => return Err("duplicate else".to_owned()),
                _ => return Err("else without matching if".to_owned()),
            },
            ("endif", true) => match self.stack.pop() {
                Some(Frame::If {
                    mut branches,
                    cond,
                    body,
                    otherwise,
                }) => {
                    branches.push((cond, body));
                    self.body().push(Node::If {
                        branches,
                        otherwise,
                    });
                }
                Some(frame) => return Err(format!("endif closes an open {}", frame.name())),
                None => return Err("endif without matching if".to_owned()),
            },
            ("foreach", false) => self.stack.push(Frame::Foreach {
                header: expr::parse_foreach(rest)?,
                body: Vec::new(),
            }),
            ("endforeach", true) => match self.stack.pop() {
                Some(Frame::Foreach { header, body }) => {
                    self.body().push(Node::Foreach { header, body });
                }
                Some(frame) => return Err(format!("endforeach closes an open {}", frame.name())),
                None => return Err("endforeach without matching foreach".to_owned()),
            },
            ("include", false) => {
                let view = ViewName::new(rest).map_err(|e| e.to_string())?;
                self.body().push(Node::Include(view));
            }
            ("csrf", true) => self.body().push(Node::Csrf),
            _ => return Err(format!("invalid instruction '{body}'")),
        }

        Ok(())
    }
}

impl Program {
    /// Parse artifact text.
    pub(crate) fn parse(text: &str) -> Result<Self, String> {
        let mut builder = Builder {
            root: Vec::new(),
            stack: Vec::new(),
        };
        let mut rest = text;

        while let Some(start) = rest.find(OPEN) {
            builder.push_text(&rest[..start]);
            let after = &rest[start + OPEN.len()..];

            if let Some(literal) = after.strip_prefix('%') {
                builder.push_text(OPEN);
                rest = literal;
                continue;
            }

            let end = after
                .find(CLOSE)
                .ok_or_else(|| "unterminated instruction".to_owned())?;
            builder.instruction(&after[..end])?;
            rest = &after[end + CLOSE.len()..];
        }
        builder.push_text(rest);

        if let Some(frame) = builder.stack.last() {
            return Err(format!("unclosed {} block", frame.name()));
        }

        Ok(Self {
            nodes: builder.root,
        })
    }
}
