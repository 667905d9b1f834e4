//! Directive compiler.
//!
//! Rewrites template source into artifact text through a fixed sequence of
//! passes. The order matters:
//!
//! 1. literal protection (`<%` in raw text becomes `<%%`)
//! 2. `@include("view")`
//! 3. `@if`, `@elseif`, `@else`, `@endif`, `@foreach`, `@endforeach`
//! 4. `{{ expr }}` in text outside the instructions emitted so far
//! 5. `@csrf`
//! 6. `@yield("section")`, last, so substituted sections are never
//!    compiled twice
//!
//! Every pass either rewrites a complete directive or leaves the text
//! untouched. Unknown `@` words pass through unchanged.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, NoExpand, Regex};

use crate::artifact;
use crate::{TemplateError, ViewName};

static INCLUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@include\(['"](.+?)['"]\)"#).unwrap());
static ECHO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\s*(.+?)\s*\}\}").unwrap());
static CSRF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@csrf\b").unwrap());
static YIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@yield\(['"](.+?)['"]\)"#).unwrap());
static EXTENDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@extends\(['"](.+?)['"]\)"#).unwrap());
static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)@section\(['"](.+?)['"]\)(.*?)@endsection"#).unwrap());

/// Control keywords, longest first where one is a prefix of another.
const CONTROL_KEYWORDS: [(&str, bool); 6] = [
    ("elseif", true),
    ("else", false),
    ("endif", false),
    ("endforeach", false),
    ("foreach", true),
    ("if", true),
];

/// Hidden form field emitted for `@csrf`. The token is looked up at render time.
const CSRF_FIELD: &str = r#"<input type="hidden" name="_token" value="<% csrf %>">"#;

/// Layout named by the first `@extends("...")`, if any.
pub(crate) fn find_extends(text: &str) -> Option<&str> {
    EXTENDS_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// All `@section("name") ... @endsection` blocks in document order.
///
/// The first `@endsection` closes the nearest preceding `@section`, so
/// nested sections are not supported.
pub(crate) fn find_sections(text: &str) -> Vec<(&str, &str)> {
    SECTION_RE
        .captures_iter(text)
        .filter_map(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())))
        .collect()
}

/// Run every pass over `text`.
///
/// `ensure_include` is called once per `@include` with the included view so
/// the caller can bring its artifact up to date before the reference is
/// emitted.
pub(crate) fn compile<F>(
    text: &str,
    sections: &HashMap<String, String>,
    ensure_include: F,
) -> Result<String, TemplateError>
where
    F: FnMut(&ViewName) -> Result<(), TemplateError>,
{
    let text = protect_literals(text);
    let text = compile_includes(&text, ensure_include)?;
    let text = compile_control(&text);
    let text = compile_echos(&text);
    let text = compile_csrf(&text);
    Ok(compile_yields(&text, sections))
}

fn protect_literals(text: &str) -> String {
    text.replace(artifact::OPEN, artifact::ESCAPED_OPEN)
}

/// Undo literal protection inside a directive argument.
fn unprotect(expr: &str) -> String {
    expr.replace(artifact::ESCAPED_OPEN, artifact::OPEN)
}

fn compile_includes<F>(text: &str, mut ensure_include: F) -> Result<String, TemplateError>
where
    F: FnMut(&ViewName) -> Result<(), TemplateError>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in INCLUDE_RE.captures_iter(text) {
        let whole = caps.get_match();
        let view = ViewName::new(&caps[1])?;
        ensure_include(&view)?;

        out.push_str(&text[last..whole.start()]);
        out.push_str(&artifact::include(&view));
        last = whole.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}

fn compile_control(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        if let Some((replacement, consumed)) = control_directive(after) {
            out.push_str(&replacement);
            rest = &after[consumed..];
        } else {
            out.push('@');
            rest = after;
        }
    }

    out.push_str(rest);
    out
}

/// Translate the control directive at the start of `after` (the text
/// following an `@`). Returns the instruction and the number of bytes used.
fn control_directive(after: &str) -> Option<(String, usize)> {
    let &(keyword, takes_args) = CONTROL_KEYWORDS.iter().find(|(kw, _)| {
        after.starts_with(kw)
            && !after[kw.len()..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
    })?;

    if !takes_args {
        return Some((artifact::instruction(keyword), keyword.len()));
    }

    let tail = &after[keyword.len()..];
    let open = keyword.len() + (tail.len() - tail.trim_start().len());
    let close = open + matching_paren(&after[open..])?;
    let expr = after[open + 1..close].trim();

    if expr.is_empty() || expr.contains(artifact::CLOSE) {
        return None;
    }

    let body = format!("{keyword} {}", unprotect(expr));
    Some((artifact::instruction(&body), close + 1))
}

/// Byte offset of the parenthesis closing the one `s` starts with.
///
/// Parentheses inside quoted strings are ignored. Returns `None` when `s`
/// does not start with `(` or the group never closes.
fn matching_paren(s: &str) -> Option<usize> {
    if !s.starts_with('(') {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Rewrite `{{ }}` in raw text. Instructions emitted by earlier passes are
/// copied as-is, so an echo inside a control argument string stays literal.
fn compile_echos(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = find_instruction(rest) {
        let end = rest[start..]
            .find(artifact::CLOSE)
            .map_or(rest.len(), |i| start + i + artifact::CLOSE.len());
        out.push_str(&compile_plain_echos(&rest[..start]));
        out.push_str(&rest[start..end]);
        rest = &rest[end..];
    }
    out.push_str(&compile_plain_echos(rest));
    out
}

/// Byte offset of the first emitted instruction, skipping protected `<%%`.
fn find_instruction(text: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(i) = text[from..].find(artifact::OPEN) {
        let at = from + i;
        if text[at..].starts_with(artifact::ESCAPED_OPEN) {
            from = at + artifact::ESCAPED_OPEN.len();
        } else {
            return Some(at);
        }
    }
    None
}

fn compile_plain_echos(text: &str) -> String {
    ECHO_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let expr = &caps[1];
            if expr.contains(artifact::CLOSE) {
                caps[0].to_owned()
            } else {
                artifact::echo(&unprotect(expr))
            }
        })
        .into_owned()
}

fn compile_csrf(text: &str) -> String {
    CSRF_RE.replace_all(text, NoExpand(CSRF_FIELD)).into_owned()
}

fn compile_yields(text: &str, sections: &HashMap<String, String>) -> String {
    YIELD_RE
        .replace_all(text, |caps: &Captures<'_>| {
            sections.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(text: &str) -> String {
        compile(text, &HashMap::new(), |_| Ok(())).unwrap()
    }

    #[test]
    fn test_echo() {
        assert_eq!(run("<p>{{ $name }}</p>"), "<p><%= $name %></p>");
        assert_eq!(run("{{$a}}{{ $b ?? 'x' }}"), "<%= $a %><%= $b ?? 'x' %>");
    }

    #[test]
    fn test_echo_with_instruction_close_is_untouched() {
        assert_eq!(run("{{ '%>' }}"), "{{ '%>' }}");
    }

    #[test]
    fn test_echo_syntax_inside_control_argument_is_literal() {
        assert_eq!(
            run("@if($a == '{{ b }}')yes@endif {{ $c }}"),
            "<% if $a == '{{ b }}' %>yes<% endif %> <%= $c %>"
        );
        assert_eq!(run("<% {{ $a }}"), "<%% <%= $a %>");
    }

    #[test]
    fn test_control_structures() {
        let source = "@if($a)A@elseif($b)B@else C@endif";

        assert_eq!(
            run(source),
            "<% if $a %>A<% elseif $b %>B<% else %> C<% endif %>"
        );
    }

    #[test]
    fn test_foreach() {
        assert_eq!(
            run("@foreach($empresas as $empresa)<li>{{ $empresa['nome'] }}</li>@endforeach"),
            "<% foreach $empresas as $empresa %><li><%= $empresa['nome'] %></li><% endforeach %>"
        );
    }

    #[test]
    fn test_balanced_paren_scanning() {
        assert_eq!(
            run("@if(isset($errors['nome'])) is-invalid @endif"),
            "<% if isset($errors['nome']) %> is-invalid <% endif %>"
        );
        assert_eq!(
            run("@if(count($a) > 0) x @endif (note)"),
            "<% if count($a) > 0 %> x <% endif %> (note)"
        );
        assert_eq!(run("@if ($a == ')') y @endif"), "<% if $a == ')' %> y <% endif %>");
    }

    #[test]
    fn test_malformed_directives_are_untouched() {
        assert_eq!(run("@if($a"), "@if($a");
        assert_eq!(run("@if()"), "@if()");
        assert_eq!(run("@if"), "@if");
        assert_eq!(run("@iffy @endiff"), "@iffy @endiff");
        assert_eq!(run("@unknown('x')"), "@unknown('x')");
        assert_eq!(run("contato@empresa.com"), "contato@empresa.com");
    }

    #[test]
    fn test_csrf() {
        assert_eq!(
            run("<form>@csrf</form>"),
            r#"<form><input type="hidden" name="_token" value="<% csrf %>"></form>"#
        );
        assert_eq!(run("@csrfx"), "@csrfx");
    }

    #[test]
    fn test_literal_protection() {
        assert_eq!(run("<p><% raw %></p>"), "<p><%% raw %></p>");
        assert_eq!(run("{{ '<%' }}"), "<%= '<%' %>");
    }

    #[test]
    fn test_include_calls_hook_and_emits_reference() {
        let mut seen = Vec::new();

        let out = compile(
            r#"<nav>@include("partials.navbar")</nav>@include('empresa.form')"#,
            &HashMap::new(),
            |view| {
                seen.push(view.to_string());
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(
            out,
            "<nav><% include partials.navbar %></nav><% include empresa.form %>"
        );
        assert_eq!(seen, vec!["partials.navbar", "empresa.form"]);
    }

    #[test]
    fn test_include_error_propagates() {
        let err = compile("@include('missing')", &HashMap::new(), |view| {
            Err(TemplateError::ViewNotFound(view.to_string()))
        })
        .unwrap_err();

        assert!(matches!(err, TemplateError::ViewNotFound(v) if v == "missing"));
    }

    #[test]
    fn test_include_invalid_name() {
        let err = compile("@include('../etc/passwd')", &HashMap::new(), |_| Ok(())).unwrap_err();

        assert!(matches!(err, TemplateError::InvalidViewName(_)));
    }

    #[test]
    fn test_yield_substitutes_compiled_sections_verbatim() {
        let sections = HashMap::from([("content".to_owned(), "<%= $name %> {{ raw }}".to_owned())]);

        let out = compile(
            r#"<main>@yield("content")</main><aside>@yield('sidebar')</aside>"#,
            &sections,
            |_| Ok(()),
        )
        .unwrap();

        assert_eq!(out, "<main><%= $name %> {{ raw }}</main><aside></aside>");
    }

    #[test]
    fn test_find_extends_and_sections() {
        let source = r#"@extends("layouts.main")
@section('title')Empresas@endsection
@section("content")
  <h1>Lista</h1>
@endsection"#;

        assert_eq!(find_extends(source), Some("layouts.main"));
        assert_eq!(
            find_sections(source),
            vec![("title", "Empresas"), ("content", "\n  <h1>Lista</h1>\n")]
        );
        assert_eq!(find_extends("<p>no layout</p>"), None);
    }

    #[test]
    fn test_matching_paren() {
        assert_eq!(matching_paren("(a)"), Some(2));
        assert_eq!(matching_paren("(f(a, b)) rest"), Some(8));
        assert_eq!(matching_paren(r#"("\")" )"#), Some(7));
        assert_eq!(matching_paren("(unclosed"), None);
        assert_eq!(matching_paren("no paren"), None);
    }
}
