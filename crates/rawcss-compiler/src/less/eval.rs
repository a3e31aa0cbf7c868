//! Variable resolution and compressed CSS output

use indexmap::IndexMap;

use crate::error::CompileError;
use crate::Variables;

use super::parser::Node;
use super::scanner::{ends_with_url, paren_end, string_end};

pub(crate) fn render(nodes: &[Node], overrides: &Variables) -> Result<String, CompileError> {
    let mut root = Scope::of_block(nodes, None);
    for (name, value) in overrides {
        root.vars
            .insert(name.trim_start_matches('@').to_string(), value.clone());
    }
    let mut out = String::new();
    emit_children(nodes, &root, &[], &mut out)?;
    Ok(out)
}

/// Variables visible in one block, chained to the enclosing block
struct Scope<'p> {
    vars: IndexMap<String, String>,
    parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    fn of_block(nodes: &[Node], parent: Option<&'p Scope<'p>>) -> Self {
        let mut vars = IndexMap::new();
        for node in nodes {
            if let Node::Variable { name, value, .. } = node {
                vars.insert(name.clone(), value.clone());
            }
        }
        Self { vars, parent }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        match self.vars.get(name) {
            Some(value) => Some(value.as_str()),
            None => self.parent.and_then(|parent| parent.lookup(name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// `@name` references, `~"..."` escapes and `@{name}`
    Value,
    /// `@{name}` only
    Text,
}

struct Interpolator<'a, 'p> {
    scope: &'a Scope<'p>,
    line: usize,
    resolving: Vec<String>,
}

impl<'a, 'p> Interpolator<'a, 'p> {
    fn new(scope: &'a Scope<'p>, line: usize) -> Self {
        Self {
            scope,
            line,
            resolving: Vec::new(),
        }
    }

    fn expand(&mut self, text: &str, mode: Mode) -> Result<String, CompileError> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut quote: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '@' && chars.get(i + 1) == Some(&'{') {
                i = self.braced(&chars, i, &mut out)?;
                continue;
            }
            if let Some(q) = quote {
                out.push(c);
                if c == '\\' {
                    if let Some(&next) = chars.get(i + 1) {
                        out.push(next);
                        i += 1;
                    }
                } else if c == q {
                    quote = None;
                }
                i += 1;
                continue;
            }
            match c {
                '"' | '\'' => {
                    quote = Some(c);
                    out.push(c);
                    i += 1;
                }
                '~' if mode == Mode::Value && matches!(chars.get(i + 1), Some('"' | '\'')) => {
                    let end = string_end(&chars, i + 1)
                        .ok_or_else(|| CompileError::syntax(self.line, "unterminated escaped string"))?;
                    let inner: String = chars[i + 2..end - 1].iter().collect();
                    out.push_str(&self.expand(&inner, Mode::Text)?);
                    i = end;
                }
                '(' if mode == Mode::Value && ends_with_url(&out) => {
                    let end = paren_end(&chars, i)
                        .ok_or_else(|| CompileError::syntax(self.line, "unterminated url()"))?;
                    let inner: String = chars[i + 1..end - 1].iter().collect();
                    out.push('(');
                    out.push_str(&self.url(&inner)?);
                    out.push(')');
                    i = end;
                }
                '@' if mode == Mode::Value && chars.get(i + 1).is_some_and(|n| is_ident_char(*n)) => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && is_ident_char(chars[end]) {
                        end += 1;
                    }
                    let name: String = chars[start..end].iter().collect();
                    out.push_str(&self.variable(&name)?);
                    i = end;
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            }
        }
        Ok(out)
    }

    /// Unquoted `url()` content is raw text unless it is a lone variable
    fn url(&mut self, inner: &str) -> Result<String, CompileError> {
        let trimmed = inner.trim();
        match trimmed.strip_prefix('@') {
            Some(name) if !name.is_empty() && name.chars().all(is_ident_char) => self.variable(name),
            _ if trimmed.starts_with(['"', '\'']) => self.expand(inner, Mode::Value),
            _ => self.expand(inner, Mode::Text),
        }
    }

    /// Expand `@{name}` starting at `start`, returning the index after `}`
    fn braced(&mut self, chars: &[char], start: usize, out: &mut String) -> Result<usize, CompileError> {
        let close = chars[start..]
            .iter()
            .position(|c| *c == '}')
            .map(|offset| start + offset)
            .ok_or_else(|| CompileError::syntax(self.line, "unterminated `@{` interpolation"))?;
        let name: String = chars[start + 2..close].iter().collect();
        let value = self.variable(name.trim())?;
        out.push_str(unquote(&value));
        Ok(close + 1)
    }

    fn variable(&mut self, name: &str) -> Result<String, CompileError> {
        if self.resolving.iter().any(|n| n == name) {
            return Err(CompileError::RecursiveVariable {
                name: name.to_string(),
                line: self.line,
            });
        }
        let scope = self.scope;
        let raw = scope
            .lookup(name)
            .ok_or_else(|| CompileError::UndefinedVariable {
                name: name.to_string(),
                line: self.line,
            })?;

        self.resolving.push(name.to_string());
        let value = self.expand(raw, Mode::Value);
        self.resolving.pop();
        value
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    let mut chars = value.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first @ ('"' | '\'')), Some(last)) if first == last && value.len() >= 2 => &value[1..value.len() - 1],
        _ => value,
    }
}

/// Characters that swallow whitespace next to them
struct Spacing {
    after: &'static [char],
    before: &'static [char],
}

const VALUE: Spacing = Spacing {
    after: &[',', '(', '!'],
    before: &[',', ')'],
};

const SELECTOR: Spacing = Spacing {
    after: &['>', '+', '~', ',', '('],
    before: &['>', '+', '~', ',', ')'],
};

const PRELUDE: Spacing = Spacing {
    after: &[',', '(', ':'],
    before: &[',', ')', ':'],
};

/// Collapse whitespace outside strings
fn compact(text: &str, spacing: &Spacing) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut pending = false;

    for c in text.chars() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c.is_whitespace() {
            pending = true;
            continue;
        }
        if pending && !out.is_empty() && !out.ends_with(spacing.after) && !spacing.before.contains(&c) {
            out.push(' ');
        }
        pending = false;
        if c == '"' || c == '\'' {
            quote = Some(c);
        }
        out.push(c);
    }
    out
}

/// Join nested selectors onto their parents
fn combine(parents: &[String], children: &[String]) -> Vec<String> {
    if parents.is_empty() {
        return children
            .iter()
            .map(|child| compact(&child.replace('&', ""), &SELECTOR))
            .collect();
    }
    let mut combined = Vec::with_capacity(parents.len() * children.len());
    for parent in parents {
        for child in children {
            let joined = if child.contains('&') {
                child.replace('&', parent)
            } else {
                format!("{parent} {child}")
            };
            combined.push(compact(&joined, &SELECTOR));
        }
    }
    combined
}

fn declarations(nodes: &[Node], scope: &Scope<'_>) -> Result<Vec<String>, CompileError> {
    let mut decls = Vec::new();
    for node in nodes {
        if let Node::Declaration { property, value, line } = node {
            let mut interp = Interpolator::new(scope, *line);
            let property = compact(&interp.expand(property, Mode::Text)?, &VALUE);
            let value = compact(&interp.expand(value, Mode::Value)?, &VALUE);
            if value.is_empty() {
                return Err(CompileError::syntax(*line, format!("missing value for `{property}`")));
            }
            decls.push(format!("{property}:{value}"));
        }
    }
    Ok(decls)
}

fn write_rule(selectors: &[String], decls: &[String], out: &mut String) {
    out.push_str(&selectors.join(","));
    out.push('{');
    out.push_str(&decls.join(";"));
    out.push('}');
}

fn write_at_rule(name: &str, prelude: &str, out: &mut String) {
    out.push('@');
    out.push_str(name);
    if !prelude.is_empty() {
        out.push(' ');
        out.push_str(prelude);
    }
}

fn emit_children(
    nodes: &[Node],
    scope: &Scope<'_>,
    parents: &[String],
    out: &mut String,
) -> Result<(), CompileError> {
    for node in nodes {
        match node {
            Node::Rule { selectors, body, line } => {
                let mut interp = Interpolator::new(scope, *line);
                let own = selectors
                    .iter()
                    .map(|selector| interp.expand(selector, Mode::Text))
                    .collect::<Result<Vec<_>, _>>()?;
                let combined = combine(parents, &own);

                let child = Scope::of_block(body, Some(scope));
                let decls = declarations(body, &child)?;
                if !decls.is_empty() {
                    write_rule(&combined, &decls, out);
                }
                emit_children(body, &child, &combined, out)?;
            }
            Node::AtRule {
                name,
                prelude,
                body: Some(body),
                line,
            } => {
                let prelude = compact(&Interpolator::new(scope, *line).expand(prelude, Mode::Value)?, &PRELUDE);
                let child = Scope::of_block(body, Some(scope));

                let mut inner = String::new();
                let decls = declarations(body, &child)?;
                if !decls.is_empty() {
                    if parents.is_empty() {
                        inner.push_str(&decls.join(";"));
                    } else {
                        write_rule(parents, &decls, &mut inner);
                    }
                }
                emit_children(body, &child, parents, &mut inner)?;

                if !inner.is_empty() {
                    write_at_rule(name, &prelude, out);
                    out.push('{');
                    out.push_str(&inner);
                    out.push('}');
                }
            }
            Node::AtRule {
                name,
                prelude,
                body: None,
                line,
            } => {
                let prelude = compact(&Interpolator::new(scope, *line).expand(prelude, Mode::Value)?, &PRELUDE);
                write_at_rule(name, &prelude, out);
                out.push(';');
            }
            Node::Variable { .. } | Node::Declaration { .. } => {}
        }
    }
    Ok(())
}
