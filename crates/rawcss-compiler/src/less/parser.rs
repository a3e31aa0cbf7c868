//! Block structure parser
//!
//! Splits comment-free source into a tree of statements and blocks. Values
//! stay as raw text; the evaluator interprets them.

use crate::error::CompileError;

use super::scanner::string_end;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Variable {
        name: String,
        value: String,
        line: usize,
    },
    Declaration {
        property: String,
        value: String,
        line: usize,
    },
    Rule {
        selectors: Vec<String>,
        body: Vec<Node>,
        line: usize,
    },
    AtRule {
        name: String,
        prelude: String,
        body: Option<Vec<Node>>,
        line: usize,
    },
}

pub(crate) fn parse(source: &str) -> Result<Vec<Node>, CompileError> {
    let mut parser = Parser {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
    };
    parser.block(None)
}

enum Terminator {
    Open,
    Semicolon,
    Close,
    Eof,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            if c == '\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
    }

    /// Parse statements until EOF (root) or the `}` closing the block opened at `opened_at`
    fn block(&mut self, opened_at: Option<usize>) -> Result<Vec<Node>, CompileError> {
        let top_level = opened_at.is_none();
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace();
            match (self.peek(), opened_at) {
                (None, None) => return Ok(nodes),
                (None, Some(line)) => return Err(CompileError::syntax(line, "missing closing `}`")),
                (Some('}'), None) => return Err(CompileError::syntax(self.line, "unexpected `}`")),
                (Some('}'), Some(_)) => {
                    self.pos += 1;
                    return Ok(nodes);
                }
                (Some(';'), _) => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }

            let line = self.line;
            let (head, terminator) = self.head()?;
            let head = head.trim();
            match terminator {
                Terminator::Open => {
                    let body = self.block(Some(line))?;
                    nodes.push(block_node(head, body, line)?);
                }
                Terminator::Semicolon | Terminator::Close | Terminator::Eof => {
                    if !head.is_empty() {
                        nodes.push(statement_node(head, line, top_level)?);
                    }
                }
            }
        }
    }

    /// Read a statement or block head up to its terminator
    fn head(&mut self) -> Result<(String, Terminator), CompileError> {
        let mut head = String::new();
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '"' | '\'' => {
                    let end = string_end(&self.chars, self.pos)
                        .ok_or_else(|| CompileError::syntax(self.line, "unterminated string"))?;
                    for &ch in &self.chars[self.pos..end] {
                        if ch == '\n' {
                            self.line += 1;
                        }
                        head.push(ch);
                    }
                    self.pos = end;
                    continue;
                }
                '@' if self.peek_at(1) == Some('{') => {
                    let line = self.line;
                    while let Some(ch) = self.peek() {
                        head.push(ch);
                        self.pos += 1;
                        if ch == '}' {
                            break;
                        }
                    }
                    if !head.ends_with('}') {
                        return Err(CompileError::syntax(line, "unterminated `@{` interpolation"));
                    }
                    continue;
                }
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '{' if depth == 0 => {
                    self.pos += 1;
                    return Ok((head, Terminator::Open));
                }
                ';' if depth == 0 => {
                    self.pos += 1;
                    return Ok((head, Terminator::Semicolon));
                }
                '}' if depth == 0 => return Ok((head, Terminator::Close)),
                '\n' => self.line += 1,
                _ => {}
            }
            head.push(c);
            self.pos += 1;
        }
        Ok((head, Terminator::Eof))
    }
}

fn block_node(head: &str, body: Vec<Node>, line: usize) -> Result<Node, CompileError> {
    if head.is_empty() {
        return Err(CompileError::syntax(line, "missing selector before `{`"));
    }

    if let Some(rest) = at_keyword(head) {
        let (name, prelude) = split_ident(rest);
        if name.is_empty() {
            return Err(CompileError::syntax(line, "expected at-rule name after `@`"));
        }
        // `@page :first {` is an at-rule, `@rules: {` a detached ruleset
        if prelude.starts_with(':') {
            return Err(CompileError::unsupported(line, format!("detached ruleset @{name}")));
        }
        return Ok(Node::AtRule {
            name: name.to_string(),
            prelude: prelude.trim().to_string(),
            body: Some(body),
            line,
        });
    }

    let selectors: Vec<String> = split_top_level(head, ',')
        .into_iter()
        .map(|s| s.trim().to_string())
        .collect();
    if selectors.iter().any(String::is_empty) {
        return Err(CompileError::syntax(line, "empty selector in selector list"));
    }
    if let Some(mixin) = selectors.iter().find(|s| s.contains("(@") || s.contains(" when ")) {
        return Err(CompileError::unsupported(line, format!("parametric mixin `{mixin}`")));
    }
    Ok(Node::Rule { selectors, body, line })
}

fn statement_node(head: &str, line: usize, top_level: bool) -> Result<Node, CompileError> {
    if let Some(rest) = at_keyword(head) {
        if rest.starts_with('@') {
            return Err(CompileError::unsupported(line, "variable variables"));
        }
        let (name, tail) = split_ident(rest);
        if name.is_empty() {
            return Err(CompileError::syntax(line, "expected name after `@`"));
        }
        let tail = tail.trim_start();
        if let Some(value) = tail.strip_prefix(':') {
            return Ok(Node::Variable {
                name: name.to_string(),
                value: value.trim().to_string(),
                line,
            });
        }
        if tail.starts_with('(') {
            return Err(CompileError::unsupported(line, format!("detached ruleset call @{name}()")));
        }
        return Ok(Node::AtRule {
            name: name.to_string(),
            prelude: tail.trim().to_string(),
            body: None,
            line,
        });
    }

    match find_top_level(head, ':') {
        Some(_) if top_level => Err(CompileError::syntax(line, "declaration outside of a rule")),
        Some(idx) => {
            let property = head[..idx].trim();
            if property.is_empty() {
                return Err(CompileError::syntax(line, "missing property name"));
            }
            Ok(Node::Declaration {
                property: property.to_string(),
                value: head[idx + 1..].trim().to_string(),
                line,
            })
        }
        None => Err(CompileError::unsupported(line, format!("mixin call `{head}`"))),
    }
}

/// Text after a leading `@`, unless the `@` starts an interpolation
fn at_keyword(head: &str) -> Option<&str> {
    if head.starts_with("@{") {
        return None;
    }
    head.strip_prefix('@')
}

fn split_ident(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(s.len());
    s.split_at(end)
}

/// Split on `sep` outside strings and brackets
pub(crate) fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, c) in s.char_indices() {
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
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&s[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn find_top_level(s: &str, needle: char) -> Option<usize> {
    let first = split_top_level(s, needle);
    if first.len() > 1 {
        Some(first[0].len())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_variables_rules_and_declarations() {
        let nodes = parse("@c: red;\n.a {\n  color: @c;\n}").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Variable {
                    name: "c".to_string(),
                    value: "red".to_string(),
                    line: 1
                },
                Node::Rule {
                    selectors: vec![".a".to_string()],
                    body: vec![Node::Declaration {
                        property: "color".to_string(),
                        value: "@c".to_string(),
                        line: 3
                    }],
                    line: 2
                },
            ]
        );
    }

    #[test]
    fn last_declaration_may_omit_semicolon() {
        let nodes = parse("a{b:c}").unwrap();
        let Node::Rule { body, .. } = &nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn semicolons_inside_parentheses_do_not_split() {
        let nodes = parse("a{background:url(data:image/png;base64,AAA)}").unwrap();
        let Node::Rule { body, .. } = &nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(
            body[0],
            Node::Declaration {
                property: "background".to_string(),
                value: "url(data:image/png;base64,AAA)".to_string(),
                line: 1
            }
        );
    }

    #[test]
    fn interpolated_heads_are_kept_whole() {
        let nodes = parse(".@{name}-x { @{prop}: 1; }").unwrap();
        let Node::Rule { selectors, body, .. } = &nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(selectors, &vec![".@{name}-x".to_string()]);
        assert!(matches!(&body[0], Node::Declaration { property, .. } if property == "@{prop}"));
    }

    #[test]
    fn at_rules_with_and_without_blocks() {
        let nodes = parse("@import \"a.css\";\n@media print { a { b: c; } }").unwrap();
        assert!(matches!(&nodes[0], Node::AtRule { name, body: None, .. } if name == "import"));
        assert!(matches!(&nodes[1], Node::AtRule { name, prelude, body: Some(_), line: 2 }
            if name == "media" && prelude == "print"));
    }

    #[test]
    fn selector_lists_split_outside_brackets() {
        let nodes = parse("a, b:not(.x, .y) { c: d }").unwrap();
        let Node::Rule { selectors, .. } = &nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(selectors, &vec!["a".to_string(), "b:not(.x, .y)".to_string()]);
    }

    #[test]
    fn structural_errors() {
        assert!(matches!(parse("{ a: b }"), Err(CompileError::Syntax { .. })));
        assert!(matches!(parse("a, { b: c }"), Err(CompileError::Syntax { .. })));
        assert!(matches!(parse("a {\n b: c;\n"), Err(CompileError::Syntax { line: 1, .. })));
        assert!(matches!(parse("@x: { a: b }"), Err(CompileError::Unsupported { .. })));
        assert!(matches!(parse("@@name;"), Err(CompileError::Unsupported { .. })));
    }
}
