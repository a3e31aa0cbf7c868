//! Less-subset compiler
//!
//! Implements the part of Less that site style sheets actually use:
//!
//! - variables (`@name: value;`) with block scoping and lazy,
//!   last-definition-wins lookup
//! - overrides that behave like definitions appended to the root scope
//! - `@{name}` interpolation in selectors, property names and strings,
//!   `~"..."` escapes
//! - nested rules with `&` parent references
//! - at-rules with and without blocks, nested at-rules bubbling their
//!   parent selector
//! - `/* */` and `//` comments
//!
//! Output is always compressed. Mixins, guards, operations and functions are
//! not evaluated: mixin calls and parametric definitions are rejected with
//! [`CompileError::Unsupported`], everything else passes through as text.

mod eval;
mod parser;
mod scanner;

use crate::error::CompileError;
use crate::{StyleCompiler, Variables};

/// Compiler for the supported Less subset
#[derive(Debug, Clone, Copy, Default)]
pub struct LessCompiler;

impl LessCompiler {
    /// Create new compiler
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Check that `source` parses, without evaluating variables
    ///
    /// Used when saving a Less page: variables may legitimately come from
    /// the application that includes the page.
    ///
    /// # Errors
    /// Returns [`CompileError`] on syntax errors and unsupported constructs.
    pub fn check_syntax(&self, source: &str) -> Result<(), CompileError> {
        let stripped = scanner::strip_comments(source)?;
        parser::parse(&stripped).map(|_| ())
    }
}

impl StyleCompiler for LessCompiler {
    fn compile(&self, source: &str, variables: &Variables) -> Result<String, CompileError> {
        let stripped = scanner::strip_comments(source)?;
        let nodes = parser::parse(&stripped)?;
        let css = eval::render(&nodes, variables)?;
        tracing::trace!(source_len = source.len(), css_len = css.len(), "compiled less");
        Ok(css)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> Result<String, CompileError> {
        LessCompiler::new().compile(source, &Variables::new())
    }

    fn compile_with(source: &str, vars: &[(&str, &str)]) -> Result<String, CompileError> {
        let variables = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        LessCompiler::new().compile(source, &variables)
    }

    #[test]
    fn override_replaces_source_default() {
        assert_eq!(
            compile_with("@c: blue; body{color:@c}", &[("c", "green")]).unwrap(),
            "body{color:green}"
        );
    }

    #[test]
    fn override_names_may_carry_at_sign() {
        assert_eq!(
            compile_with("@c: blue; body{color:@c}", &[("@c", "green")]).unwrap(),
            "body{color:green}"
        );
    }

    #[test]
    fn source_default_applies_without_override() {
        assert_eq!(compile("@c: blue;\nbody { color: @c; }").unwrap(), "body{color:blue}");
    }

    #[test]
    fn last_definition_wins_and_lookup_is_lazy() {
        let source = "a { color: @c; }\n@c: red;\n@c: blue;";
        assert_eq!(compile(source).unwrap(), "a{color:blue}");
    }

    #[test]
    fn inner_scope_shadows_root_and_override() {
        let source = "@c: red; .a { @c: blue; color: @c; } .b { color: @c; }";
        assert_eq!(
            compile_with(source, &[("c", "green")]).unwrap(),
            ".a{color:blue}.b{color:green}"
        );
    }

    #[test]
    fn variables_reference_variables() {
        let source = "@base: #333; @text: @base; p { color: @text; border: 1px solid @base; }";
        assert_eq!(compile(source).unwrap(), "p{color:#333;border:1px solid #333}");
    }

    #[test]
    fn nested_rules_flatten() {
        let source = ".card { padding: 0; .title { margin: 0; } &:hover { opacity: .5; } > a { color: red; } }";
        assert_eq!(
            compile(source).unwrap(),
            ".card{padding:0}.card .title{margin:0}.card:hover{opacity:.5}.card>a{color:red}"
        );
    }

    #[test]
    fn selector_lists_combine() {
        let source = ".a, .b { .c { x: 1; } }";
        assert_eq!(compile(source).unwrap(), ".a .c,.b .c{x:1}");
    }

    #[test]
    fn interpolation_in_selectors_and_properties() {
        let source = "@name: banner; @side: left; .@{name} { margin-@{side}: 0; }";
        assert_eq!(compile(source).unwrap(), ".banner{margin-left:0}");
    }

    #[test]
    fn interpolation_in_strings_and_escapes() {
        let source = "@img: \"hero\"; .a { background: url(\"/img/@{img}.png\"); width: ~\"calc(100% - 2px)\"; }";
        assert_eq!(
            compile(source).unwrap(),
            ".a{background:url(\"/img/hero.png\");width:calc(100% - 2px)}"
        );
    }

    #[test]
    fn media_query_bubbles_parent_selector() {
        let source = "@w: 600px; .a { color: red; @media (max-width: @w) { color: blue; } }";
        assert_eq!(
            compile(source).unwrap(),
            ".a{color:red}@media (max-width:600px){.a{color:blue}}"
        );
    }

    #[test]
    fn top_level_at_rules() {
        let source = "@charset \"UTF-8\";\n@import url(https://example.org/a.css);\n@font-face { font-family: X; src: url(x.woff2); }";
        assert_eq!(
            compile(source).unwrap(),
            "@charset \"UTF-8\";@import url(https://example.org/a.css);@font-face{font-family:X;src:url(x.woff2)}"
        );
    }

    #[test]
    fn comments_are_removed() {
        let source = "/* header */\n// line comment\na { color: red; /* inline */ background: url(http://x/y.png); }";
        assert_eq!(compile(source).unwrap(), "a{color:red;background:url(http://x/y.png)}");
    }

    #[test]
    fn empty_rules_are_dropped() {
        assert_eq!(compile(".a { } .b { .c { } }").unwrap(), "");
    }

    #[test]
    fn undefined_variable_fails() {
        let err = compile("a {\n color: @missing;\n}").unwrap_err();
        assert_eq!(
            err,
            CompileError::UndefinedVariable {
                name: "missing".to_string(),
                line: 2
            }
        );
    }

    #[test]
    fn recursive_variable_fails() {
        let err = compile("@a: @b; @b: @a; x { y: @a; }").unwrap_err();
        assert!(matches!(err, CompileError::RecursiveVariable { .. }));
    }

    #[test]
    fn unbalanced_braces_fail() {
        assert!(matches!(compile("a { color: red;"), Err(CompileError::Syntax { line: 1, .. })));
        assert!(matches!(compile("a { color: red; } }"), Err(CompileError::Syntax { .. })));
    }

    #[test]
    fn mixins_are_unsupported() {
        assert!(matches!(compile(".a { .b; }"), Err(CompileError::Unsupported { .. })));
        assert!(matches!(
            compile(".m(@x) { width: @x; }"),
            Err(CompileError::Unsupported { .. })
        ));
    }

    #[test]
    fn top_level_declaration_fails() {
        assert!(matches!(compile("color: red;"), Err(CompileError::Syntax { .. })));
    }

    #[test]
    fn check_syntax_ignores_undefined_variables() {
        let compiler = LessCompiler::new();
        assert!(compiler.check_syntax("a { color: @from-application; }").is_ok());
        assert!(compiler.check_syntax("a { color: red;").is_err());
    }

    #[test]
    fn compilation_is_stateless() {
        let compiler = LessCompiler::new();
        let mut vars = Variables::new();
        vars.insert("c".to_string(), "green".to_string());
        let first = compiler.compile("@c: blue; a{color:@c}", &vars).unwrap();
        let plain = compiler.compile("@c: blue; a{color:@c}", &Variables::new()).unwrap();
        let again = compiler.compile("@c: blue; a{color:@c}", &vars).unwrap();
        assert_eq!(first, "a{color:green}");
        assert_eq!(plain, "a{color:blue}");
        assert_eq!(first, again);
    }
}
