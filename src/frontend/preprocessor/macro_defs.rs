//! Macro definitions for the C preprocessor.
//!
//! Supports:
//! - Object-like macros: `#define FOO value`
//! - Function-like macros: `#define MAX(a,b) ((a)>(b)?(a):(b))`
//! - Variadic macros: `#define LOG(fmt, ...) printf(fmt, __VA_ARGS__)`
//! - Stringification: `#param`
//! - Token pasting: `a ## b`
//!
//! Unlike a textual preprocessor, definitions are stored as token vectors
//! whose spans point into the defining file. Those spans are what the
//! expansion-to-AST alignment ultimately compares against.

use rustc_hash::FxHashMap;

use crate::common::source::Span;
use crate::frontend::lexer::{Token, TokenKind};

/// Represents a macro definition.
#[derive(Debug, Clone)]
pub struct MacroDef {
    /// Name of the macro.
    pub name: String,
    /// Whether this is a function-like macro.
    pub is_function_like: bool,
    /// Parameters for function-like macros.
    pub params: Vec<String>,
    /// Whether the macro is variadic (last declared parameter is `...`,
    /// accessed in the body as `__VA_ARGS__`).
    pub is_variadic: bool,
    /// The replacement list, spelled in the defining file.
    pub body: Vec<Token>,
    /// Location of the macro name in the `#define`. Invalid for builtin
    /// macros that have no written definition.
    pub name_span: Span,
    /// The range the definition spans: the name through the last
    /// replacement token.
    pub definition_range: Span,
}

impl MacroDef {
    /// A builtin macro (`__LINE__`, `__FILE__`): no parameters, an empty
    /// replacement list, and a definition location in a pseudo-file.
    pub fn builtin(name: &str, name_span: Span) -> Self {
        Self {
            name: name.to_string(),
            is_function_like: false,
            params: Vec::new(),
            is_variadic: false,
            body: Vec::new(),
            name_span,
            definition_range: name_span,
        }
    }
}

/// Stores all macro definitions.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: FxHashMap<String, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self { macros: FxHashMap::default() }
    }

    /// Define a new macro. Redefinition replaces the previous entry.
    pub fn define(&mut self, def: MacroDef) {
        self.macros.insert(def.name.clone(), def);
    }

    /// Undefine a macro.
    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    /// Check if a macro is defined.
    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Get a macro definition.
    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    /// Iterate over all macro definitions.
    pub fn iter(&self) -> impl Iterator<Item = &MacroDef> {
        self.macros.values()
    }
}

/// Parse the token list of a `#define` directive line (everything after the
/// `define` keyword) into a [`MacroDef`]. Returns None for malformed lines.
pub fn parse_define(line: &[Token]) -> Option<MacroDef> {
    let name_tok = line.first()?;
    let name = name_tok.ident()?.to_string();
    let name_span = name_tok.span;

    let mut i = 1;
    let mut is_function_like = false;
    let mut is_variadic = false;
    let mut params = Vec::new();

    // Function-like only when the paren is glued to the name.
    if let Some(tok) = line.get(i) {
        if tok.kind == TokenKind::LParen && tok.span.start == name_span.end {
            is_function_like = true;
            i += 1;
            loop {
                match line.get(i) {
                    Some(t) if t.kind == TokenKind::RParen => {
                        i += 1;
                        break;
                    }
                    Some(t) if t.kind == TokenKind::Ellipsis => {
                        is_variadic = true;
                        i += 1;
                    }
                    Some(t) if t.kind == TokenKind::Comma => i += 1,
                    Some(t) => {
                        params.push(t.ident()?.to_string());
                        i += 1;
                    }
                    None => return None,
                }
            }
        }
    }

    let body: Vec<Token> = line[i..].to_vec();
    let definition_range = body
        .last()
        .map(|t| name_span.merge(t.span))
        .unwrap_or(name_span);

    Some(MacroDef {
        name,
        is_function_like,
        params,
        is_variadic,
        body,
        name_span,
        definition_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn toks(src: &str) -> Vec<Token> {
        Lexer::new(src, 0).lex().unwrap()
    }

    #[test]
    fn object_like_define() {
        let line = toks("ZERO 0");
        let def = parse_define(&line).unwrap();
        assert_eq!(def.name, "ZERO");
        assert!(!def.is_function_like);
        assert_eq!(def.body.len(), 1);
        assert_eq!(def.definition_range.end, 6);
    }

    #[test]
    fn function_like_define() {
        let line = toks("ADD(a,b) ((a)+(b))");
        let def = parse_define(&line).unwrap();
        assert!(def.is_function_like);
        assert_eq!(def.params, vec!["a", "b"]);
        assert_eq!(def.body.len(), 9);
    }

    #[test]
    fn spaced_paren_is_object_like() {
        let line = toks("NOT_FN (x)");
        let def = parse_define(&line).unwrap();
        assert!(!def.is_function_like);
        assert_eq!(def.body.len(), 3);
    }

    #[test]
    fn variadic_define() {
        let line = toks("LOG(fmt, ...) printf(fmt, __VA_ARGS__)");
        let def = parse_define(&line).unwrap();
        assert!(def.is_variadic);
        assert_eq!(def.params, vec!["fmt"]);
    }
}
