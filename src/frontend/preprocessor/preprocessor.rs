//! Token-based C preprocessor with observer callbacks.
//!
//! The engine expands macros over token vectors rather than text so that
//! every output token keeps its spelling span and the stack of expansion
//! instances it passed through. That provenance is what the downstream
//! alignment matcher compares against macro definition tokens.
//!
//! Expansion follows C11 6.10.3: arguments are fully expanded before
//! substitution (`#`/`##` operands use the raw tokens), the substituted
//! body is rescanned with the macro's own name suppressed, and suppressed
//! names are painted so they never re-expand.
//!
//! Observers register through [`PpCallbacks`] and receive definition,
//! expansion begin/end (with argument records), include, and
//! conditional-inspection events while preprocessing runs.

use tracing::{debug, warn};

use crate::common::error::{AnalysisError, Result};
use crate::common::source::{SourceManager, Span};
use crate::frontend::lexer::{Lexer, Token, TokenKind};

use super::expr_eval::eval_condition;
use super::includes::FileLoader;
use super::macro_defs::{parse_define, MacroDef, MacroTable};

/// Identifies one macro-expansion instance within a translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpansionId(pub u32);

/// One level of a token's expansion provenance: the instance that produced
/// the token and the span of that instance's invocation in the enclosing
/// spelling context.
#[derive(Debug, Clone, Copy)]
pub struct ExpCtx {
    pub exp: ExpansionId,
    pub call_span: Span,
}

/// A preprocessed token: the token itself (spelling span included) plus its
/// expansion-context stack, innermost first. Tokens lexed straight from a
/// file have an empty stack.
#[derive(Debug, Clone)]
pub struct PpToken {
    pub tok: Token,
    pub ctx: Vec<ExpCtx>,
    /// Painted by the rescanner when the token names a macro that is
    /// currently expanding; painted tokens never expand again.
    pub no_expand: bool,
}

impl PpToken {
    pub fn from_file(tok: Token) -> Self {
        Self { tok, ctx: Vec::new(), no_expand: false }
    }

    /// The outermost file-level span this token is attributed to: the
    /// top-level invocation for expanded tokens, the token's own span
    /// otherwise.
    pub fn file_span(&self) -> Span {
        self.ctx.last().map(|e| e.call_span).unwrap_or(self.tok.span)
    }

    /// Position of `exp` on the context stack, if the token passed through
    /// that expansion instance.
    pub fn ctx_level(&self, exp: ExpansionId) -> Option<usize> {
        self.ctx.iter().position(|e| e.exp == exp)
    }

    /// The spelling of this token as seen from inside expansion `exp`:
    /// its own span when `exp` is the innermost context, otherwise the
    /// invocation span of the next-inner context. None when the token never
    /// passed through `exp`.
    pub fn spelling_within(&self, exp: ExpansionId) -> Option<Span> {
        match self.ctx_level(exp)? {
            0 => Some(self.tok.span),
            level => Some(self.ctx[level - 1].call_span),
        }
    }
}

/// Argument descriptor recorded for one formal parameter of an invocation.
#[derive(Debug, Clone)]
pub struct ArgRecord {
    pub name: String,
    /// The exact pre-expansion tokens the caller supplied.
    pub tokens: Vec<PpToken>,
    /// How many times the parameter was substituted into the body.
    pub num_expansions: usize,
}

/// Data for an expansion-begin event.
pub struct ExpansionBeginEvent<'a> {
    pub id: ExpansionId,
    pub name: &'a str,
    pub def: &'a MacroDef,
    /// The range the developer typed: the macro name for object-like
    /// invocations, name through closing paren for function-like ones.
    pub spelling_span: Span,
    /// True when this expansion happened while an enclosing invocation was
    /// expanding one of its arguments.
    pub in_macro_arg: bool,
}

/// Preprocessor observer interface.
///
/// All methods default to no-ops so observers implement only what they
/// need, and several observers can be registered side by side.
pub trait PpCallbacks {
    fn macro_defined(&mut self, _name: &str, _def: &MacroDef) {}
    fn macro_undefined(&mut self, _name: &str) {}
    fn expansion_begin(&mut self, _event: &ExpansionBeginEvent<'_>) {}
    fn expansion_end(&mut self, _id: ExpansionId, _args: &[ArgRecord]) {}
    /// An `#include` directive was seen; `file_id` is the resolved file or
    /// None when resolution failed.
    fn include_directive(&mut self, _hash_span: Span, _file_id: Option<u32>) {}
    /// A macro name was inspected by `#ifdef`, `#ifndef`, or `defined(...)`.
    fn macro_name_inspected(&mut self, _name: &str) {}
}

struct CondFrame {
    parent_active: bool,
    active: bool,
    taken: bool,
    seen_else: bool,
}

const MAX_INCLUDE_DEPTH: usize = 200;

pub struct Preprocessor<'a> {
    sm: &'a mut SourceManager,
    loader: &'a dyn FileLoader,
    callbacks: Vec<&'a mut dyn PpCallbacks>,
    pub macros: MacroTable,
    /// Names of macros currently being rescanned; occurrences get painted.
    expanding: Vec<String>,
    next_expansion_id: u32,
    cond_stack: Vec<CondFrame>,
    /// Set while expanding conditional-directive conditions, whose
    /// expansions do not participate in the macro forest.
    suppress_events: bool,
    include_depth: usize,
    output: Vec<PpToken>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(
        sm: &'a mut SourceManager,
        loader: &'a dyn FileLoader,
        callbacks: Vec<&'a mut dyn PpCallbacks>,
    ) -> Self {
        let mut pp = Self {
            sm,
            loader,
            callbacks,
            macros: MacroTable::new(),
            expanding: Vec::new(),
            next_expansion_id: 0,
            cond_stack: Vec::new(),
            suppress_events: false,
            include_depth: 0,
            output: Vec::new(),
        };
        pp.register_builtins();
        pp
    }

    /// Register `__LINE__` and `__FILE__` in a `<builtin>` pseudo-file.
    /// Their definition locations deliberately fail full-source-location
    /// rendering, like any compiler-provided macro.
    fn register_builtins(&mut self) {
        let content = "__LINE__ __FILE__".to_string();
        let fid = self.sm.add_pseudo_file("<builtin>", content);
        let line_span = Span::new(0, 8, fid);
        let file_span = Span::new(9, 17, fid);
        for (name, span) in [("__LINE__", line_span), ("__FILE__", file_span)] {
            let def = MacroDef::builtin(name, span);
            for cb in self.callbacks.iter_mut() {
                cb.macro_defined(name, &def);
            }
            self.macros.define(def);
        }
    }

    /// Register a `-D name[=value]` command-line definition in a
    /// `<command line>` pseudo-file.
    pub fn add_command_line_define(&mut self, spec: &str) -> Result<()> {
        let text = match spec.split_once('=') {
            Some((name, value)) => format!("{} {}", name, value),
            None => format!("{} 1", spec),
        };
        let fid = self.sm.add_pseudo_file("<command line>", text.clone());
        let line = Lexer::new(&text, fid).lex()?;
        if let Some(def) = parse_define(&line) {
            for cb in self.callbacks.iter_mut() {
                cb.macro_defined(&def.name, &def);
            }
            self.macros.define(def);
        }
        Ok(())
    }

    /// Preprocess the registered main file, returning the translation
    /// unit's token stream.
    pub fn run_main(mut self, file_id: u32) -> Result<Vec<PpToken>> {
        self.process_file(file_id)?;
        Ok(self.output)
    }

    fn is_active(&self) -> bool {
        self.cond_stack.last().map_or(true, |f| f.active)
    }

    fn fresh_id(&mut self) -> ExpansionId {
        let id = ExpansionId(self.next_expansion_id);
        self.next_expansion_id += 1;
        id
    }

    fn fire_begin(&mut self, event: &ExpansionBeginEvent<'_>) {
        if self.suppress_events {
            return;
        }
        for cb in self.callbacks.iter_mut() {
            cb.expansion_begin(event);
        }
    }

    fn fire_end(&mut self, id: ExpansionId, args: &[ArgRecord]) {
        if self.suppress_events {
            return;
        }
        for cb in self.callbacks.iter_mut() {
            cb.expansion_end(id, args);
        }
    }

    fn fire_inspected(&mut self, name: &str) {
        for cb in self.callbacks.iter_mut() {
            cb.macro_name_inspected(name);
        }
    }

    fn preprocess_error(&self, span: Span, message: impl Into<String>) -> AnalysisError {
        AnalysisError::Preprocess {
            loc: self.sm.resolve_span(span),
            message: message.into(),
        }
    }

    // ---- file processing -------------------------------------------------

    fn process_file(&mut self, file_id: u32) -> Result<()> {
        if self.include_depth > MAX_INCLUDE_DEPTH {
            return Err(AnalysisError::Preprocess {
                loc: self.sm.resolve_span(Span::new(0, 0, file_id)),
                message: "include depth limit exceeded".to_string(),
            });
        }
        let content = self.sm.get_content(file_id).to_string();
        let tokens = Lexer::new(&content, file_id).lex()?;

        let mut i = 0;
        while i < tokens.len() {
            let t = &tokens[i];
            if t.starts_line && t.kind == TokenKind::Hash {
                let line_end = Self::line_end(&tokens, i);
                self.handle_directive(t, &tokens[i + 1..line_end], file_id)?;
                i = line_end;
            } else if !self.is_active() {
                i += 1;
            } else {
                let run_end = Self::run_end(&tokens, i);
                let run: Vec<PpToken> =
                    tokens[i..run_end].iter().cloned().map(PpToken::from_file).collect();
                let expanded = self.expand_token_list(run, false);
                self.output.extend(expanded);
                i = run_end;
            }
        }
        Ok(())
    }

    /// Index one past the last token of the directive line starting at `i`.
    fn line_end(tokens: &[Token], i: usize) -> usize {
        let mut j = i + 1;
        while j < tokens.len() && !tokens[j].starts_line {
            j += 1;
        }
        j
    }

    /// Index of the next directive hash at or after `i`, or the stream end.
    fn run_end(tokens: &[Token], i: usize) -> usize {
        let mut j = i + 1;
        while j < tokens.len() && !(tokens[j].starts_line && tokens[j].kind == TokenKind::Hash) {
            j += 1;
        }
        j
    }

    // ---- directives ------------------------------------------------------

    fn handle_directive(&mut self, hash: &Token, line: &[Token], file_id: u32) -> Result<()> {
        let name = match line.first().and_then(|t| t.ident()) {
            Some(name) => name.to_string(),
            // Null directive or something unrecognizable; both are ignored.
            None => return Ok(()),
        };
        let rest = &line[1..];
        match name.as_str() {
            "define" if self.is_active() => {
                if let Some(def) = parse_define(rest) {
                    debug!(macro_name = %def.name, "defined");
                    for cb in self.callbacks.iter_mut() {
                        cb.macro_defined(&def.name, &def);
                    }
                    self.macros.define(def);
                }
            }
            "undef" if self.is_active() => {
                if let Some(name) = rest.first().and_then(|t| t.ident()) {
                    let name = name.to_string();
                    self.macros.undefine(&name);
                    for cb in self.callbacks.iter_mut() {
                        cb.macro_undefined(&name);
                    }
                }
            }
            "include" if self.is_active() => {
                self.handle_include(hash, rest, file_id)?;
            }
            "if" => {
                let parent_active = self.is_active();
                let cond = parent_active && self.eval_directive_condition(rest);
                self.cond_stack.push(CondFrame {
                    parent_active,
                    active: parent_active && cond,
                    taken: cond,
                    seen_else: false,
                });
            }
            "ifdef" | "ifndef" => {
                let parent_active = self.is_active();
                let mut cond = false;
                if let Some(macro_name) = rest.first().and_then(|t| t.ident()) {
                    if parent_active {
                        let macro_name = macro_name.to_string();
                        self.fire_inspected(&macro_name);
                        cond = self.macros.is_defined(&macro_name);
                    }
                }
                if name == "ifndef" {
                    cond = !cond;
                }
                self.cond_stack.push(CondFrame {
                    parent_active,
                    active: parent_active && cond,
                    taken: cond,
                    seen_else: false,
                });
            }
            "elif" => {
                let cond_rest: Vec<Token> = rest.to_vec();
                if let Some(top) = self.cond_stack.last() {
                    let parent_active = top.parent_active;
                    let taken = top.taken;
                    let seen_else = top.seen_else;
                    let cond = parent_active
                        && !taken
                        && !seen_else
                        && self.eval_directive_condition(&cond_rest);
                    let top = self.cond_stack.last_mut().unwrap();
                    top.active = cond;
                    top.taken = top.taken || cond;
                }
            }
            "else" => {
                if let Some(top) = self.cond_stack.last_mut() {
                    top.active = top.parent_active && !top.taken && !top.seen_else;
                    top.taken = true;
                    top.seen_else = true;
                }
            }
            "endif" => {
                self.cond_stack.pop();
            }
            "error" if self.is_active() => {
                let text = rest.iter().map(|t| t.kind.text()).collect::<Vec<_>>().join(" ");
                return Err(self.preprocess_error(hash.span, format!("#error {}", text)));
            }
            "warning" if self.is_active() => {
                let text = rest.iter().map(|t| t.kind.text()).collect::<Vec<_>>().join(" ");
                warn!("#warning {}", text);
            }
            // #pragma and #line carry nothing the analysis consumes.
            "pragma" | "line" => {}
            _ => {}
        }
        Ok(())
    }

    /// Evaluate an `#if`/`#elif` condition: replace `defined`, expand what
    /// remains without forest events, then fold the constant expression.
    fn eval_directive_condition(&mut self, rest: &[Token]) -> bool {
        let mut replaced: Vec<Token> = Vec::with_capacity(rest.len());
        let mut i = 0;
        while i < rest.len() {
            if rest[i].ident() == Some("defined") {
                let (name, consumed) = match rest.get(i + 1) {
                    Some(t) if t.kind == TokenKind::LParen => match rest.get(i + 2) {
                        Some(n) if n.ident().is_some() => (n.ident().unwrap().to_string(), 4),
                        _ => (String::new(), 2),
                    },
                    Some(n) if n.ident().is_some() => (n.ident().unwrap().to_string(), 2),
                    _ => (String::new(), 1),
                };
                let value = if name.is_empty() {
                    0
                } else {
                    self.fire_inspected(&name);
                    self.macros.is_defined(&name) as i64
                };
                replaced.push(Token::new(TokenKind::IntLiteral(value), rest[i].span, false));
                i += consumed;
            } else {
                replaced.push(rest[i].clone());
                i += 1;
            }
        }

        self.suppress_events = true;
        let expanded = self.expand_token_list(
            replaced.into_iter().map(PpToken::from_file).collect(),
            false,
        );
        self.suppress_events = false;

        let kinds: Vec<TokenKind> = expanded.into_iter().map(|t| t.tok.kind).collect();
        eval_condition(&kinds)
    }

    fn handle_include(&mut self, hash: &Token, rest: &[Token], file_id: u32) -> Result<()> {
        let Some((name, is_angled)) = self.parse_include_name(rest, file_id) else {
            warn!("unparseable #include directive");
            for cb in self.callbacks.iter_mut() {
                cb.include_directive(hash.span, None);
            }
            return Ok(());
        };

        let including_dir = self
            .sm
            .real_path(file_id)
            .or(Some(self.sm.get_filename(file_id)))
            .map(|p| {
                std::path::Path::new(p)
                    .parent()
                    .map(|d| d.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        match self.loader.load(&name, is_angled, including_dir.as_deref()) {
            Some(loaded) => {
                let new_fid = self.sm.add_file(loaded.name, loaded.real_path, loaded.content);
                self.sm.set_include_origin(new_fid, file_id, hash.span.start);
                for cb in self.callbacks.iter_mut() {
                    cb.include_directive(hash.span, Some(new_fid));
                }
                debug!(include = %name, "entering include");
                self.include_depth += 1;
                let result = self.process_file(new_fid);
                self.include_depth -= 1;
                result
            }
            None => {
                warn!(include = %name, "include not found");
                for cb in self.callbacks.iter_mut() {
                    cb.include_directive(hash.span, None);
                }
                Ok(())
            }
        }
    }

    fn parse_include_name(&self, rest: &[Token], file_id: u32) -> Option<(String, bool)> {
        match rest.first().map(|t| &t.kind) {
            Some(TokenKind::StringLiteral(s)) => Some((s.clone(), false)),
            Some(TokenKind::Less) => {
                let close = rest.iter().position(|t| t.kind == TokenKind::Greater)?;
                let span = Span::new(rest[0].span.end, rest[close].span.start, file_id);
                Some((self.sm.span_text(span).trim().to_string(), true))
            }
            _ => None,
        }
    }

    // ---- macro expansion -------------------------------------------------

    /// Expand every macro invocation in `input`. `in_arg` is true while the
    /// list being expanded is an argument of an enclosing invocation.
    fn expand_token_list(&mut self, input: Vec<PpToken>, in_arg: bool) -> Vec<PpToken> {
        let mut out: Vec<PpToken> = Vec::with_capacity(input.len());
        let mut i = 0;
        while i < input.len() {
            let t = &input[i];
            let name = match t.tok.ident() {
                Some(name) if !t.no_expand => name.to_string(),
                _ => {
                    out.push(t.clone());
                    i += 1;
                    continue;
                }
            };

            if self.expanding.iter().any(|n| n == &name) {
                // Self-referential use during rescanning: paint it so it
                // survives all later rescans unexpanded (C11 6.10.3.4).
                let mut painted = t.clone();
                painted.no_expand = true;
                out.push(painted);
                i += 1;
                continue;
            }

            let Some(def) = self.macros.get(&name).cloned() else {
                out.push(t.clone());
                i += 1;
                continue;
            };

            if !def.is_function_like {
                if matches!(name.as_str(), "__LINE__" | "__FILE__") {
                    let expanded = self.expand_builtin(t, &def, in_arg);
                    out.extend(expanded);
                } else {
                    let expanded = self.expand_object_macro(t, &def, in_arg);
                    out.extend(expanded);
                }
                i += 1;
                continue;
            }

            // Function-like: only an invocation when followed by `(`.
            if input.get(i + 1).map(|n| n.tok.kind == TokenKind::LParen) != Some(true) {
                out.push(t.clone());
                i += 1;
                continue;
            }
            match Self::parse_invocation_args(&input, i + 1) {
                Some((args, commas, rparen_idx)) => {
                    let invocation_span = t.tok.span.merge(input[rparen_idx].tok.span);
                    let expanded =
                        self.expand_function_macro(t, &def, args, commas, invocation_span, in_arg);
                    out.extend(expanded);
                    i = rparen_idx + 1;
                }
                None => {
                    // Unterminated invocation; keep the name and move on.
                    out.push(t.clone());
                    i += 1;
                }
            }
        }
        out
    }

    /// Split invocation arguments at top-level commas, starting at the
    /// opening paren. Returns the argument token lists, the comma tokens
    /// between them, and the index of the closing paren.
    #[allow(clippy::type_complexity)]
    fn parse_invocation_args(
        input: &[PpToken],
        lparen_idx: usize,
    ) -> Option<(Vec<Vec<PpToken>>, Vec<PpToken>, usize)> {
        let mut args: Vec<Vec<PpToken>> = Vec::new();
        let mut commas: Vec<PpToken> = Vec::new();
        let mut cur: Vec<PpToken> = Vec::new();
        let mut depth = 0usize;
        let mut i = lparen_idx + 1;
        loop {
            let t = input.get(i)?;
            match t.tok.kind {
                TokenKind::LParen => {
                    depth += 1;
                    cur.push(t.clone());
                }
                TokenKind::RParen => {
                    if depth == 0 {
                        args.push(cur);
                        return Some((args, commas, i));
                    }
                    depth -= 1;
                    cur.push(t.clone());
                }
                TokenKind::Comma if depth == 0 => {
                    args.push(std::mem::take(&mut cur));
                    commas.push(t.clone());
                }
                _ => cur.push(t.clone()),
            }
            i += 1;
        }
    }

    /// Build the context stack for a token emitted by expansion `id`: the
    /// new entry slots in just inside the invocation-site context the token
    /// inherited, keeping the stack ordered innermost-first.
    fn with_expansion_ctx(
        mut ctx: Vec<ExpCtx>,
        id: ExpansionId,
        call_span: Span,
        caller_ctx_len: usize,
    ) -> Vec<ExpCtx> {
        let split = ctx.len().saturating_sub(caller_ctx_len);
        ctx.insert(split, ExpCtx { exp: id, call_span });
        ctx
    }

    fn expand_builtin(&mut self, name_tok: &PpToken, def: &MacroDef, in_arg: bool) -> Vec<PpToken> {
        let id = self.fresh_id();
        let spelling = name_tok.tok.span;
        self.fire_begin(&ExpansionBeginEvent {
            id,
            name: &def.name,
            def,
            spelling_span: spelling,
            in_macro_arg: in_arg,
        });
        let file_span = name_tok.file_span();
        let kind = if def.name == "__LINE__" {
            TokenKind::IntLiteral(self.sm.resolve_span(file_span).line as i64)
        } else {
            TokenKind::StringLiteral(self.sm.get_filename(file_span.file_id).to_string())
        };
        let tok = PpToken {
            tok: Token::new(kind, name_tok.tok.span, false),
            ctx: Self::with_expansion_ctx(
                name_tok.ctx.clone(),
                id,
                spelling,
                name_tok.ctx.len(),
            ),
            no_expand: false,
        };
        self.fire_end(id, &[]);
        vec![tok]
    }

    fn expand_object_macro(
        &mut self,
        name_tok: &PpToken,
        def: &MacroDef,
        in_arg: bool,
    ) -> Vec<PpToken> {
        let id = self.fresh_id();
        let spelling = name_tok.tok.span;
        debug!(macro_name = %def.name, ?id, "expanding object-like macro");
        self.fire_begin(&ExpansionBeginEvent {
            id,
            name: &def.name,
            def,
            spelling_span: spelling,
            in_macro_arg: in_arg,
        });

        let mut records: Vec<ArgRecord> = Vec::new();
        let substituted =
            self.substitute_body(def, &[], &[], &mut records, id, spelling, &name_tok.ctx);

        self.expanding.push(def.name.clone());
        let result = self.expand_token_list(substituted, in_arg);
        self.expanding.pop();

        self.fire_end(id, &records);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_function_macro(
        &mut self,
        name_tok: &PpToken,
        def: &MacroDef,
        mut raw_args: Vec<Vec<PpToken>>,
        commas: Vec<PpToken>,
        invocation_span: Span,
        in_arg: bool,
    ) -> Vec<PpToken> {
        let id = self.fresh_id();
        debug!(macro_name = %def.name, ?id, "expanding function-like macro");
        self.fire_begin(&ExpansionBeginEvent {
            id,
            name: &def.name,
            def,
            spelling_span: invocation_span,
            in_macro_arg: in_arg,
        });

        let named = def.params.len();
        // `F()` lexes as one empty argument; a zero-parameter macro takes none.
        if named == 0 && !def.is_variadic && raw_args.len() == 1 && raw_args[0].is_empty() {
            raw_args.clear();
        }

        // All trailing call tokens form the single variadic argument,
        // rejoined over the commas the caller actually wrote.
        let mut effective: Vec<Vec<PpToken>> = Vec::with_capacity(named + 1);
        for k in 0..named {
            effective.push(raw_args.get(k).cloned().unwrap_or_default());
        }
        if def.is_variadic {
            let mut va: Vec<PpToken> = Vec::new();
            for (k, arg) in raw_args.iter().enumerate().skip(named) {
                if k > named {
                    if let Some(comma) = commas.get(k - 1) {
                        va.push(comma.clone());
                    }
                }
                va.extend(arg.iter().cloned());
            }
            effective.push(va);
        }

        let mut records: Vec<ArgRecord> = Vec::with_capacity(effective.len());
        for (k, tokens) in effective.iter().enumerate() {
            let name = if k < named {
                def.params[k].clone()
            } else {
                "__VA_ARGS__".to_string()
            };
            records.push(ArgRecord { name, tokens: tokens.clone(), num_expansions: 0 });
        }

        // Prescan: arguments are fully expanded before substitution.
        // Expansions fired here carry the in-macro-argument flag.
        let expanded_args: Vec<Vec<PpToken>> = effective
            .iter()
            .map(|arg| self.expand_token_list(arg.clone(), true))
            .collect();

        let substituted = self.substitute_body(
            def,
            &effective,
            &expanded_args,
            &mut records,
            id,
            invocation_span,
            &name_tok.ctx,
        );

        self.expanding.push(def.name.clone());
        let result = self.expand_token_list(substituted, in_arg);
        self.expanding.pop();

        self.fire_end(id, &records);
        result
    }

    /// Which formal parameter an identifier names: named parameters first,
    /// then `__VA_ARGS__` as the trailing slot of variadic macros.
    fn param_index(def: &MacroDef, tok: &Token) -> Option<usize> {
        let name = tok.ident()?;
        if let Some(k) = def.params.iter().position(|p| p == name) {
            return Some(k);
        }
        (def.is_variadic && name == "__VA_ARGS__").then_some(def.params.len())
    }

    /// Substitute parameters into the macro body, handling `#` and `##`.
    /// Per C11 6.10.3.1, `#`/`##` operands use the raw argument tokens;
    /// plain occurrences use the prescanned ones and bump the argument's
    /// expansion count.
    #[allow(clippy::too_many_arguments)]
    fn substitute_body(
        &mut self,
        def: &MacroDef,
        raw_args: &[Vec<PpToken>],
        expanded_args: &[Vec<PpToken>],
        records: &mut [ArgRecord],
        id: ExpansionId,
        call_span: Span,
        caller_ctx: &[ExpCtx],
    ) -> Vec<PpToken> {
        let mut out: Vec<PpToken> = Vec::with_capacity(def.body.len());
        let body = &def.body;
        let mut j = 0;

        let body_token = |tok: &Token| PpToken {
            tok: tok.clone(),
            ctx: {
                let mut ctx = caller_ctx.to_vec();
                ctx.insert(0, ExpCtx { exp: id, call_span });
                ctx
            },
            no_expand: false,
        };

        while j < body.len() {
            let t = &body[j];

            // Stringification: # param
            if t.kind == TokenKind::Hash {
                if let Some(k) = body.get(j + 1).and_then(|n| Self::param_index(def, n)) {
                    let text = stringify_tokens(raw_args.get(k).map(|v| v.as_slice()).unwrap_or(&[]));
                    let mut st = body_token(t);
                    st.tok.kind = TokenKind::StringLiteral(text);
                    out.push(st);
                    j += 2;
                    continue;
                }
            }

            // Token pasting: lhs ## rhs
            if t.kind == TokenKind::HashHash {
                let lhs = out.pop();
                let rhs_raw: Vec<PpToken> = match body.get(j + 1) {
                    Some(n) => match Self::param_index(def, n) {
                        Some(k) => raw_args
                            .get(k)
                            .map(|v| {
                                v.iter()
                                    .map(|a| {
                                        let mut a = a.clone();
                                        a.ctx = Self::with_expansion_ctx(
                                            a.ctx,
                                            id,
                                            call_span,
                                            caller_ctx.len(),
                                        );
                                        a
                                    })
                                    .collect()
                            })
                            .unwrap_or_default(),
                        None => vec![body_token(n)],
                    },
                    None => Vec::new(),
                };
                out.extend(paste_tokens(lhs, rhs_raw));
                j += 2;
                continue;
            }

            // Plain parameter substitution.
            if let Some(k) = Self::param_index(def, t) {
                // A parameter directly left of ## uses its raw tokens.
                let next_is_paste = body.get(j + 1).map(|n| n.kind == TokenKind::HashHash)
                    == Some(true);
                let source = if next_is_paste {
                    raw_args.get(k)
                } else {
                    expanded_args.get(k)
                };
                if let Some(tokens) = source {
                    for a in tokens {
                        let mut a = a.clone();
                        a.ctx =
                            Self::with_expansion_ctx(a.ctx, id, call_span, caller_ctx.len());
                        out.push(a);
                    }
                }
                if !next_is_paste {
                    if let Some(rec) = records.get_mut(k) {
                        rec.num_expansions += 1;
                    }
                }
                j += 1;
                continue;
            }

            out.push(body_token(t));
            j += 1;
        }
        out
    }
}

/// Stringify raw argument tokens per C11 6.10.3.2, reduced to single-space
/// separation.
fn stringify_tokens(tokens: &[PpToken]) -> String {
    tokens
        .iter()
        .map(|t| t.tok.kind.text())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Paste the last already-substituted token with the first token of `rhs`.
/// A paste producing no single valid token keeps both halves, matching the
/// permissive behavior real code depends on more than diagnostics.
fn paste_tokens(lhs: Option<PpToken>, mut rhs: Vec<PpToken>) -> Vec<PpToken> {
    let Some(lhs) = lhs else { return rhs };
    if rhs.is_empty() {
        return vec![lhs];
    }
    let first = rhs.remove(0);
    let pasted_text = format!("{}{}", lhs.tok.kind.text(), first.tok.kind.text());
    let mut result = Vec::with_capacity(rhs.len() + 1);
    match Lexer::new(&pasted_text, lhs.tok.span.file_id).lex() {
        Ok(mut toks) if toks.len() == 1 => {
            let kind = toks.remove(0).kind;
            result.push(PpToken {
                tok: Token::new(kind, lhs.tok.span, false),
                ctx: lhs.ctx,
                no_expand: false,
            });
        }
        _ => {
            result.push(lhs);
            result.push(first);
        }
    }
    result.extend(rhs);
    result
}
