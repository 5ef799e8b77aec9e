//! Cell Parser (§4.2): turns cell source into a `CellAnalysis` of definitions,
//! references, imports, functions, and classes.
//!
//! Ported from the original `dasa.analysis.parser.VariableVisitor`, which
//! walks a real Python AST. This crate has no Python-grammar crate in its
//! dependency pack, so the same decisions (Store → definition, Load →
//! reference unless scope-local, comprehensions/lambdas/function params are
//! locally scoped) are instead made over a `logos` token stream with a small
//! indentation-tracked scope stack — a single pass, no AST.

use crate::parser::builtins::is_builtin;
use crate::parser::lexer::{tokenize_line, Token};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellAnalysis {
    pub definitions: BTreeSet<String>,
    pub references: BTreeSet<String>,
    pub imports: BTreeSet<String>,
    pub functions: BTreeSet<String>,
    pub classes: BTreeSet<String>,
}

const KEYWORDS: &[&str] = &[
    "def", "class", "for", "in", "while", "if", "elif", "else", "with", "as", "import", "from",
    "return", "yield", "lambda", "pass", "break", "continue", "try", "except", "finally", "raise",
    "global", "nonlocal", "del", "assert", "async", "await", "not", "and", "or", "is", "None",
    "True", "False",
];

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

struct ScopeFrame {
    header_indent: usize,
    locals: BTreeSet<String>,
}

/// Parse `source` into a `CellAnalysis`. Never panics: on a scan error this
/// returns an empty analysis rather than raising, matching the original's
/// `except SyntaxError: return CellAnalysis()` fallback.
pub fn analyze(source: &str) -> CellAnalysis {
    let mut definitions: BTreeSet<String> = BTreeSet::new();
    let mut raw_references: BTreeSet<String> = BTreeSet::new();
    let mut imports: BTreeSet<String> = BTreeSet::new();
    let mut functions: BTreeSet<String> = BTreeSet::new();
    let mut classes: BTreeSet<String> = BTreeSet::new();
    let mut scope_locals_all: BTreeSet<String> = BTreeSet::new();
    let mut scope_stack: Vec<ScopeFrame> = Vec::new();

    for raw_line in source.lines() {
        let trimmed_start = raw_line.trim_start();
        if trimmed_start.starts_with('%') || trimmed_start.starts_with('!') || trimmed_start.starts_with('?') {
            continue;
        }
        let line = strip_comment(raw_line);
        if line.trim().is_empty() {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        while let Some(top) = scope_stack.last() {
            if indent <= top.header_indent {
                scope_stack.pop();
            } else {
                break;
            }
        }
        let trimmed = line.trim();

        if let Some((name, params, is_async)) = match_def(trimmed) {
            let _ = is_async;
            definitions.insert(name.clone());
            functions.insert(name);
            let mut locals = BTreeSet::new();
            for p in params {
                locals.insert(p);
            }
            for l in &locals {
                scope_locals_all.insert(l.clone());
            }
            scope_stack.push(ScopeFrame {
                header_indent: indent,
                locals,
            });
            continue;
        }

        if let Some((name, bases)) = match_class(trimmed) {
            definitions.insert(name.clone());
            classes.insert(name);
            if let Some(tokens) = tokenize_line(&bases) {
                for r in scan_references(&tokens) {
                    raw_references.insert(r);
                }
            }
            scope_stack.push(ScopeFrame {
                header_indent: indent,
                locals: BTreeSet::new(),
            });
            continue;
        }

        if let Some((names, module)) = match_import(trimmed) {
            for n in names {
                definitions.insert(n.clone());
                imports.insert(n);
            }
            let _ = module;
            continue;
        }

        if let Some((targets, iterable)) = match_for(trimmed) {
            for t in split_targets(&targets) {
                definitions.insert(t);
            }
            if let Some(tokens) = tokenize_line(&iterable) {
                for r in scan_references(&tokens) {
                    raw_references.insert(r);
                }
            }
            continue;
        }

        // with ... as NAME[, ... as NAME2]:
        if trimmed.starts_with("with ") {
            for as_name in find_as_targets(trimmed) {
                definitions.insert(as_name);
            }
        }

        let Some(tokens) = tokenize_line(trimmed) else {
            return CellAnalysis::default();
        };

        // Walrus targets leak into the enclosing scope like a normal binding.
        for w in walrus_targets(&tokens) {
            definitions.insert(w);
        }

        // Comprehension loop variables, nested anywhere in the line.
        for v in comprehension_targets(trimmed) {
            scope_locals_all.insert(v);
        }

        // Lambda parameters.
        let (lambda_params, _) = lambda_params(&tokens);
        for p in &lambda_params {
            scope_locals_all.insert(p.clone());
        }

        if let Some(assign_idx) = top_level_assign_index(&tokens) {
            let (target_tokens, rhs_tokens) = tokens.split_at(assign_idx);
            let rhs_tokens = &rhs_tokens[1..];
            for group in split_on_token(target_tokens, &Token::Equals) {
                for sub in split_on_token(&group, &Token::Comma) {
                    handle_target(&sub, &mut definitions, &mut raw_references);
                }
            }
            for r in scan_references(rhs_tokens) {
                raw_references.insert(r);
            }
        } else {
            for r in scan_references(&tokens) {
                raw_references.insert(r);
            }
        }
    }

    let references: BTreeSet<String> = raw_references
        .into_iter()
        .filter(|n| !is_builtin(n))
        .filter(|n| !definitions.contains(n))
        .filter(|n| !imports.contains(n))
        .filter(|n| !scope_locals_all.contains(n))
        .collect();

    CellAnalysis {
        definitions,
        references,
        imports,
        functions,
        classes,
    }
}

fn strip_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_string: Option<char> = None;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match in_string {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else if c == q {
                    in_string = None;
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    in_string = Some(c);
                    out.push(c);
                } else if c == '#' {
                    break;
                } else {
                    out.push(c);
                }
            }
        }
    }
    out
}

fn match_def(trimmed: &str) -> Option<(String, Vec<String>, bool)> {
    let (is_async, rest) = if let Some(r) = trimmed.strip_prefix("async def ") {
        (true, r)
    } else if let Some(r) = trimmed.strip_prefix("def ") {
        (false, r)
    } else {
        return None;
    };
    let paren = rest.find('(')?;
    let name = rest[..paren].trim().to_string();
    let close = rest.rfind(')')?;
    if close < paren {
        return None;
    }
    let params_str = &rest[paren + 1..close];
    let params = split_top_level(params_str, ',')
        .into_iter()
        .filter_map(|p| {
            let p = p.trim();
            if p.is_empty() {
                return None;
            }
            let p = p.trim_start_matches('*');
            let p = p.split(':').next().unwrap_or(p);
            let p = p.split('=').next().unwrap_or(p);
            let p = p.trim();
            if p.is_empty() || p == "self" || p == "cls" {
                None
            } else {
                Some(p.to_string())
            }
        })
        .collect();
    Some((name, params, is_async))
}

fn match_class(trimmed: &str) -> Option<(String, String)> {
    let rest = trimmed.strip_prefix("class ")?;
    let end = rest.find(':')?;
    let header = &rest[..end];
    if let Some(paren) = header.find('(') {
        let close = header.rfind(')').unwrap_or(header.len());
        let name = header[..paren].trim().to_string();
        let bases = header[paren + 1..close.max(paren + 1)].to_string();
        Some((name, bases))
    } else {
        Some((header.trim().to_string(), String::new()))
    }
}

fn match_import(trimmed: &str) -> Option<(Vec<String>, String)> {
    if let Some(rest) = trimmed.strip_prefix("from ") {
        let import_pos = rest.find(" import ")?;
        let module = rest[..import_pos].trim().to_string();
        let names_part = &rest[import_pos + " import ".len()..];
        let names_part = names_part.trim().trim_start_matches('(').trim_end_matches(')');
        let mut names = Vec::new();
        for item in split_top_level(names_part, ',') {
            let item = item.trim();
            if item.is_empty() || item == "*" {
                continue;
            }
            let bound = if let Some(as_pos) = item.find(" as ") {
                item[as_pos + 4..].trim().to_string()
            } else {
                item.to_string()
            };
            names.push(bound);
        }
        Some((names, module))
    } else if let Some(rest) = trimmed.strip_prefix("import ") {
        let mut names = Vec::new();
        for item in split_top_level(rest, ',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let bound = if let Some(as_pos) = item.find(" as ") {
                item[as_pos + 4..].trim().to_string()
            } else {
                item.split('.').next().unwrap_or(item).trim().to_string()
            };
            names.push(bound);
        }
        Some((names, String::new()))
    } else {
        None
    }
}

fn match_for(trimmed: &str) -> Option<(String, String)> {
    let rest = trimmed.strip_prefix("for ")?;
    if !trimmed.ends_with(':') {
        return None;
    }
    let in_pos = find_top_level_keyword(rest, " in ")?;
    let targets = rest[..in_pos].trim().to_string();
    let iterable = rest[in_pos + 4..rest.len() - 1].trim().to_string();
    Some((targets, iterable))
}

fn find_top_level_keyword(s: &str, needle: &str) -> Option<usize> {
    let mut depth = 0i32;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {}
        }
        if depth == 0 && s[i..].starts_with(needle) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn split_targets(targets: &str) -> Vec<String> {
    let t = targets.trim().trim_start_matches('(').trim_end_matches(')');
    split_top_level(t, ',')
        .into_iter()
        .map(|p| p.trim().trim_start_matches('*').trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn find_as_targets(trimmed: &str) -> Vec<String> {
    let mut out = Vec::new();
    let words: Vec<&str> = trimmed.trim_end_matches(':').split_whitespace().collect();
    for w in words.windows(2) {
        if w[0] == "as" {
            let name = w[1].trim_end_matches(',');
            out.push(name.to_string());
        }
    }
    out
}

fn walrus_targets(tokens: &[Token]) -> Vec<String> {
    let mut out = Vec::new();
    for w in tokens.windows(2) {
        if let (Token::Ident(name), Token::Walrus) = (&w[0], &w[1]) {
            out.push(name.clone());
        }
    }
    out
}

fn comprehension_targets(trimmed: &str) -> Vec<String> {
    let mut out = Vec::new();
    if trimmed.starts_with("for ") {
        return out;
    }
    let mut rest = trimmed;
    while let Some(pos) = rest.find(" for ") {
        let after = &rest[pos + 5..];
        if let Some(in_pos) = after.find(" in ") {
            let target_part = &after[..in_pos];
            out.extend(split_targets(target_part));
            rest = &after[in_pos + 4..];
        } else {
            break;
        }
    }
    out
}

fn lambda_params(tokens: &[Token]) -> (Vec<String>, usize) {
    let mut params = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if let Token::Ident(name) = &tokens[i] {
            if name == "lambda" {
                let mut j = i + 1;
                while j < tokens.len() && !matches!(tokens[j], Token::Colon) {
                    if let Token::Ident(p) = &tokens[j] {
                        params.push(p.clone());
                    }
                    j += 1;
                }
                return (params, j);
            }
        }
        i += 1;
    }
    (params, 0)
}

fn top_level_assign_index(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0i32;
    let mut last = None;
    for (i, t) in tokens.iter().enumerate() {
        match t {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth -= 1,
            Token::Equals | Token::AugAssign if depth == 0 => last = Some(i),
            _ => {}
        }
    }
    last
}

fn split_on_token(tokens: &[Token], sep: &Token) -> Vec<Vec<Token>> {
    let mut groups = Vec::new();
    let mut depth = 0i32;
    let mut current = Vec::new();
    for t in tokens {
        match t {
            Token::LParen | Token::LBracket | Token::LBrace => {
                depth += 1;
                current.push(t.clone());
            }
            Token::RParen | Token::RBracket | Token::RBrace => {
                depth -= 1;
                current.push(t.clone());
            }
            t2 if t2 == sep && depth == 0 => {
                groups.push(std::mem::take(&mut current));
            }
            t2 => current.push(t2.clone()),
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

fn handle_target(sub: &[Token], definitions: &mut BTreeSet<String>, raw_references: &mut BTreeSet<String>) {
    // Drop a type annotation (`x: int = 5` tokenizes as `Ident(x) Colon Ident(int)`)
    // before classifying — the annotation is read context, not the bound name.
    // Only a depth-0 colon counts: `d[1:2] = x` has one too, but inside brackets,
    // where it's slice syntax, not an annotation.
    let annotation_colon = {
        let mut depth = 0i32;
        let mut found = None;
        for (i, t) in sub.iter().enumerate() {
            match t {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => depth -= 1,
                Token::Colon if depth == 0 => {
                    found = Some(i);
                    break;
                }
                _ => {}
            }
        }
        found
    };
    let sub = match annotation_colon {
        Some(colon_idx) => &sub[..colon_idx],
        None => sub,
    };
    let sub: Vec<&Token> = sub
        .iter()
        .filter(|t| !matches!(t, Token::Star | Token::LParen | Token::RParen | Token::LBracket | Token::RBracket))
        .collect();
    if sub.is_empty() {
        return;
    }
    if sub.len() == 1 {
        if let Token::Ident(name) = sub[0] {
            definitions.insert(name.clone());
            return;
        }
    }
    // Attribute/subscript target (`obj.attr = ..`, `d["k"] = ..`): the base
    // name is read, not bound.
    if let Token::Ident(name) = sub[0] {
        if !is_keyword(name) {
            raw_references.insert(name.clone());
        }
    }
}

/// Extract read-context identifiers from a token slice: skips attribute
/// access (`.attr`), call keyword-argument names, and language keywords.
fn scan_references(tokens: &[Token]) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth -= 1,
            Token::Ident(name) => {
                let preceded_by_dot = i > 0 && matches!(tokens[i - 1], Token::Dot);
                let followed_by_walrus = i + 1 < tokens.len() && matches!(tokens[i + 1], Token::Walrus);
                let is_call_kwarg = depth > 0 && i + 1 < tokens.len() && matches!(tokens[i + 1], Token::Equals);
                if !preceded_by_dot && !followed_by_walrus && !is_call_kwarg && !is_keyword(name) {
                    out.push(name.clone());
                }
            }
            _ => {}
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_assignment() {
        let a = analyze("x = 1\ny = x + 2");
        assert!(a.definitions.contains("x"));
        assert!(a.definitions.contains("y"));
        assert!(a.references.is_empty());
    }

    #[test]
    fn reference_to_undefined_name() {
        let a = analyze("y = x + 2");
        assert!(a.references.contains("x"));
        assert!(a.definitions.contains("y"));
    }

    #[test]
    fn type_annotated_assignment_binds_target() {
        let a = analyze("x: int = 5");
        assert!(a.definitions.contains("x"));
        assert!(!a.references.contains("x"));
    }

    #[test]
    fn full_slice_assignment_reads_base_name() {
        let a = analyze("a[:] = x");
        assert!(a.references.contains("a"));
        assert!(!a.definitions.contains("a"));
    }

    #[test]
    fn import_statement() {
        let a = analyze("import pandas as pd\nfrom os import path");
        assert!(a.imports.contains("pd"));
        assert!(a.imports.contains("path"));
        assert!(a.definitions.contains("pd"));
    }

    #[test]
    fn star_import_is_ignored() {
        let a = analyze("from os import *");
        assert!(a.imports.is_empty());
    }

    #[test]
    fn function_def_scopes_params() {
        let a = analyze("def f(a, b):\n    return a + b\n");
        assert!(a.functions.contains("f"));
        assert!(a.definitions.contains("f"));
        assert!(!a.references.contains("a"));
        assert!(!a.references.contains("b"));
    }

    #[test]
    fn class_def_is_tracked() {
        let a = analyze("class Foo(Base):\n    def bar(self):\n        return 1\n");
        assert!(a.classes.contains("Foo"));
        assert!(a.references.contains("Base"));
    }

    #[test]
    fn for_loop_target_leaks_and_iterable_is_reference() {
        let a = analyze("for i in items:\n    print(i)\n");
        assert!(a.definitions.contains("i"));
        assert!(a.references.contains("items"));
    }

    #[test]
    fn tuple_unpack_for_loop() {
        let a = analyze("for a, b in pairs:\n    pass\n");
        assert!(a.definitions.contains("a"));
        assert!(a.definitions.contains("b"));
    }

    #[test]
    fn walrus_target_is_definition() {
        let a = analyze("if (n := len(data)) > 0:\n    pass\n");
        assert!(a.definitions.contains("n"));
        assert!(a.references.contains("data"));
    }

    #[test]
    fn builtins_are_excluded_from_references() {
        let a = analyze("print(len(x))");
        assert!(!a.references.contains("print"));
        assert!(!a.references.contains("len"));
        assert!(a.references.contains("x"));
    }

    #[test]
    fn magic_and_shell_lines_are_stripped() {
        let a = analyze("%matplotlib inline\n!pip install foo\nx = 1\n");
        assert!(a.definitions.contains("x"));
    }

    #[test]
    fn attribute_access_does_not_count_attr_as_reference() {
        let a = analyze("y = df.columns");
        assert!(a.references.contains("df"));
        assert!(!a.references.contains("columns"));
    }

    #[test]
    fn call_kwarg_name_is_not_a_reference() {
        let a = analyze("result = func(threshold=5)");
        assert!(!a.references.contains("threshold"));
    }

    #[test]
    fn augmented_assignment_is_definition_only() {
        let a = analyze("count += 1");
        assert!(a.definitions.contains("count"));
    }

    #[test]
    fn with_as_binds_name() {
        let a = analyze("with open(path) as f:\n    data = f.read()\n");
        assert!(a.definitions.contains("f"));
        assert!(a.references.contains("path"));
    }

    #[test]
    fn comprehension_variable_is_scoped() {
        let a = analyze("squares = [n * n for n in range(10)]");
        assert!(!a.references.contains("n"));
    }

    #[test]
    fn subscript_assignment_reads_the_base_name() {
        let a = analyze("d['key'] = 1");
        assert!(a.references.contains("d"));
        assert!(!a.definitions.contains("d"));
    }
}
