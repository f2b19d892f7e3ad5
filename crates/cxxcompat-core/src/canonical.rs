//! Canonical spelling of C++ types and expressions.
//!
//! Two declarations that mean the same thing must produce the same canonical
//! text: `signed int` and `int`, `double const&` and `const double&`,
//! `std::size_t` and `size_t`. Comparison everywhere else in the crate is done
//! on these strings, so whitespace, comments and qualifier placement never
//! surface as changes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalType(String);

impl CanonicalType {
    /// Canonical form of a type as written.
    pub fn parse(raw: &str) -> Self {
        Self(TypeShape::parse(raw).render())
    }

    /// Canonical form of a function parameter type. Top-level cv-qualifiers are
    /// dropped and arrays decay to pointers, as neither is part of the
    /// function type.
    pub fn parameter(raw: &str) -> Self {
        let mut shape = TypeShape::parse(raw);
        shape.adjust_for_parameter();
        Self(shape.render())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical spelling of an expression (default arguments, array bounds,
/// `noexcept` conditions, enumerator values).
pub fn canonical_expression(raw: &str) -> String {
    join_tokens(&tokenize(raw))
}

const CV_KEYWORDS: &[&str] = &["const", "volatile"];

const ELABORATED_KEYWORDS: &[&str] = &["struct", "class", "union", "enum", "typename"];

const BUILTIN_KEYWORDS: &[&str] = &[
    "signed",
    "__signed",
    "__signed__",
    "unsigned",
    "short",
    "long",
    "int",
    "char",
    "double",
    "float",
    "bool",
    "void",
    "wchar_t",
    "char8_t",
    "char16_t",
    "char32_t",
    "auto",
    "__int128",
];

const STD_ALIASES: &[&str] = &[
    "size_t",
    "ptrdiff_t",
    "nullptr_t",
    "max_align_t",
    "int8_t",
    "int16_t",
    "int32_t",
    "int64_t",
    "uint8_t",
    "uint16_t",
    "uint32_t",
    "uint64_t",
    "intptr_t",
    "uintptr_t",
    "intmax_t",
    "uintmax_t",
];

const PAREN_TAKING_KEYWORDS: &[&str] = &[
    "decltype",
    "typeof",
    "__typeof__",
    "sizeof",
    "alignof",
    "noexcept",
    "__attribute__",
];

#[derive(Debug, Clone, Default)]
struct TypeShape {
    is_const: bool,
    is_volatile: bool,
    base: String,
    ops: Vec<String>,
}

impl TypeShape {
    fn parse(raw: &str) -> Self {
        let tokens = tokenize(raw);
        let split = base_end(&tokens);
        let (base_tokens, rest) = tokens.split_at(split);

        let mut shape = TypeShape::default();
        let mut kept = Vec::with_capacity(base_tokens.len());
        let mut depth = 0i32;
        for token in base_tokens {
            match token.as_str() {
                "<" | "(" => depth += 1,
                ">" | ")" => depth -= 1,
                _ => {}
            }
            if depth == 0 && CV_KEYWORDS.contains(&token.as_str()) {
                if token == "const" {
                    shape.is_const = true;
                } else {
                    shape.is_volatile = true;
                }
                continue;
            }
            kept.push(token.clone());
        }
        shape.base = canonical_base(&kept);
        shape.ops = declarator_ops(rest);
        shape
    }

    fn adjust_for_parameter(&mut self) {
        match self.ops.last_mut() {
            None => {
                self.is_const = false;
                self.is_volatile = false;
            }
            Some(last) if last.starts_with('*') || last.starts_with('[') => {
                *last = "*".to_string();
            }
            Some(_) => {}
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        if self.is_const {
            out.push_str("const ");
        }
        if self.is_volatile {
            out.push_str("volatile ");
        }
        out.push_str(&self.base);
        for op in &self.ops {
            out.push_str(op);
        }
        out.trim().to_string()
    }
}

/// Index of the first token that starts the declarator part of a type
/// (`*`, `&`, `&&`, `[`, or a parenthesised group that is not an operand of
/// `decltype` and friends).
fn base_end(tokens: &[String]) -> usize {
    let mut depth = 0i32;
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        match token {
            "<" => depth += 1,
            ">" => depth -= 1,
            "(" if depth == 0 => {
                let operand = i > 0 && PAREN_TAKING_KEYWORDS.contains(&tokens[i - 1].as_str());
                if !operand && i > 0 {
                    return i;
                }
                i = skip_group(tokens, i, "(", ")");
                continue;
            }
            "(" => {
                i = skip_group(tokens, i, "(", ")");
                continue;
            }
            "*" | "&" | "&&" | "[" | "..." if depth == 0 => return i,
            _ => {}
        }
        i += 1;
    }
    tokens.len()
}

fn skip_group(tokens: &[String], start: usize, open: &str, close: &str) -> usize {
    let mut depth = 0i32;
    let mut i = start;
    while i < tokens.len() {
        if tokens[i] == open {
            depth += 1;
        } else if tokens[i] == close {
            depth -= 1;
            if depth == 0 {
                return i + 1;
            }
        }
        i += 1;
    }
    tokens.len()
}

fn declarator_ops(tokens: &[String]) -> Vec<String> {
    let mut ops: Vec<String> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "*" => {
                let mut is_const = false;
                let mut is_volatile = false;
                i += 1;
                while i < tokens.len() && CV_KEYWORDS.contains(&tokens[i].as_str()) {
                    if tokens[i] == "const" {
                        is_const = true;
                    } else {
                        is_volatile = true;
                    }
                    i += 1;
                }
                let mut op = String::from("*");
                if is_const {
                    op.push_str("const");
                }
                if is_volatile {
                    if is_const {
                        op.push(' ');
                    }
                    op.push_str("volatile");
                }
                ops.push(op);
                continue;
            }
            "&" | "&&" | "..." => ops.push(tokens[i].clone()),
            "[" => {
                let end = skip_group(tokens, i, "[", "]");
                let inner_end = end.saturating_sub(1).max(i + 1);
                let inner = join_tokens(&tokens[i + 1..inner_end]);
                ops.push(format!("[{}]", inner));
                i = end;
                continue;
            }
            "(" => {
                ops.push(join_tokens(&tokens[i..]));
                break;
            }
            "const" | "volatile" => {
                // Qualifiers after a reference are ill-formed; keep them
                // visible rather than silently folding them.
                ops.push(format!(" {}", tokens[i]));
            }
            _ => ops.push(tokens[i].clone()),
        }
        i += 1;
    }
    ops
}

fn canonical_base(tokens: &[String]) -> String {
    let mut tokens: &[String] = tokens;
    while let Some(first) = tokens.first() {
        if ELABORATED_KEYWORDS.contains(&first.as_str()) && tokens.len() > 1 {
            tokens = &tokens[1..];
        } else {
            break;
        }
    }
    if tokens.is_empty() {
        return String::new();
    }
    if tokens
        .iter()
        .all(|t| BUILTIN_KEYWORDS.contains(&t.as_str()))
    {
        return normalize_builtin(tokens);
    }

    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] == "<" {
            let end = skip_group(tokens, i, "<", ">");
            let inner_end = end.saturating_sub(1).max(i + 1);
            let args = split_top_level_commas(&tokens[i + 1..inner_end])
                .into_iter()
                .map(|arg| CanonicalType::parse(&arg.join(" ")).0)
                .collect::<Vec<_>>();
            out.push(format!("<{}>", args.join(",")));
            i = end;
            continue;
        }
        out.push(tokens[i].clone());
        i += 1;
    }

    let mut joined = join_tokens(&out);
    if let Some(stripped) = joined.strip_prefix("::") {
        joined = stripped.to_string();
    }
    if let Some(rest) = joined.strip_prefix("std::") {
        if STD_ALIASES.contains(&rest) {
            return rest.to_string();
        }
    }
    joined
}

fn normalize_builtin(tokens: &[String]) -> String {
    let mut signed = false;
    let mut unsigned = false;
    let mut shorts = 0;
    let mut longs = 0;
    let mut has_char = false;
    let mut other: Option<&str> = None;

    for token in tokens {
        match token.as_str() {
            "signed" | "__signed" | "__signed__" => signed = true,
            "unsigned" => unsigned = true,
            "short" => shorts += 1,
            "long" => longs += 1,
            "int" => {}
            "char" => has_char = true,
            t => other = Some(t),
        }
    }

    if has_char {
        return if unsigned {
            "unsigned char".into()
        } else if signed {
            "signed char".into()
        } else {
            "char".into()
        };
    }
    match other {
        Some("double") if longs > 0 => return "long double".into(),
        Some("__int128") if unsigned => return "unsigned __int128".into(),
        Some(t) => return t.to_string(),
        None => {}
    }

    let size = if shorts > 0 {
        "short"
    } else if longs >= 2 {
        "long long"
    } else if longs == 1 {
        "long"
    } else {
        "int"
    };
    if unsigned {
        format!("unsigned {}", size)
    } else {
        size.to_string()
    }
}

fn split_top_level_commas(tokens: &[String]) -> Vec<Vec<String>> {
    let mut parts = vec![Vec::new()];
    let mut depth = 0i32;
    for token in tokens {
        match token.as_str() {
            "<" | "(" | "[" | "{" => depth += 1,
            ">" | ")" | "]" | "}" => depth -= 1,
            "," if depth == 0 => {
                parts.push(Vec::new());
                continue;
            }
            _ => {}
        }
        if let Some(last) = parts.last_mut() {
            last.push(token.clone());
        }
    }
    parts.retain(|p| !p.is_empty());
    parts
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Join tokens with a single space only where two words would otherwise fuse.
fn join_tokens(tokens: &[String]) -> String {
    let mut out = String::new();
    for token in tokens {
        let needs_space = match (out.chars().last(), token.chars().next()) {
            (Some(prev), Some(next)) => is_word_char(prev) && is_word_char(next),
            _ => false,
        };
        if needs_space {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}

/// Splits C++ text into tokens, dropping whitespace and comments. `>>` is
/// always split so nested template argument lists close correctly.
pub(crate) fn tokenize(raw: &str) -> Vec<String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            continue;
        }
        if is_word_char(c) {
            let start = i;
            let numeric = c.is_ascii_digit();
            while i < chars.len()
                && (is_word_char(chars[i])
                    || (numeric && (chars[i] == '.' || chars[i] == '\'')))
            {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
            continue;
        }
        if c == '"' || c == '\'' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(chars.len());
            tokens.push(chars[start..i].iter().collect());
            continue;
        }
        let pair: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        if matches!(pair.as_str(), "::" | "&&" | "->" | "||" | "==" | "!=" | "<=") {
            tokens.push(pair);
            i += 2;
            continue;
        }
        if c == '.' && chars.get(i + 1) == Some(&'.') && chars.get(i + 2) == Some(&'.') {
            tokens.push("...".into());
            i += 3;
            continue;
        }
        tokens.push(c.to_string());
        i += 1;
    }
    tokens
}
