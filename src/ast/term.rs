use super::write_joined;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TERMS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Term {
    Call { name: String, args: Vec<Param> },
    Literal(Literal),
    Identifier(String),
    ListIndex { name: String, indices: Vec<Param> },
    List(Vec<Param>),
    Map(Vec<MapEntry>),
    /// `( )` or a parenthesised list of more than one item.
    Tuple(Vec<Param>),
    Operator { op: Operator, operands: Vec<Term> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Number(i64),
    Text(String),
}

/// `value` or `value : type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub value: Term,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ty: Option<Term>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapEntry {
    Pair { key: Term, value: Term },
    Element(Param),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Star,
    Plus,
    Optional,
    Lazy,
    Complement,
    Or,
    And,
    Computes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixity {
    Postfix,
    Prefix,
    Infix,
}

/// Repetition marker carried by a parameter or pattern argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    Single,
    Optional,
    Star,
    Plus,
}

impl Operator {
    pub const fn fixity(self) -> Fixity {
        match self {
            Operator::Star | Operator::Plus | Operator::Optional => Fixity::Postfix,
            Operator::Lazy | Operator::Complement => Fixity::Prefix,
            Operator::Or | Operator::And | Operator::Computes => Fixity::Infix,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Operator::Star => "*",
            Operator::Plus => "+",
            Operator::Optional => "?",
            Operator::Lazy | Operator::Computes => "=>",
            Operator::Complement => "~",
            Operator::Or => "|",
            Operator::And => "&",
        }
    }

    const fn precedence(self) -> u8 {
        match self.fixity() {
            Fixity::Infix => 1,
            Fixity::Prefix => 2,
            Fixity::Postfix => 3,
        }
    }
}

impl Arity {
    pub const fn is_variadic(self) -> bool {
        matches!(self, Arity::Star | Arity::Plus)
    }

    /// Smallest number of arguments the marker matches.
    pub const fn min_len(self) -> usize {
        match self {
            Arity::Single | Arity::Plus => 1,
            Arity::Optional | Arity::Star => 0,
        }
    }

    pub const fn marker(self) -> &'static str {
        match self {
            Arity::Single => "",
            Arity::Optional => "?",
            Arity::Star => "*",
            Arity::Plus => "+",
        }
    }
}

impl Term {
    pub fn ident(name: impl Into<String>) -> Self {
        Term::Identifier(name.into())
    }

    pub fn number(n: i64) -> Self {
        Term::Literal(Literal::Number(n))
    }

    /// Call whose arguments carry no type annotations.
    pub fn call(name: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Call {
            name: name.into(),
            args: args.into_iter().map(Param::new).collect(),
        }
    }

    pub fn unary(op: Operator, operand: Term) -> Self {
        Term::Operator {
            op,
            operands: vec![operand],
        }
    }

    pub fn binary(op: Operator, left: Term, right: Term) -> Self {
        Term::Operator {
            op,
            operands: vec![left, right],
        }
    }

    /// Name of a call, list index or identifier.
    pub fn head_name(&self) -> Option<&str> {
        match self {
            Term::Call { name, .. } | Term::ListIndex { name, .. } | Term::Identifier(name) => {
                Some(name)
            }
            _ => None,
        }
    }

    /// Arity marker found by looking through nested `* + ? =>` wrappers.
    pub fn arity(&self) -> Arity {
        let (mut star, mut plus, mut optional) = (false, false, false);
        let mut current = self;
        while let Term::Operator { op, operands } = current {
            match (op, operands.as_slice()) {
                (Operator::Star, [inner]) => {
                    star = true;
                    current = inner;
                }
                (Operator::Plus, [inner]) => {
                    plus = true;
                    current = inner;
                }
                (Operator::Optional, [inner]) => {
                    optional = true;
                    current = inner;
                }
                (Operator::Lazy, [inner]) => current = inner,
                _ => break,
            }
        }
        if star || (plus && optional) {
            Arity::Star
        } else if plus {
            Arity::Plus
        } else if optional {
            Arity::Optional
        } else {
            Arity::Single
        }
    }

    /// The term with outer arity and laziness wrappers removed.
    pub fn strip_markers(&self) -> &Term {
        let mut current = self;
        while let Term::Operator { op, operands } = current {
            match (op, operands.as_slice()) {
                (
                    Operator::Star | Operator::Plus | Operator::Optional | Operator::Lazy,
                    [inner],
                ) => current = inner,
                _ => break,
            }
        }
        current
    }

    /// Whether a `=>` prefix appears among the outer wrappers.
    pub fn is_lazy(&self) -> bool {
        let mut current = self;
        while let Term::Operator { op, operands } = current {
            match (op, operands.as_slice()) {
                (Operator::Lazy, _) => return true,
                (Operator::Star | Operator::Plus | Operator::Optional, [inner]) => {
                    current = inner
                }
                _ => break,
            }
        }
        false
    }

    /// Names of every call in the term, outermost first.
    pub fn call_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_calls(&mut names);
        names
    }

    fn collect_calls<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Term::Call { name, args } => {
                out.push(name);
                args.iter().for_each(|p| p.collect_calls(out));
            }
            Term::ListIndex { indices: items, .. }
            | Term::List(items)
            | Term::Tuple(items) => items.iter().for_each(|p| p.collect_calls(out)),
            Term::Map(entries) => {
                for entry in entries {
                    match entry {
                        MapEntry::Pair { key, value } => {
                            key.collect_calls(out);
                            value.collect_calls(out);
                        }
                        MapEntry::Element(p) => p.collect_calls(out),
                    }
                }
            }
            Term::Operator { operands, .. } => operands.iter().for_each(|t| t.collect_calls(out)),
            Term::Literal(_) | Term::Identifier(_) => {}
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Term::Operator { op, .. } => op.precedence(),
            _ => 4,
        }
    }
}

impl Param {
    pub fn new(value: Term) -> Self {
        Self { value, ty: None }
    }

    pub fn typed(value: Term, ty: Term) -> Self {
        Self {
            value,
            ty: Some(ty),
        }
    }

    /// The value's marker, or the type's when the value carries none.
    pub fn arity(&self) -> Arity {
        match self.value.arity() {
            Arity::Single => self.ty.as_ref().map_or(Arity::Single, Term::arity),
            marked => marked,
        }
    }

    pub fn is_lazy(&self) -> bool {
        self.value.is_lazy() || self.ty.as_ref().is_some_and(Term::is_lazy)
    }

    fn collect_calls<'a>(&'a self, out: &mut Vec<&'a str>) {
        self.value.collect_calls(out);
        if let Some(ty) = &self.ty {
            ty.collect_calls(out);
        }
    }
}

// ============================================================================
// PRINTING
// ============================================================================

struct Wrapped<'a>(&'a Term, bool);

impl fmt::Display for Wrapped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.1 {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Call { name, args } => {
                write!(f, "{}(", name)?;
                write_joined(f, args, ", ")?;
                f.write_str(")")
            }
            Term::Literal(lit) => write!(f, "{}", lit),
            Term::Identifier(name) => f.write_str(name),
            Term::ListIndex { name, indices } => {
                write!(f, "{}[", name)?;
                write_joined(f, indices, ", ")?;
                f.write_str("]")
            }
            Term::List(items) if items.is_empty() => f.write_str("[ ]"),
            Term::List(items) => {
                f.write_str("[")?;
                write_joined(f, items, ", ")?;
                f.write_str("]")
            }
            Term::Map(entries) if entries.is_empty() => f.write_str("{ }"),
            Term::Map(entries) => {
                f.write_str("{")?;
                write_joined(f, entries, ", ")?;
                f.write_str("}")
            }
            Term::Tuple(items) if items.is_empty() => f.write_str("( )"),
            Term::Tuple(items) => {
                f.write_str("(")?;
                write_joined(f, items, ", ")?;
                f.write_str(")")
            }
            Term::Operator { op, operands } => match (op.fixity(), operands.as_slice()) {
                (Fixity::Postfix, [operand]) => {
                    write!(f, "{}{}", Wrapped(operand, operand.precedence() < 3), op.symbol())
                }
                (Fixity::Prefix, [operand]) => {
                    write!(f, "{}{}", op.symbol(), Wrapped(operand, operand.precedence() < 2))
                }
                (Fixity::Infix, [left, right]) => write!(
                    f,
                    "{} {} {}",
                    left,
                    op.symbol(),
                    Wrapped(right, right.precedence() <= 1)
                ),
                _ => {
                    write!(f, "{}(", op.symbol())?;
                    write_joined(f, operands, ", ")?;
                    f.write_str(")")
                }
            },
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ty {
            Some(ty) => write!(f, "{}:{}", self.value, ty),
            None => write!(f, "{}", self.value),
        }
    }
}

impl fmt::Display for MapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapEntry::Pair { key, value } => write!(f, "{} |-> {}", key, value),
            MapEntry::Element(param) => write!(f, "{}", param),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_looks_through_laziness_and_nesting() {
        let lazy_star = Term::unary(
            Operator::Star,
            Term::unary(Operator::Lazy, Term::ident("null-type")),
        );
        assert_eq!(lazy_star.arity(), Arity::Star);

        let plus_opt = Term::unary(Operator::Optional, Term::unary(Operator::Plus, Term::ident("T")));
        assert_eq!(plus_opt.arity(), Arity::Star);

        let lazy_values = Term::unary(Operator::Lazy, Term::ident("values"));
        assert_eq!(lazy_values.arity(), Arity::Single);
        assert!(lazy_values.is_lazy());
    }

    #[test]
    fn param_prefers_value_marker_over_type_marker() {
        let p = Param::typed(
            Term::unary(Operator::Plus, Term::ident("V")),
            Term::unary(Operator::Star, Term::ident("values")),
        );
        assert_eq!(p.arity(), Arity::Plus);
        let q = Param::typed(Term::ident("_"), Term::unary(Operator::Optional, Term::ident("values")));
        assert_eq!(q.arity(), Arity::Optional);
    }

    #[test]
    fn printer_parenthesises_by_precedence() {
        let t = Term::unary(
            Operator::Star,
            Term::binary(Operator::Or, Term::ident("a"), Term::ident("b")),
        );
        assert_eq!(t.to_string(), "(a | b)*");

        let right_nested = Term::binary(
            Operator::And,
            Term::ident("a"),
            Term::binary(Operator::Or, Term::ident("b"), Term::ident("c")),
        );
        assert_eq!(right_nested.to_string(), "a & (b | c)");

        let lazy = Term::unary(Operator::Lazy, Term::unary(Operator::Star, Term::ident("T")));
        assert_eq!(lazy.to_string(), "=>T*");
    }

    #[test]
    fn empty_brackets_print_with_a_gap() {
        assert_eq!(Term::Tuple(vec![]).to_string(), "( )");
        assert_eq!(Term::Map(vec![]).to_string(), "{ }");
        assert_eq!(Term::call("f", vec![]).to_string(), "f()");
    }

    #[test]
    fn call_names_are_collected_outermost_first() {
        let t = Term::call("f", vec![Term::call("g", vec![Term::ident("X")]), Term::call("h", vec![])]);
        assert_eq!(t.call_names(), vec!["f", "g", "h"]);
    }
}
