//! Pattern compilation.
//!
//! Matches the arguments of a rule pattern against a parameter layout,
//! producing the runtime conditions under which the pattern applies and
//! the runtime location of every variable it binds.

use super::layout::{Location, ParamLayout};
use super::node_name;
use super::spec::{Access, Condition, Value};
use crate::ast::{Literal, MapEntry, Param, Term};
use crate::document::Document;
use crate::errors::{CbsError, ErrorReporting, LoweringContext};
use std::collections::BTreeMap;
use tracing::debug;

/// What a pattern compiles to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternMatch {
    pub conditions: Vec<Condition>,
    pub bindings: BTreeMap<String, Value>,
}

/// `_`, a capitalised name, or a declared meta-variable.
pub fn is_variable(doc: &Document, name: &str) -> bool {
    name == "_" || name.starts_with(|c: char| c.is_ascii_uppercase()) || doc.is_metavariable(name)
}

pub struct Matcher<'a> {
    doc: &'a Document,
    ctx: &'a LoweringContext,
    owner: &'a str,
    result: PatternMatch,
}

impl<'a> Matcher<'a> {
    pub fn new(doc: &'a Document, ctx: &'a LoweringContext, owner: &'a str) -> Self {
        Self {
            doc,
            ctx,
            owner,
            result: PatternMatch::default(),
        }
    }

    pub fn finish(self) -> PatternMatch {
        self.result
    }

    /// Matches `args` against `layout`. `base` is the node holding the
    /// arguments when matching inside a nested call.
    pub fn match_args(
        &mut self,
        layout: &ParamLayout,
        args: &[Param],
        base: Option<&(Access, String)>,
    ) -> Result<(), CbsError> {
        let groups: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| a.arity().is_variadic())
            .map(|(i, _)| i)
            .collect();

        match groups.as_slice() {
            [] => self.match_fixed(layout, args, base),
            [group] => self.match_group(layout, args, *group, base),
            [_, second, ..] => Err(self.ctx.arity(
                self.owner,
                "a pattern may contain at most one variadic group",
                self.ctx.find(&args[*second].to_string()),
            )),
        }
    }

    /// Every argument is a single position: the argument count is exact.
    fn match_fixed(
        &mut self,
        layout: &ParamLayout,
        args: &[Param],
        base: Option<&(Access, String)>,
    ) -> Result<(), CbsError> {
        let n = args.len();
        if !layout.accepts(n) {
            return Err(self.irreconcilable(layout, n));
        }

        if let Some(slot) = layout.vararg_slot() {
            let at = Access::slot_of(base, slot);
            let width = n - layout.regular() - layout.finals();
            self.result.conditions.push(if width == 0 {
                Condition::VarargEmpty { at }
            } else {
                Condition::VarargLength {
                    at,
                    len: width,
                    at_least: false,
                }
            });
        }

        for (i, arg) in args.iter().enumerate() {
            let location = layout
                .get_index(i, n)
                .ok_or_else(|| self.irreconcilable(layout, n))?;
            self.match_at(&arg.value, Access::locate(base, location))?;
        }
        Ok(())
    }

    /// One argument stands for a run of arguments. Positions before it are
    /// resolved from the start, positions after it from the end.
    fn match_group(
        &mut self,
        layout: &ParamLayout,
        args: &[Param],
        group: usize,
        base: Option<&(Access, String)>,
    ) -> Result<(), CbsError> {
        let after = args.len() - group - 1;
        let group_arity = args[group].arity();

        let (locations, value) = match layout.vararg_slot() {
            None => {
                let n = layout.len();
                let covered = match n.checked_sub(args.len() - 1) {
                    Some(c) if c >= group_arity.min_len() => c,
                    _ => return Err(self.irreconcilable(layout, args.len())),
                };
                let locations: Vec<Location> = (0..group)
                    .chain(n - after..n)
                    .map(Location::Regular)
                    .collect();
                let items = (group..group + covered)
                    .map(|k| Value::Field {
                        at: Access::slot_of(base, k),
                    })
                    .collect();
                (locations, sequence(items))
            }
            Some(slot) => {
                let (regular, finals) = (layout.regular(), layout.finals());
                let leading = (0..group).map(|i| layout.from_start(i));
                let trailing = (1..=after).rev().map(|b| layout.from_end(b));
                let locations = leading
                    .chain(trailing)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| self.irreconcilable(layout, args.len()))?;

                // Singles that fall into the vararg shrink the group's window.
                let from = locations
                    .iter()
                    .filter(|l| matches!(l, Location::Vararg { .. }))
                    .count();
                let back = locations
                    .iter()
                    .filter(|l| matches!(l, Location::VarargFromEnd { .. }))
                    .count();
                let group_in_vararg = group >= regular && after >= finals;
                let min = from + back + if group_in_vararg { group_arity.min_len() } else { 0 };
                if min > 0 {
                    self.result.conditions.push(Condition::VarargLength {
                        at: Access::slot_of(base, slot),
                        len: min,
                        at_least: true,
                    });
                }

                let vararg = Access::slot_of(base, slot);
                let mut items: Vec<Value> = (group..regular)
                    .map(|k| Value::Field {
                        at: Access::slot_of(base, k),
                    })
                    .collect();
                items.push(if from == 0 && back == 0 {
                    Value::Spread { at: vararg }
                } else {
                    Value::Slice {
                        at: vararg,
                        from,
                        back,
                    }
                });
                items.extend((0..finals.saturating_sub(after)).map(|j| Value::Field {
                    at: Access::slot_of(base, regular + 1 + j),
                }));
                (locations, sequence(items))
            }
        };

        let singles = args
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != group)
            .map(|(_, a)| a);
        for (arg, location) in singles.zip(locations) {
            self.match_at(&arg.value, Access::locate(base, location))?;
        }

        if let Term::Identifier(name) = args[group].value.strip_markers() {
            if name != "_" && is_variable(self.doc, name) {
                self.bind(name, value);
            }
        }
        Ok(())
    }

    fn match_at(&mut self, term: &Term, at: Access) -> Result<(), CbsError> {
        match term.strip_markers() {
            Term::Identifier(name) if name == "_" => {}
            Term::Identifier(name) if is_variable(self.doc, name) => {
                self.bind(name, Value::Field { at });
            }
            Term::Identifier(name) => self.result.conditions.push(Condition::Equals {
                at,
                value: Value::Atom { name: name.clone() },
            }),
            Term::Call { name, args } => {
                let class = node_name(name);
                self.result.conditions.push(Condition::HasType {
                    at: at.clone(),
                    class: class.clone(),
                });
                let layout = match self.doc.signature(name) {
                    Some(params) => ParamLayout::classify(name, params, self.ctx)?,
                    None => ParamLayout::positional(args.len()),
                };
                self.match_args(&layout, args, Some(&(at, class)))?;
            }
            other => self.result.conditions.push(Condition::Equals {
                at,
                value: constant(other),
            }),
        }
        Ok(())
    }

    /// A variable seen twice must denote equal values.
    fn bind(&mut self, name: &str, value: Value) {
        match self.result.bindings.get(name) {
            None => {
                self.result.bindings.insert(name.to_string(), value);
            }
            Some(Value::Field { at: first }) => {
                if let Value::Field { at } = value {
                    self.result.conditions.push(Condition::Equivalent {
                        left: first.clone(),
                        right: at,
                    });
                }
            }
            Some(_) => debug!("{}: repeated group variable {} not compared", self.owner, name),
        }
    }

    fn irreconcilable(&self, layout: &ParamLayout, n: usize) -> CbsError {
        let expected = match layout.vararg_arity() {
            None => format!("exactly {}", layout.len()),
            Some(arity) => format!(
                "at least {}",
                layout.regular() + layout.finals() + arity.min_len()
            ),
        };
        self.ctx.arity(
            self.owner,
            format!(
                "a pattern with {} arguments cannot match a declaration taking {}",
                n, expected
            ),
            self.ctx.whole(),
        )
    }
}

fn sequence(mut items: Vec<Value>) -> Value {
    if items.len() == 1 {
        items.remove(0)
    } else {
        Value::Sequence { items }
    }
}

/// A pattern sub-term compared by value.
pub fn constant(term: &Term) -> Value {
    let items = |params: &[Param]| -> Vec<Value> {
        params.iter().map(|p| constant(&p.value)).collect()
    };
    match term {
        Term::Identifier(name) => Value::Atom { name: name.clone() },
        Term::Literal(Literal::Number(n)) => Value::Number { value: *n },
        Term::Literal(Literal::Text(s)) => Value::Text { value: s.clone() },
        Term::Call { name, args } => Value::Construct {
            class: node_name(name),
            args: items(args),
        },
        Term::List(params) => Value::List {
            items: items(params),
        },
        Term::Tuple(params) => Value::Tuple {
            items: items(params),
        },
        Term::Map(entries) => Value::Map {
            entries: entries
                .iter()
                .map(|e| match e {
                    MapEntry::Pair { key, value } => (constant(key), constant(value)),
                    MapEntry::Element(p) => (constant(&p.value), Value::Tuple { items: vec![] }),
                })
                .collect(),
        },
        other => Value::Atom {
            name: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::parse_term;

    fn args(pattern: &str) -> Vec<Param> {
        match parse_term(pattern).unwrap() {
            Term::Call { args, .. } => args,
            other => panic!("not a call: {other}"),
        }
    }

    fn layout(signature: &str) -> ParamLayout {
        let ctx = LoweringContext::new("test.cbs:1", signature);
        ParamLayout::classify("f", &args(signature), &ctx).unwrap()
    }

    fn compile(signature: &str, pattern: &str) -> Result<PatternMatch, CbsError> {
        let doc = Document::new();
        let ctx = LoweringContext::new("test.cbs:1", pattern);
        let mut matcher = Matcher::new(&doc, &ctx, "f");
        matcher.match_args(&layout(signature), &args(pattern), None)?;
        Ok(matcher.finish())
    }

    fn element(slot: usize, index: usize) -> Access {
        Access::Element {
            of: Box::new(Access::child(slot)),
            index,
        }
    }

    #[test]
    fn literal_head_and_group_tail() {
        let m = compile("f(_:values*)", "f(null-value, Y+)").unwrap();
        assert!(m.conditions.contains(&Condition::Equals {
            at: element(0, 0),
            value: Value::Atom {
                name: "null-value".into()
            },
        }));
        assert_eq!(
            m.bindings["Y"],
            Value::Slice {
                at: Access::child(0),
                from: 1,
                back: 0
            }
        );
    }

    #[test]
    fn zero_arity_pattern_checks_empty_vararg() {
        let m = compile("f(_:values*)", "f( )").unwrap();
        assert_eq!(
            m.conditions,
            vec![Condition::VarargEmpty {
                at: Access::child(0)
            }]
        );
    }

    #[test]
    fn fixed_pattern_against_vararg_guards_length() {
        let m = compile("f(_:booleans*)", "f(false, B)").unwrap();
        assert_eq!(
            m.conditions[0],
            Condition::VarargLength {
                at: Access::child(0),
                len: 2,
                at_least: false
            }
        );
        assert_eq!(m.bindings["B"], Value::Field { at: element(0, 1) });
    }

    #[test]
    fn positions_after_the_group_come_from_the_end() {
        let m = compile("f(_:T, _:T*, _:T)", "f(X, Y*, Z, W)").unwrap();
        assert_eq!(m.bindings["X"], Value::Field { at: Access::child(0) });
        assert_eq!(m.bindings["W"], Value::Field { at: Access::child(2) });
        assert_eq!(
            m.bindings["Z"],
            Value::Field {
                at: Access::FromEnd {
                    of: Box::new(Access::child(1)),
                    back: 1
                }
            }
        );
        assert_eq!(
            m.bindings["Y"],
            Value::Slice {
                at: Access::child(1),
                from: 0,
                back: 1
            }
        );
    }

    #[test]
    fn singles_on_both_sides_guard_the_vararg_once() {
        let m = compile("f(_:T, _:T*, _:T)", "f(X, A, Y*, Z, W)").unwrap();
        assert_eq!(
            m.conditions,
            vec![Condition::VarargLength {
                at: Access::child(1),
                len: 2,
                at_least: true
            }]
        );
        assert_eq!(m.bindings["A"], Value::Field { at: element(1, 0) });
        assert_eq!(
            m.bindings["Y"],
            Value::Slice {
                at: Access::child(1),
                from: 1,
                back: 1
            }
        );
    }

    #[test]
    fn whole_vararg_group_is_spread() {
        let m = compile("f(_:T, _:T*)", "f(X, V*)").unwrap();
        assert_eq!(m.bindings["V"], Value::Spread { at: Access::child(1) });
        assert!(m.conditions.is_empty());
    }

    #[test]
    fn repeated_variables_must_be_equivalent() {
        let m = compile("f(_:T, _:T)", "f(X, X)").unwrap();
        assert_eq!(
            m.conditions,
            vec![Condition::Equivalent {
                left: Access::child(0),
                right: Access::child(1)
            }]
        );
    }

    #[test]
    fn nested_calls_add_type_checks() {
        let m = compile("f(_:T)", "f(g(X))").unwrap();
        assert_eq!(
            m.conditions[0],
            Condition::HasType {
                at: Access::child(0),
                class: "GNode".into()
            }
        );
        assert_eq!(
            m.bindings["X"],
            Value::Field {
                at: Access::Field {
                    of: Box::new(Access::child(0)),
                    class: "GNode".into(),
                    slot: 0
                }
            }
        );
    }

    #[test]
    fn irreconcilable_arity_is_an_error() {
        let err = compile("f(_:T, _:T)", "f(X)").unwrap_err();
        assert!(matches!(err.kind, crate::errors::ErrorKind::ArityConsistency { .. }));
        assert!(compile("f(_:T)", "f(X*, Y*)").is_err());
    }
}
