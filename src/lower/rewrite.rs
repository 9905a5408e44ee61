//! Rule compilation: rewrite targets become values, rules become ordered
//! dispatch branches.

use super::layout::ParamLayout;
use super::node_name;
use super::pattern::{constant, Matcher};
use super::spec::{Branch, Value};
use crate::ast::{FunconDecl, MapEntry, Operator, Param, Rule, Term};
use crate::document::Document;
use crate::errors::{CbsError, ErrorReporting, LoweringContext};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Builds the value a rewrite target denotes once pattern variables are
/// bound.
pub struct Rewriter<'a> {
    bindings: &'a BTreeMap<String, Value>,
    /// Class given to bare names that are not bound.
    returns: &'a str,
}

impl<'a> Rewriter<'a> {
    pub fn new(bindings: &'a BTreeMap<String, Value>, returns: &'a str) -> Self {
        Self { bindings, returns }
    }

    pub fn build(&self, term: &Term) -> Value {
        match term {
            Term::Identifier(name) => match self.bindings.get(name) {
                Some(value) => value.clone(),
                None => Value::Literal {
                    class: self.returns.to_string(),
                    text: name.clone(),
                },
            },
            Term::Call { name, args } => Value::Construct {
                class: node_name(name),
                args: self.build_all(args),
            },
            Term::Operator {
                op: Operator::Star | Operator::Plus | Operator::Optional | Operator::Lazy,
                operands,
            } if operands.len() == 1 => self.build(&operands[0]),
            Term::Tuple(items) => Value::Tuple {
                items: self.build_all(items),
            },
            Term::List(items) => Value::List {
                items: self.build_all(items),
            },
            Term::Map(entries) => Value::Map {
                entries: entries
                    .iter()
                    .map(|e| match e {
                        MapEntry::Pair { key, value } => (self.build(key), self.build(value)),
                        MapEntry::Element(p) => {
                            (self.build(&p.value), Value::Tuple { items: vec![] })
                        }
                    })
                    .collect(),
            },
            Term::Literal(_) => constant(term),
            other => Value::Literal {
                class: self.returns.to_string(),
                text: other.to_string(),
            },
        }
    }

    fn build_all(&self, params: &[Param]) -> Vec<Value> {
        params.iter().map(|p| self.build(&p.value)).collect()
    }
}

/// Branches compiled from the rules of one funcon.
#[derive(Debug, Default)]
pub struct CompiledRules {
    pub branches: Vec<Branch>,
    pub skipped_transitions: usize,
    pub warnings: Vec<String>,
}

/// Compiles the funcon's own rules followed by the orphan rules about it.
pub fn compile_rules(
    doc: &Document,
    funcon: &FunconDecl,
    layout: &ParamLayout,
    ctx: &LoweringContext,
    returns: &str,
) -> Result<CompiledRules, CbsError> {
    let mut compiled = CompiledRules::default();
    let orphans = doc.orphan_rules_for(funcon).map(|r| &r.rule);

    for rule in funcon.rules.iter().chain(orphans) {
        let (pattern, target) = match rule {
            Rule::TermRewrite { pattern, target } => (pattern, target),
            Rule::Transition { .. } => {
                compiled.skipped_transitions += 1;
                continue;
            }
        };

        let args: &[Param] = match pattern {
            Term::Call { args, .. } => args,
            Term::Identifier(_) => &[],
            other => {
                return Err(ctx.malformed(
                    &format!("rule pattern '{}' is not a funcon application", other),
                    ctx.find(&other.to_string()),
                ))
            }
        };

        let about_funcon = |head: &str| {
            funcon.answers_to(head) || doc.funcon(head).is_some_and(|f| f.name == funcon.name)
        };
        if pattern.head_name().is_some_and(|head| !about_funcon(head)) {
            let message = format!("rule '{}' is not about {}", rule_text(pattern, target), funcon.name);
            warn!("{}: {}", funcon.origin, message);
            compiled.warnings.push(message);
            continue;
        }

        let mut matcher = Matcher::new(doc, ctx, &funcon.name);
        matcher.match_args(layout, args, None)?;
        let matched = matcher.finish();

        compiled.branches.push(Branch {
            conditions: matched.conditions,
            result: Rewriter::new(&matched.bindings, returns).build(target),
            rule: rule_text(pattern, target),
        });
    }

    compiled.warnings.extend(overlaps(&compiled.branches));
    Ok(compiled)
}

fn rule_text(pattern: &Term, target: &Term) -> String {
    format!("{} ~> {}", pattern, target)
}

/// Branches that can never be chosen because an earlier branch matches
/// whenever they do.
pub fn overlaps(branches: &[Branch]) -> Vec<String> {
    let mut warnings = Vec::new();
    for (i, branch) in branches.iter().enumerate() {
        let conditions: HashSet<_> = branch.conditions.iter().collect();
        for (j, earlier) in branches[..i].iter().enumerate() {
            if earlier.conditions.is_empty() {
                warnings.push(format!(
                    "branch {} is unreachable: branch {} matches unconditionally",
                    i + 1,
                    j + 1
                ));
                break;
            }
            let previous: HashSet<_> = earlier.conditions.iter().collect();
            if previous == conditions {
                warnings.push(format!(
                    "branch {} repeats the conditions of branch {}",
                    i + 1,
                    j + 1
                ));
                break;
            }
        }
    }
    warnings
}
