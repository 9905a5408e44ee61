//! The parsed form of one or more CBS files.
//!
//! A [`Document`] maps each declaration kind to its declarations in
//! encounter order. Name lookups always run against the whole document so
//! references may cross file boundaries once documents are merged.

use crate::ast::{
    AliasDecl, DatatypeDecl, Declaration, EntityDecl, FunconDecl, MetavarDecl, Param,
    RuleDecl, Term, TypeDecl,
};
use crate::errors::{CbsError, ErrorReporting, LoweringContext};
use crate::syntax::keywords::Keyword;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    declarations: BTreeMap<Keyword, Vec<Declaration>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, declaration: Declaration) {
        self.declarations
            .entry(declaration.keyword())
            .or_default()
            .push(declaration);
    }

    /// Appends every declaration of `other`, keeping per-kind order.
    pub fn merge(&mut self, other: Document) {
        for (keyword, declarations) in other.declarations {
            self.declarations
                .entry(keyword)
                .or_default()
                .extend(declarations);
        }
    }

    pub fn get(&self, keyword: Keyword) -> &[Declaration] {
        self.declarations
            .get(&keyword)
            .map_or(&[], Vec::as_slice)
    }

    /// Most recently pushed declaration of a kind.
    pub fn last_mut(&mut self, keyword: Keyword) -> Option<&mut Declaration> {
        self.declarations.get_mut(&keyword)?.last_mut()
    }

    /// Every declaration, kind by kind.
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.declarations.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of declarations per kind, in keyword order, including zeros.
    pub fn counts(&self) -> Vec<(Keyword, usize)> {
        Keyword::ALL
            .into_iter()
            .map(|k| (k, self.get(k).len()))
            .collect()
    }

    // ========================================================================
    // TYPED ACCESSORS
    // ========================================================================

    pub fn funcons(&self) -> impl Iterator<Item = &FunconDecl> {
        self.get(Keyword::Funcon).iter().filter_map(|d| match d {
            Declaration::Funcon(f) => Some(f),
            _ => None,
        })
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.get(Keyword::Type).iter().filter_map(|d| match d {
            Declaration::Type(t) => Some(t),
            _ => None,
        })
    }

    pub fn datatypes(&self) -> impl Iterator<Item = &DatatypeDecl> {
        self.get(Keyword::Datatype).iter().filter_map(|d| match d {
            Declaration::Datatype(t) => Some(t),
            _ => None,
        })
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDecl> {
        self.get(Keyword::Entity).iter().filter_map(|d| match d {
            Declaration::Entity(e) => Some(e),
            _ => None,
        })
    }

    pub fn metavariables(&self) -> impl Iterator<Item = &MetavarDecl> {
        self.get(Keyword::MetaVariables).iter().filter_map(|d| match d {
            Declaration::Metavariables(m) => Some(m),
            _ => None,
        })
    }

    /// Aliases that were not attached to a declaration while parsing.
    pub fn standalone_aliases(&self) -> impl Iterator<Item = &AliasDecl> {
        self.get(Keyword::Alias).iter().filter_map(|d| match d {
            Declaration::Alias(a) => Some(a),
            _ => None,
        })
    }

    /// Rules that were not attached to a funcon while parsing.
    pub fn orphan_rules(&self) -> impl Iterator<Item = &RuleDecl> {
        self.get(Keyword::Rule).iter().filter_map(|d| match d {
            Declaration::Rule(r) => Some(r),
            _ => None,
        })
    }

    // ========================================================================
    // NAME RESOLUTION
    // ========================================================================

    /// The funcon answering to `name` directly or through an alias.
    pub fn funcon(&self, name: &str) -> Option<&FunconDecl> {
        let name = self.canonical(name);
        self.funcons().find(|f| f.answers_to(name))
    }

    /// The declaration introducing `name`. Aliases are followed, and a
    /// datatype constructor resolves to its datatype.
    pub fn resolve(&self, name: &str) -> Option<&Declaration> {
        let name = self.canonical(name);
        self.declarations()
            .filter(|d| d.keyword() != Keyword::Alias)
            .find(|d| d.name() == Some(name) || d.aliases().iter().any(|a| a.alias == name))
            .or_else(|| {
                self.get(Keyword::Datatype).iter().find(|d| match d {
                    Declaration::Datatype(dt) => dt.constructs(name),
                    _ => false,
                })
            })
    }

    /// Follows standalone aliases to the name they stand for.
    fn canonical<'a>(&'a self, mut name: &'a str) -> &'a str {
        // A chain longer than the number of aliases is a cycle.
        for _ in 0..=self.get(Keyword::Alias).len() {
            match self.standalone_aliases().find(|a| a.alias == name) {
                Some(alias) => name = &alias.original,
                None => break,
            }
        }
        name
    }

    /// Parameter list of a funcon, a datatype or a datatype constructor.
    pub fn signature(&self, name: &str) -> Option<&[Param]> {
        if let Some(funcon) = self.funcon(name) {
            return Some(&funcon.params);
        }
        let name = self.canonical(name);
        self.datatypes().find_map(|dt| {
            if dt.name == name {
                return Some(dt.params.as_slice());
            }
            dt.alternatives()
                .into_iter()
                .find_map(|alt| match alt.strip_markers() {
                    Term::Call { name: ctor, args } if ctor == name => Some(args.as_slice()),
                    _ => None,
                })
        })
    }

    /// Orphan rules whose pattern is headed by the funcon or one of its
    /// aliases.
    pub fn orphan_rules_for<'a>(
        &'a self,
        funcon: &'a FunconDecl,
    ) -> impl Iterator<Item = &'a RuleDecl> + 'a {
        self.orphan_rules().filter(move |r| {
            r.rule
                .head_name()
                .is_some_and(|head| funcon.answers_to(self.canonical(head)))
        })
    }

    /// The `Meta-variables` binding that declares `name`.
    pub fn metavariable(&self, name: &str) -> Option<&MetavarDecl> {
        self.metavariables()
            .find(|m| m.names.iter().any(|v| v.name == name))
    }

    pub fn is_metavariable(&self, name: &str) -> bool {
        self.metavariable(name).is_some()
    }

    /// Reports aliases whose original is undeclared and funcon rewrite
    /// targets headed by undeclared names.
    pub fn check_references(&self) -> Vec<CbsError> {
        let mut errors = Vec::new();

        for alias in self.standalone_aliases() {
            if self.resolve(&alias.original).is_none() {
                let ctx = LoweringContext::new(&alias.origin.to_string(), alias_text(alias));
                errors.push(ctx.unresolved(
                    &alias.original,
                    &alias.alias,
                    ctx.find(&alias.original),
                ));
            }
        }

        for declaration in self.declarations() {
            let Some(owner) = declaration.name() else {
                continue;
            };
            for alias in declaration.aliases() {
                if alias.original != owner && self.resolve(&alias.original).is_none() {
                    let ctx = LoweringContext::new(&alias.origin.to_string(), alias_text(alias));
                    errors.push(ctx.unresolved(&alias.original, owner, ctx.find(&alias.original)));
                }
            }
        }

        for funcon in self.funcons() {
            let Some(target) = &funcon.rewrites_to else {
                continue;
            };
            let rendered = funcon.to_string();
            for name in target.call_names() {
                if self.resolve(name).is_none() {
                    let ctx = LoweringContext::new(&funcon.origin.to_string(), rendered.clone());
                    errors.push(ctx.unresolved(name, &funcon.name, ctx.find(name)));
                }
            }
        }

        errors
    }
}

fn alias_text(alias: &AliasDecl) -> String {
    format!("Alias {} = {}", alias.alias, alias.original)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::parse_declaration;

    fn document(components: &[(Keyword, &str)]) -> Document {
        let mut doc = Document::new();
        for (keyword, text) in components {
            for decl in parse_declaration(*keyword, text).unwrap() {
                doc.push(decl);
            }
        }
        doc
    }

    #[test]
    fn keeps_per_kind_order_across_merges() {
        let mut first = document(&[(Keyword::Funcon, "Funcon a : values"), (Keyword::Type, "Type t")]);
        let second = document(&[(Keyword::Funcon, "Funcon b : values")]);
        first.merge(second);
        let names: Vec<_> = first.funcons().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(first.len(), 3);
        assert_eq!(first.counts()[0], (Keyword::Funcon, 2));
    }

    #[test]
    fn resolves_aliases_and_constructors() {
        let doc = document(&[
            (Keyword::Datatype, "Datatype lists(T) ::= nil | cons(_:T, _:lists(T))"),
            (Keyword::Funcon, "Funcon not(_:booleans) : booleans\nAlias neg = not"),
            (Keyword::Alias, "Alias negate = neg"),
        ]);
        assert_eq!(doc.resolve("neg").and_then(Declaration::name), Some("not"));
        assert_eq!(doc.resolve("negate").and_then(Declaration::name), Some("not"));
        assert_eq!(doc.resolve("cons").and_then(Declaration::name), Some("lists"));
        assert_eq!(doc.signature("cons").map(<[Param]>::len), Some(2));
        assert!(doc.resolve("missing").is_none());
    }

    #[test]
    fn alias_cycles_terminate() {
        let doc = document(&[(Keyword::Alias, "Alias a = b"), (Keyword::Alias, "Alias b = a")]);
        assert!(doc.resolve("a").is_none());
    }

    #[test]
    fn reports_unresolved_references() {
        let doc = document(&[
            (Keyword::Funcon, "Funcon f : values ~> g(h)"),
            (Keyword::Alias, "Alias e = missing"),
        ]);
        let errors = doc.check_references();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.category() == crate::errors::ErrorCategory::Lowering));
    }

    #[test]
    fn finds_orphan_rules_through_aliases() {
        let doc = document(&[
            (Keyword::Funcon, "Funcon not(_:booleans) : booleans\nAlias neg = not"),
            (Keyword::Rule, "Rule neg(true) ~> false"),
            (Keyword::Rule, "Rule other(true) ~> false"),
        ]);
        let funcon = doc.funcon("not").unwrap();
        assert_eq!(doc.orphan_rules_for(funcon).count(), 1);
    }

    #[test]
    fn metavariables_are_looked_up_by_name() {
        let doc = document(&[(Keyword::MetaVariables, "Meta-variables T, T' <: values")]);
        assert!(doc.is_metavariable("T'"));
        assert!(!doc.is_metavariable("U"));
    }

    #[test]
    fn serializes_as_a_kind_keyed_map() {
        let doc = document(&[(Keyword::Type, "Type t")]);
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("Type").is_some());
    }
}
