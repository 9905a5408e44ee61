//! Lowering: turns parsed declarations into [`NodeSpec`]s.
//!
//! Every funcon becomes a node class whose children mirror its parameters.
//! Its body is a signature only, a single unconditional rewrite, or an
//! ordered list of branches compiled from its rewrite rules. Datatypes
//! become a class per constructor.

pub mod layout;
pub mod pattern;
pub mod render;
pub mod rewrite;
pub mod spec;

pub use layout::{Location, ParamLayout, SlotKind};
pub use render::{render, render_all, to_json};
pub use spec::{
    Access, Branch, ChildSlot, Condition, Constructor, NodeBody, NodeSpec, SpecKind, Value,
};

use crate::ast::{AssignOp, DatatypeDecl, FunconDecl, Param, Term};
use crate::config::LowerOptions;
use crate::document::Document;
use crate::errors::{CbsError, LoweringContext};
use pattern::is_variable;
use rewrite::{compile_rules, Rewriter};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Meta-variable definitions followed before giving up on a class.
const CLASS_LOOKUP_DEPTH: usize = 8;

/// `if-true-else` becomes `IfTrueElseNode`.
pub fn node_name(name: &str) -> String {
    let mut class: String = name
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<String>()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    class.push_str("Node");
    class
}

/// Node class standing for values of the type term `ty`.
pub fn class_of(doc: &Document, ty: &Term) -> String {
    class_at_depth(doc, ty, 0)
}

fn class_at_depth(doc: &Document, ty: &Term, depth: usize) -> String {
    match ty.strip_markers() {
        Term::Identifier(name) if depth < CLASS_LOOKUP_DEPTH => match doc.metavariable(name) {
            Some(meta) => class_at_depth(doc, &meta.definition, depth + 1),
            None => node_name(name),
        },
        Term::Call { name, .. } => node_name(name),
        Term::Tuple(_) => "TupleNode".to_string(),
        Term::List(_) => "ListNode".to_string(),
        Term::Map(_) => "MapNode".to_string(),
        _ => "ValuesNode".to_string(),
    }
}

fn child_slots(doc: &Document, layout: &ParamLayout, params: &[Param]) -> Vec<ChildSlot> {
    params
        .iter()
        .enumerate()
        .map(|(i, param)| ChildSlot {
            name: format!("p{}", i),
            kind: layout.kind_of(i),
            arity: param.arity(),
            class: class_of(doc, param.ty.as_ref().unwrap_or(&param.value)),
            lazy: param.is_lazy(),
        })
        .collect()
}

/// Specs and errors from lowering a whole document. One declaration failing
/// does not stop the others.
#[derive(Debug, Default)]
pub struct LoweringReport {
    pub specs: Vec<NodeSpec>,
    pub errors: Vec<CbsError>,
}

impl LoweringReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn lower_document(doc: &Document, options: &LowerOptions) -> LoweringReport {
    let mut report = LoweringReport {
        errors: doc.check_references(),
        ..LoweringReport::default()
    };

    for funcon in doc.funcons() {
        if options.skips(&funcon.name) {
            debug!("skipping funcon {}", funcon.name);
            continue;
        }
        debug!("lowering funcon {}", funcon.name);
        match lower_funcon(doc, funcon, options) {
            Ok(spec) => report.specs.push(spec),
            Err(e) => report.errors.push(e),
        }
    }

    for datatype in doc.datatypes() {
        debug!("lowering datatype {}", datatype.name);
        match lower_datatype(doc, datatype) {
            Ok(spec) => report.specs.push(spec),
            Err(e) => report.errors.push(e),
        }
    }

    for orphan in doc.orphan_rules() {
        if let Some(head) = orphan.rule.head_name() {
            if doc.funcon(head).is_none() {
                warn!("{}: rule about undeclared funcon {}", orphan.origin, head);
            }
        }
    }

    info!(
        "lowered {} node specs with {} errors",
        report.specs.len(),
        report.errors.len()
    );
    report
}

pub fn lower_funcon(
    doc: &Document,
    funcon: &FunconDecl,
    options: &LowerOptions,
) -> Result<NodeSpec, CbsError> {
    let ctx = LoweringContext::new(&funcon.origin.to_string(), funcon.to_string());
    let layout = ParamLayout::classify(&funcon.name, &funcon.params, &ctx)?;

    let mut spec = NodeSpec {
        name: funcon.name.clone(),
        class_name: node_name(&funcon.name),
        kind: SpecKind::Funcon,
        children: child_slots(doc, &layout, &funcon.params),
        returns: class_of(doc, &funcon.returns),
        supertype: None,
        aliases: funcon.aliases.iter().map(|a| a.alias.clone()).collect(),
        body: NodeBody::Interface,
        origin: funcon.origin.clone(),
        warnings: Vec::new(),
        skipped_transitions: 0,
    };

    if funcon.is_builtin() && options.skip_builtin {
        debug!("{} is built-in, emitting signature only", funcon.name);
        return Ok(spec);
    }

    if let Some(target) = &funcon.rewrites_to {
        let bindings = parameter_bindings(doc, &layout, &funcon.params);
        spec.body = NodeBody::Unconditional(Rewriter::new(&bindings, &spec.returns).build(target));
        if !funcon.rules.is_empty() {
            spec.warnings
                .push("rules ignored: the funcon rewrites unconditionally".to_string());
        }
        return Ok(spec);
    }

    let compiled = compile_rules(doc, funcon, &layout, &ctx, &spec.returns)?;
    if compiled.skipped_transitions > 0 {
        warn!(
            "{}: {} transition rules of {} not generated",
            funcon.origin, compiled.skipped_transitions, funcon.name
        );
    }
    for warning in &compiled.warnings {
        warn!("{}: {}: {}", funcon.origin, funcon.name, warning);
    }
    spec.skipped_transitions = compiled.skipped_transitions;
    spec.warnings.extend(compiled.warnings);
    if !compiled.branches.is_empty() {
        spec.body = NodeBody::Dispatch(compiled.branches);
    }
    Ok(spec)
}

/// Named parameters bound to their own child slots; the vararg is spread.
fn parameter_bindings(
    doc: &Document,
    layout: &ParamLayout,
    params: &[Param],
) -> BTreeMap<String, Value> {
    params
        .iter()
        .enumerate()
        .filter_map(|(slot, param)| match param.value.strip_markers() {
            Term::Identifier(name) if name != "_" && is_variable(doc, name) => {
                let at = Access::child(slot);
                let value = match layout.kind_of(slot) {
                    SlotKind::Vararg => Value::Spread { at },
                    _ => Value::Field { at },
                };
                Some((name.clone(), value))
            }
            _ => None,
        })
        .collect()
}

pub fn lower_datatype(doc: &Document, datatype: &DatatypeDecl) -> Result<NodeSpec, CbsError> {
    let ctx = LoweringContext::new(&datatype.origin.to_string(), datatype.to_string());
    let layout = ParamLayout::classify(&datatype.name, &datatype.params, &ctx)?;
    let class_name = node_name(&datatype.name);

    let mut spec = NodeSpec {
        name: datatype.name.clone(),
        class_name: class_name.clone(),
        kind: SpecKind::Datatype,
        children: child_slots(doc, &layout, &datatype.params),
        returns: class_name,
        supertype: None,
        aliases: datatype.aliases.iter().map(|a| a.alias.clone()).collect(),
        body: NodeBody::Interface,
        origin: datatype.origin.clone(),
        warnings: Vec::new(),
        skipped_transitions: 0,
    };

    match (datatype.assign, &datatype.definition) {
        (Some(AssignOp::Subtype), Some(parent)) => {
            spec.supertype = Some(class_of(doc, parent));
        }
        (Some(AssignOp::Define), Some(_)) => {
            let mut constructors = Vec::new();
            for alternative in datatype.alternatives() {
                constructors.push(match alternative.strip_markers() {
                    Term::Call { name, args } => {
                        let layout = ParamLayout::classify(name, args, &ctx)?;
                        Constructor {
                            name: name.clone(),
                            class_name: node_name(name),
                            children: child_slots(doc, &layout, args),
                        }
                    }
                    Term::Identifier(name) => Constructor {
                        name: name.clone(),
                        class_name: node_name(name),
                        children: Vec::new(),
                    },
                    other => Constructor {
                        name: other.to_string(),
                        class_name: class_of(doc, other),
                        children: Vec::new(),
                    },
                });
            }
            spec.body = NodeBody::Constructors(constructors);
        }
        _ => {}
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::syntax::keywords::Keyword;
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

    fn lower_only(doc: &Document) -> NodeSpec {
        let funcon = doc.funcons().next().unwrap();
        lower_funcon(doc, funcon, &LowerOptions::default()).unwrap()
    }

    #[test]
    fn class_names_are_camel_cased() {
        assert_eq!(node_name("if-true-else"), "IfTrueElseNode");
        assert_eq!(node_name("null-value"), "NullValueNode");
        assert_eq!(node_name("T'"), "TNode");
    }

    #[test]
    fn metavariables_take_the_class_of_their_definition() {
        let doc = document(&[(Keyword::MetaVariables, "Meta-variables T <: values")]);
        assert_eq!(class_of(&doc, &Term::ident("T")), "ValuesNode");
        assert_eq!(class_of(&doc, &Term::ident("booleans")), "BooleansNode");
    }

    #[test]
    fn group_after_a_literal_slices_the_vararg() {
        let doc = document(&[(
            Keyword::Funcon,
            "Funcon sequential(_:values*) : values\n\
             Rule sequential(null-value, Y+) ~> sequential(Y+)",
        )]);
        let spec = lower_only(&doc);
        let NodeBody::Dispatch(branches) = &spec.body else {
            panic!("expected dispatch, got {:?}", spec.body);
        };
        assert_eq!(branches.len(), 1);
        assert!(branches[0].conditions.contains(&Condition::Equals {
            at: Access::Element {
                of: Box::new(Access::child(0)),
                index: 0
            },
            value: Value::Atom {
                name: "null-value".into()
            },
        }));
        assert_eq!(
            branches[0].result,
            Value::Construct {
                class: "SequentialNode".into(),
                args: vec![Value::Slice {
                    at: Access::child(0),
                    from: 1,
                    back: 0
                }],
            }
        );
    }

    #[test]
    fn two_variadic_parameters_fail_lowering() {
        let doc = document(&[(Keyword::Funcon, "Funcon f(_:values*, _:values*) : values")]);
        let report = lower_document(&doc, &LowerOptions::default());
        assert!(report.specs.is_empty());
        assert!(matches!(
            report.errors[0].kind,
            ErrorKind::ArityConsistency { .. }
        ));
    }

    #[test]
    fn unconditional_rewrite_spreads_the_vararg() {
        let doc = document(&[(
            Keyword::Funcon,
            "Funcon tuple(V*:values*) : values ~> tuple-of(V*)",
        )]);
        let spec = lower_only(&doc);
        assert_eq!(
            spec.body,
            NodeBody::Unconditional(Value::Construct {
                class: "TupleOfNode".into(),
                args: vec![Value::Spread {
                    at: Access::child(0)
                }],
            })
        );
        assert_eq!(spec.children[0].kind, SlotKind::Vararg);
    }

    #[test]
    fn builtins_and_skipped_funcons() {
        let doc = document(&[
            (Keyword::Funcon, "Built-in Funcon print(_:values*) : null-type"),
            (Keyword::Funcon, "Funcon stuck : empty-type"),
        ]);
        let options = LowerOptions {
            skip: vec!["stuck".into()],
            skip_builtin: true,
        };
        let report = lower_document(&doc, &options);
        assert_eq!(report.specs.len(), 1);
        assert_eq!(report.specs[0].body, NodeBody::Interface);
        assert_eq!(report.specs[0].returns, "NullTypeNode");
    }

    #[test]
    fn transition_rules_are_counted_not_compiled() {
        let doc = document(&[(
            Keyword::Funcon,
            "Funcon give(_:values, _:=>values) : values\n\
             Rule give(V, X) --> give(V, X)\n\
             Rule give(V, W) ~> W",
        )]);
        let spec = lower_only(&doc);
        assert_eq!(spec.skipped_transitions, 1);
        assert!(matches!(spec.body, NodeBody::Dispatch(ref b) if b.len() == 1));
        assert!(spec.children[1].lazy);
    }

    #[test]
    fn duplicate_patterns_are_flagged() {
        let doc = document(&[(
            Keyword::Funcon,
            "Funcon not(_:booleans) : booleans\n\
             Rule not(false) ~> true\n\
             Rule not(false) ~> false",
        )]);
        let spec = lower_only(&doc);
        assert_eq!(spec.warnings.len(), 1);
    }

    #[test]
    fn datatypes_list_their_constructors() {
        let doc = document(&[(
            Keyword::Datatype,
            "Datatype lists(T) ::= nil | cons(_:T, _:lists(T))",
        )]);
        let spec = lower_datatype(&doc, doc.datatypes().next().unwrap()).unwrap();
        let NodeBody::Constructors(ctors) = &spec.body else {
            panic!("expected constructors");
        };
        let names: Vec<_> = ctors.iter().map(|c| c.class_name.as_str()).collect();
        assert_eq!(names, vec!["NilNode", "ConsNode"]);
        assert_eq!(ctors[1].children[1].class, "ListsNode");
    }

    #[test]
    fn subtype_datatypes_record_their_parent() {
        let doc = document(&[(Keyword::Datatype, "Datatype bits <: integers")]);
        let spec = lower_datatype(&doc, doc.datatypes().next().unwrap()).unwrap();
        assert_eq!(spec.supertype.as_deref(), Some("IntegersNode"));
        assert_eq!(spec.body, NodeBody::Interface);
    }
}
