mod common;

use cbsgen::ast::{Declaration, Rule, Term};
use cbsgen::driver::parse_batch;
use cbsgen::errors::{ErrorCategory, ErrorKind};
use cbsgen::syntax::keywords::Keyword;
use cbsgen::syntax::parse_term;
use cbsgen::ParseOptions;
use common::{fixture, parse_fixture};
use pretty_assertions::assert_eq;

#[test]
fn booleans_parse_into_grouped_declarations() {
    let report = parse_fixture("booleans.cbs");
    assert!(report.is_ok(), "{:?}", report.errors);

    let doc = &report.document;
    let funcons: Vec<_> = doc.funcons().map(|f| f.name.as_str()).collect();
    assert_eq!(funcons, vec!["not", "implies", "and"]);
    assert_eq!(doc.funcon("implies").unwrap().rules.len(), 4);
    assert_eq!(doc.funcon("neg").map(|f| f.name.as_str()), Some("not"));
    assert_eq!(doc.datatypes().next().unwrap().aliases[0].alias, "bools");
    assert_eq!(doc.standalone_aliases().count(), 0);
    assert_eq!(doc.orphan_rules().count(), 0);
    assert!(doc.is_metavariable("B'"));
}

#[test]
fn origins_point_at_declaration_lines() {
    let report = parse_fixture("booleans.cbs");
    let not = report.document.funcon("not").unwrap();
    assert!(not.origin.file.ends_with("booleans.cbs"));
    assert!(not.origin.line > 1);
    let implies = report.document.funcon("implies").unwrap();
    assert!(implies.origin.line > not.origin.line);
}

#[test]
fn transition_rules_attach_and_later_rules_become_orphans() {
    let report = parse_fixture("flowing.cbs");
    assert!(report.is_ok(), "{:?}", report.errors);

    let doc = &report.document;
    let ite = doc.funcon("if-true-else").unwrap();
    assert_eq!(ite.rules.len(), 3);
    assert!(matches!(ite.rules[2], Rule::Transition { .. }));

    let orphans: Vec<_> = doc.orphan_rules().collect();
    assert_eq!(orphans.len(), 1);
    assert_eq!(doc.orphan_rules_for(ite).count(), 1);

    assert_eq!(doc.entities().count(), 1);
    assert_eq!(doc.types().next().and_then(|t| t.name()), Some("null-type"));
    assert!(doc.funcon("effect").unwrap().rewrites_to.is_some());
}

#[test]
fn broken_components_are_isolated() {
    let report = parse_fixture("broken.cbs");
    assert_eq!(report.errors.len(), 1);
    let error = &report.errors[0];
    assert!(matches!(error.kind, ErrorKind::Syntax { .. }));
    assert_eq!(error.category(), ErrorCategory::Parse);
    assert_eq!(
        error.source_info.component.as_ref().map(|c| c.keyword.as_str()),
        Some("Funcon")
    );

    let names: Vec<_> = report.document.funcons().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["good", "twice"]);
    assert_eq!(report.document.standalone_aliases().count(), 1);
}

#[test]
fn batches_merge_documents_in_file_order() {
    let paths = vec![fixture("booleans.cbs"), fixture("flowing.cbs")];
    let batch = parse_batch(&paths, &ParseOptions::default());
    assert_eq!(batch.error_count(), 0);

    let doc = batch.document();
    assert_eq!(doc.funcons().count(), 7);
    assert_eq!(doc.get(Keyword::MetaVariables).len(), 3);
    // Cross-file: the datatype from one file resolves names used by another.
    assert!(doc.resolve("true").is_some());
    assert!(doc.resolve("sequential").is_some());
}

#[test]
fn declarations_print_back_to_parseable_terms() {
    let report = parse_fixture("flowing.cbs");
    for declaration in report.document.declarations() {
        let Declaration::Funcon(funcon) = declaration else {
            continue;
        };
        for param in &funcon.params {
            if let Some(ty) = &param.ty {
                assert_eq!(&parse_term(&ty.to_string()).unwrap(), ty);
            }
        }
        assert_eq!(parse_term(&funcon.returns.to_string()).unwrap(), funcon.returns);
    }
}

#[test]
fn keywords_are_not_terms() {
    for keyword in Keyword::ALL {
        assert!(parse_term(keyword.as_str()).is_err(), "{} parsed as a term", keyword);
    }
    assert_eq!(parse_term("Funcons").unwrap(), Term::ident("Funcons"));
}

#[test]
fn funcon_without_parameters() {
    let decls = cbsgen::syntax::parse_declaration(Keyword::Funcon, "Funcon stuck : =>empty-type").unwrap();
    let Declaration::Funcon(stuck) = &decls[0] else {
        panic!("expected a funcon");
    };
    assert_eq!(stuck.name, "stuck");
    assert!(stuck.params.is_empty());
    assert_eq!(stuck.returns.strip_markers(), &Term::ident("empty-type"));
    assert!(stuck.rules.is_empty());
}

#[test]
fn metavariables_share_one_definition() {
    let decls =
        cbsgen::syntax::parse_declaration(Keyword::MetaVariables, "Meta-variables T, T', T'' <: values")
            .unwrap();
    assert_eq!(decls.len(), 1);
    let Declaration::Metavariables(meta) = &decls[0] else {
        panic!("expected meta-variables");
    };
    let names: Vec<_> = meta.names.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["T", "T'", "T''"]);
    assert_eq!(meta.definition, Term::ident("values"));
}

#[test]
fn group_rule_keeps_pattern_and_target() {
    let decls = cbsgen::syntax::parse_declaration(
        Keyword::Rule,
        "Rule sequential(null-value, Y+) ~> sequential(Y+)",
    )
    .unwrap();
    let Declaration::Rule(rule) = &decls[0] else {
        panic!("expected a rule");
    };
    match &rule.rule {
        Rule::TermRewrite { pattern, target } => {
            assert_eq!(pattern, &parse_term("sequential(null-value, Y+)").unwrap());
            assert_eq!(target, &parse_term("sequential(Y+)").unwrap());
        }
        other => panic!("expected a rewrite, got {:?}", other),
    }
}

#[test]
fn long_infix_chains_hit_the_depth_limit() {
    let err = parse_term(&vec!["a"; 200_000].join(" | ")).unwrap_err();
    match err.kind {
        ErrorKind::RecursionLimit { limit, .. } => assert_eq!(limit, ParseOptions::default().max_depth),
        other => panic!("unexpected error {:?}", other),
    }

    let short = parse_term(&vec!["a"; 8].join(" | ")).unwrap();
    assert_eq!(short.to_string(), vec!["a"; 8].join(" | "));
}
