//! CBS Parser
//!
//! Converts component text into AST declarations. The pest grammar handles
//! recognition; the builders below keep only semantic fields, dropping
//! keyword and punctuation pairs. Operator precedence is resolved by a
//! shared Pratt parser built once on first use.

use crate::ast::{
    self, Action, AliasDecl, Arity, AssertDecl, AssignOp, DatatypeDecl, Declaration, EntityDecl,
    FunconDecl, Literal, MapEntry, Metavar, MetavarDecl, Operator, Origin, Param, Polarity,
    Premise, RuleDecl, Side, Step, Term, Transition, TypeDecl,
};
use crate::config::ParseOptions;
use crate::errors::{CbsError, ErrorKind, ErrorReporting, ParseContext, SourceContext};
use crate::syntax::keywords::{Keyword, Qualifier};
use miette::SourceSpan;
use once_cell::sync::Lazy;
use pest::error::{ErrorVariant, InputLocation};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct CbsParser;

/// Postfix binds tightest, then prefix, then infix.
static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left)
            | Op::infix(Rule::and_op, Assoc::Left)
            | Op::infix(Rule::computes, Assoc::Left))
        .op(Op::prefix(Rule::lazy) | Op::prefix(Rule::complement))
        .op(Op::postfix(Rule::star) | Op::postfix(Rule::plus) | Op::postfix(Rule::qmark))
});

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse a standalone term with default limits.
pub fn parse_term(text: &str) -> Result<Term, CbsError> {
    let ctx = ParseContext::new(SourceContext::from_file("<term>", text));
    parse_term_with(text, &ctx, &ParseOptions::default())
}

pub fn parse_term_with(
    text: &str,
    ctx: &ParseContext,
    options: &ParseOptions,
) -> Result<Term, CbsError> {
    let entry = parse_entry(Rule::term_entry, text, ctx, options)?;
    let expr = first_inner(entry, "term", ctx)?;
    build_expr(expr, ctx)
}

/// Parse the text of one component. Most components yield one declaration;
/// a `Meta-variables` component yields one per `<:` binding.
pub fn parse_component(
    keyword: Keyword,
    text: &str,
    ctx: &ParseContext,
    options: &ParseOptions,
) -> Result<Vec<Declaration>, CbsError> {
    let entry = parse_entry(entry_rule(keyword), text, ctx, options)?;
    let declaration = match keyword {
        Keyword::Funcon => Declaration::Funcon(build_funcon(entry, ctx)?),
        Keyword::Type => Declaration::Type(build_type(entry, ctx)?),
        Keyword::Datatype => Declaration::Datatype(build_datatype(entry, ctx)?),
        Keyword::Entity => Declaration::Entity(build_entity(entry, ctx)?),
        Keyword::MetaVariables => {
            return Ok(build_metavariables(entry, ctx)?
                .into_iter()
                .map(Declaration::Metavariables)
                .collect())
        }
        Keyword::Alias => Declaration::Alias(build_alias(entry, ctx)?),
        Keyword::Rule => Declaration::Rule(build_rule_component(entry, ctx)?),
        Keyword::Assert => Declaration::Assert(build_assert(entry, ctx)?),
    };
    Ok(vec![declaration])
}

/// Parse a single declaration of a known kind with default limits.
pub fn parse_declaration(keyword: Keyword, text: &str) -> Result<Vec<Declaration>, CbsError> {
    let ctx = ParseContext::new(SourceContext::from_file("<declaration>", text));
    parse_component(keyword, text, &ctx, &ParseOptions::default())
}

/// Deepest nesting in `text` with the offset where it is reached. Brackets
/// count one level each, as does every infix operator chained inside the
/// same bracket and every marker in a run of arity and prefix markers.
pub fn nesting_depth(text: &str) -> (usize, usize) {
    let (mut depth, mut run, mut max, mut at) = (0usize, 0usize, 0usize, 0usize);
    // Infix operators seen per open bracket, innermost last.
    let mut chains: Vec<usize> = vec![0];
    let mut chained = 0usize;
    let mut in_string = false;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if in_string {
            in_string = c != '"';
            continue;
        }
        let next = chars.peek().map(|&(_, n)| n);
        let mut infix = false;
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => {
                depth += 1;
                run = 0;
                chains.push(0);
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                run = 0;
                if chains.len() > 1 {
                    chained -= chains.pop().unwrap_or(0);
                }
            }
            ',' | ':' => {
                run = 0;
                if let Some(chain) = chains.last_mut() {
                    chained -= *chain;
                    *chain = 0;
                }
            }
            '|' if !matches!(next, Some('-' | '|')) => infix = true,
            '&' => infix = true,
            '=' if next == Some('>') => {
                chars.next();
                infix = true;
            }
            '~' if next != Some('>') => run += 1,
            '*' | '+' | '?' => run += 1,
            c if c.is_whitespace() => {}
            _ => run = 0,
        }
        if infix {
            if let Some(chain) = chains.last_mut() {
                *chain += 1;
                chained += 1;
            }
        }
        if depth + chained + run > max {
            max = depth + chained + run;
            at = i;
        }
    }
    (max, at)
}

// ============================================================================
// ENTRY
// ============================================================================

fn entry_rule(keyword: Keyword) -> Rule {
    match keyword {
        Keyword::Funcon => Rule::funcon_component,
        Keyword::Type => Rule::type_component,
        Keyword::Datatype => Rule::datatype_component,
        Keyword::Entity => Rule::entity_component,
        Keyword::MetaVariables => Rule::metavariables_component,
        Keyword::Alias => Rule::alias_component,
        Keyword::Rule => Rule::rule_component,
        Keyword::Assert => Rule::assert_component,
    }
}

fn parse_entry<'i>(
    rule: Rule,
    text: &'i str,
    ctx: &ParseContext,
    options: &ParseOptions,
) -> Result<Pair<'i, Rule>, CbsError> {
    let (depth, at) = nesting_depth(text);
    if depth > options.max_depth {
        return Err(ctx.report(
            ErrorKind::RecursionLimit {
                measure: format!("nesting depth {}", depth),
                limit: options.max_depth,
            },
            SourceSpan::from(at..at + 1),
        ));
    }

    pest::set_call_limit(options.call_limit);
    let mut pairs =
        CbsParser::parse(rule, text).map_err(|e| convert_error(e, text, ctx, options))?;
    pairs
        .next()
        .ok_or_else(|| ctx.malformed(&describe(rule), SourceSpan::from(0..text.len())))
}

// ============================================================================
// DECLARATION BUILDERS
// ============================================================================

fn build_funcon(pair: Pair<Rule>, ctx: &ParseContext) -> Result<FunconDecl, CbsError> {
    let span = span_of(&pair);
    let mut qualifier = None;
    let mut name = None;
    let mut params = Vec::new();
    let mut returns = None;
    let mut rewrites_to = None;
    let mut aliases = Vec::new();
    let mut rules = Vec::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::qualifier => qualifier = Qualifier::from_word(p.as_str()),
            Rule::identifier => name = Some(p.as_str().to_string()),
            Rule::signature_params => params = build_params_in(p, ctx)?,
            Rule::expr => returns = Some(build_expr(p, ctx)?),
            Rule::rewrites_to => rewrites_to = Some(build_inner_expr(p, ctx)?),
            Rule::alias_clause => aliases.push(build_alias(p, ctx)?),
            Rule::rule_clause => {
                let body = find_inner(p, Rule::rule_body, "rule body", ctx)?;
                rules.push(build_rule_body(body, ctx)?);
            }
            _ => {}
        }
    }

    Ok(FunconDecl {
        qualifier,
        name: name.ok_or_else(|| ctx.malformed("funcon name", span))?,
        params,
        returns: returns.ok_or_else(|| ctx.malformed("funcon return type", span))?,
        rewrites_to,
        aliases,
        rules,
        origin: origin(ctx),
    })
}

fn build_type(pair: Pair<Rule>, ctx: &ParseContext) -> Result<TypeDecl, CbsError> {
    let span = span_of(&pair);
    let mut qualifier = None;
    let mut term = None;
    let mut definition = None;
    let mut rewrites_to = None;
    let mut aliases = Vec::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::qualifier => qualifier = Qualifier::from_word(p.as_str()),
            Rule::expr => term = Some(build_expr(p, ctx)?),
            Rule::type_definition => definition = Some(build_inner_expr(p, ctx)?),
            Rule::rewrites_to => rewrites_to = Some(build_inner_expr(p, ctx)?),
            Rule::alias_clause => aliases.push(build_alias(p, ctx)?),
            _ => {}
        }
    }

    Ok(TypeDecl {
        qualifier,
        term: term.ok_or_else(|| ctx.malformed("type term", span))?,
        definition,
        rewrites_to,
        aliases,
        origin: origin(ctx),
    })
}

fn build_datatype(pair: Pair<Rule>, ctx: &ParseContext) -> Result<DatatypeDecl, CbsError> {
    let span = span_of(&pair);
    let mut qualifier = None;
    let mut name = None;
    let mut params = Vec::new();
    let mut assign = None;
    let mut definition = None;
    let mut aliases = Vec::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::qualifier => qualifier = Qualifier::from_word(p.as_str()),
            Rule::identifier => name = Some(p.as_str().to_string()),
            Rule::signature_params => params = build_params_in(p, ctx)?,
            Rule::datatype_definition => {
                for d in p.into_inner() {
                    match d.as_rule() {
                        Rule::define_op => assign = Some(AssignOp::Define),
                        Rule::subtype_op => assign = Some(AssignOp::Subtype),
                        Rule::expr => definition = Some(build_expr(d, ctx)?),
                        _ => {}
                    }
                }
            }
            Rule::alias_clause => aliases.push(build_alias(p, ctx)?),
            _ => {}
        }
    }

    Ok(DatatypeDecl {
        qualifier,
        name: name.ok_or_else(|| ctx.malformed("datatype name", span))?,
        params,
        assign,
        definition,
        aliases,
        origin: origin(ctx),
    })
}

fn build_entity(pair: Pair<Rule>, ctx: &ParseContext) -> Result<EntityDecl, CbsError> {
    let span = span_of(&pair);
    let mut transition = None;
    let mut aliases = Vec::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::mutable_premise | Rule::step_premise => {
                if let Premise::ContextualTransition(t) = build_premise(p, ctx)? {
                    transition = Some(t);
                }
            }
            Rule::alias_clause => aliases.push(build_alias(p, ctx)?),
            _ => {}
        }
    }

    Ok(EntityDecl {
        transition: transition.ok_or_else(|| ctx.malformed("entity transition", span))?,
        aliases,
        origin: origin(ctx),
    })
}

fn build_metavariables(
    pair: Pair<Rule>,
    ctx: &ParseContext,
) -> Result<Vec<MetavarDecl>, CbsError> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::metavar_def)
        .map(|def| {
            let span = span_of(&def);
            let mut names = Vec::new();
            let mut definition = None;
            for p in def.into_inner() {
                match p.as_rule() {
                    Rule::metavar_name => names.push(build_metavar(p, ctx)?),
                    Rule::expr => definition = Some(build_expr(p, ctx)?),
                    _ => {}
                }
            }
            Ok(MetavarDecl {
                names,
                definition: definition
                    .ok_or_else(|| ctx.malformed("meta-variable definition", span))?,
                origin: origin(ctx),
            })
        })
        .collect()
}

fn build_metavar(pair: Pair<Rule>, ctx: &ParseContext) -> Result<Metavar, CbsError> {
    let span = span_of(&pair);
    let mut name = None;
    let mut arity = Arity::Single;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::identifier => name = Some(p.as_str().to_string()),
            Rule::star => arity = Arity::Star,
            Rule::plus => arity = Arity::Plus,
            Rule::qmark => arity = Arity::Optional,
            _ => {}
        }
    }
    Ok(Metavar {
        name: name.ok_or_else(|| ctx.malformed("meta-variable name", span))?,
        arity,
    })
}

/// Works for both the `Alias` component and an alias clause.
fn build_alias(pair: Pair<Rule>, ctx: &ParseContext) -> Result<AliasDecl, CbsError> {
    let body = find_inner(pair, Rule::alias_body, "alias", ctx)?;
    build_alias_body(body, ctx)
}

fn build_alias_body(pair: Pair<Rule>, ctx: &ParseContext) -> Result<AliasDecl, CbsError> {
    let span = span_of(&pair);
    let names: Vec<String> = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::identifier)
        .map(|p| p.as_str().to_string())
        .collect();
    match <[String; 2]>::try_from(names) {
        Ok([alias, original]) => Ok(AliasDecl {
            alias,
            original,
            origin: origin(ctx),
        }),
        Err(_) => Err(ctx.malformed("alias", span)),
    }
}

fn build_rule_component(pair: Pair<Rule>, ctx: &ParseContext) -> Result<RuleDecl, CbsError> {
    let body = find_inner(pair, Rule::rule_body, "rule body", ctx)?;
    Ok(RuleDecl {
        rule: build_rule_body(body, ctx)?,
        origin: origin(ctx),
    })
}

fn build_assert(pair: Pair<Rule>, ctx: &ParseContext) -> Result<AssertDecl, CbsError> {
    let span = span_of(&pair);
    let mut terms = Vec::new();
    let mut context = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::expr => terms.push(build_expr(p, ctx)?),
            Rule::mapping => context = Some(build_primary(p, ctx)?),
            _ => {}
        }
    }
    let mut terms = terms.into_iter();
    match (terms.next(), terms.next()) {
        (Some(term), Some(expected)) => Ok(AssertDecl {
            term,
            context,
            expected,
            origin: origin(ctx),
        }),
        _ => Err(ctx.malformed("assertion", span)),
    }
}

// ============================================================================
// RULE AND PREMISE BUILDERS
// ============================================================================

fn build_rule_body(pair: Pair<Rule>, ctx: &ParseContext) -> Result<ast::Rule, CbsError> {
    let inner = first_inner(pair, "rule", ctx)?;
    if inner.as_rule() == Rule::transition_rule {
        let span = span_of(&inner);
        let mut premises = inner
            .into_inner()
            .filter(|p| p.as_rule() != Rule::bar)
            .map(|p| build_premise(p, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        let conclusion = premises
            .pop()
            .ok_or_else(|| ctx.malformed("rule conclusion", span))?;
        return Ok(ast::Rule::Transition {
            premises,
            conclusion,
        });
    }

    match build_premise(inner, ctx)? {
        Premise::Rewrite { term, target } => Ok(ast::Rule::TermRewrite {
            pattern: term,
            target,
        }),
        conclusion => Ok(ast::Rule::Transition {
            premises: Vec::new(),
            conclusion,
        }),
    }
}

fn build_premise(pair: Pair<Rule>, ctx: &ParseContext) -> Result<Premise, CbsError> {
    let span = span_of(&pair);
    let rule = pair.as_rule();
    let parts: Vec<Pair<Rule>> = pair.into_inner().collect();

    match rule {
        Rule::step_premise => {
            let mut context = None;
            let mut terms = Vec::new();
            let mut steps = Vec::new();
            for p in parts {
                match p.as_rule() {
                    Rule::step_context => context = Some(build_inner_expr(p, ctx)?),
                    Rule::expr => terms.push(build_expr(p, ctx)?),
                    Rule::steps => steps = build_steps(p, ctx)?,
                    _ => {}
                }
            }
            let mut terms = terms.into_iter();
            match (terms.next(), terms.next()) {
                (Some(source), Some(target)) => Ok(Premise::ContextualTransition(Transition {
                    context,
                    source: Side::Term(source),
                    steps,
                    target: Side::Term(target),
                })),
                _ => Err(ctx.malformed("transition", span)),
            }
        }
        Rule::mutable_premise => {
            let mut sides = Vec::new();
            let mut steps = Vec::new();
            for p in parts {
                match p.as_rule() {
                    Rule::mutable_side => sides.push(build_mutable_side(p, ctx)?),
                    Rule::steps => steps = build_steps(p, ctx)?,
                    _ => {}
                }
            }
            let mut sides = sides.into_iter();
            match (sides.next(), sides.next()) {
                (Some(source), Some(target)) => Ok(Premise::ContextualTransition(Transition {
                    context: None,
                    source,
                    steps,
                    target,
                })),
                _ => Err(ctx.malformed("mutable transition", span)),
            }
        }
        Rule::rewrite_premise => {
            let [term, target] = two_exprs(parts, "rewrite", span, ctx)?;
            Ok(Premise::Rewrite { term, target })
        }
        Rule::type_premise => {
            let [value, ty] = two_exprs(parts, "type judgement", span, ctx)?;
            Ok(Premise::TypeJudgement { value, ty })
        }
        Rule::equality => {
            let negated = parts.iter().any(|p| p.as_rule() == Rule::neq_op);
            let [left, right] = two_exprs(parts, "equality", span, ctx)?;
            Ok(Premise::Equality {
                left,
                right,
                negated,
            })
        }
        other => Err(ctx.malformed(&describe(other), span)),
    }
}

fn two_exprs(
    parts: Vec<Pair<Rule>>,
    what: &str,
    span: SourceSpan,
    ctx: &ParseContext,
) -> Result<[Term; 2], CbsError> {
    let terms = parts
        .into_iter()
        .filter(|p| p.as_rule() == Rule::expr)
        .map(|p| build_expr(p, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    <[Term; 2]>::try_from(terms).map_err(|_| ctx.malformed(what, span))
}

fn build_mutable_side(pair: Pair<Rule>, ctx: &ParseContext) -> Result<Side, CbsError> {
    let span = span_of(&pair);
    let [term, store] = two_exprs(pair.into_inner().collect(), "mutable side", span, ctx)?;
    Ok(Side::Mutable(term, store))
}

fn build_steps(pair: Pair<Rule>, ctx: &ParseContext) -> Result<Vec<Step>, CbsError> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::step)
        .map(|step| {
            let mut actions = Vec::new();
            let mut sequence = None;
            for p in step.into_inner() {
                match p.as_rule() {
                    Rule::actions => {
                        for action in p.into_inner() {
                            actions.push(build_action(action, ctx)?);
                        }
                    }
                    Rule::step_seq => {
                        let text = p.as_str();
                        sequence = Some(text.parse::<u32>().map_err(|_| {
                            ctx.report(
                                ErrorKind::InvalidLiteral {
                                    literal_type: "step number".into(),
                                    value: text.into(),
                                },
                                span_of(&p),
                            )
                        })?);
                    }
                    _ => {}
                }
            }
            Ok(Step { actions, sequence })
        })
        .collect()
}

fn build_action(pair: Pair<Rule>, ctx: &ParseContext) -> Result<Action, CbsError> {
    let span = span_of(&pair);
    let mut name = None;
    let mut polarity = None;
    let mut args = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::identifier => name = Some(p.as_str().to_string()),
            Rule::polarity => {
                polarity = Some(if p.as_str() == "!" {
                    Polarity::Output
                } else {
                    Polarity::Input
                })
            }
            Rule::params => args = build_params(p, ctx)?,
            _ => {}
        }
    }
    Ok(Action {
        name: name.ok_or_else(|| ctx.malformed("action name", span))?,
        polarity,
        args,
    })
}

// ============================================================================
// TERM BUILDERS
// ============================================================================

fn build_expr(pair: Pair<Rule>, ctx: &ParseContext) -> Result<Term, CbsError> {
    PRATT
        .map_primary(|primary| build_primary(primary, ctx))
        .map_prefix(|op, rhs| Ok(Term::unary(operator_of(&op, ctx)?, rhs?)))
        .map_postfix(|lhs, op| Ok(Term::unary(operator_of(&op, ctx)?, lhs?)))
        .map_infix(|lhs, op, rhs| Ok(Term::binary(operator_of(&op, ctx)?, lhs?, rhs?)))
        .parse(pair.into_inner())
}

fn operator_of(pair: &Pair<Rule>, ctx: &ParseContext) -> Result<Operator, CbsError> {
    match pair.as_rule() {
        Rule::star => Ok(Operator::Star),
        Rule::plus => Ok(Operator::Plus),
        Rule::qmark => Ok(Operator::Optional),
        Rule::lazy => Ok(Operator::Lazy),
        Rule::complement => Ok(Operator::Complement),
        Rule::or_op => Ok(Operator::Or),
        Rule::and_op => Ok(Operator::And),
        Rule::computes => Ok(Operator::Computes),
        _ => Err(ctx.malformed("operator", span_of(pair))),
    }
}

fn build_primary(pair: Pair<Rule>, ctx: &ParseContext) -> Result<Term, CbsError> {
    let span = span_of(&pair);
    match pair.as_rule() {
        Rule::identifier => Ok(Term::Identifier(pair.as_str().to_string())),

        Rule::number => {
            let text = pair.as_str();
            text.parse::<i64>()
                .map(Term::number)
                .map_err(|_| {
                    ctx.report(
                        ErrorKind::InvalidLiteral {
                            literal_type: "number".into(),
                            value: text.into(),
                        },
                        span,
                    )
                })
        }

        Rule::string => {
            let text = pair.as_str();
            let inner = text
                .strip_prefix('"')
                .and_then(|t| t.strip_suffix('"'))
                .unwrap_or(text);
            Ok(Term::Literal(Literal::Text(inner.to_string())))
        }

        Rule::paren => {
            let mut items = build_params_in(pair, ctx)?;
            if items.len() == 1 && items[0].ty.is_none() {
                return Ok(items.remove(0).value);
            }
            Ok(Term::Tuple(items))
        }

        Rule::list => Ok(Term::List(build_params_in(pair, ctx)?)),

        Rule::list_index => {
            let mut name = None;
            let mut indices = Vec::new();
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::index_head => name = head_identifier(p),
                    Rule::params => indices = build_params(p, ctx)?,
                    _ => {}
                }
            }
            Ok(Term::ListIndex {
                name: name.ok_or_else(|| ctx.malformed("list index", span))?,
                indices,
            })
        }

        Rule::call => {
            let mut name = None;
            let mut args = Vec::new();
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::call_head => name = head_identifier(p),
                    Rule::params => args = build_params(p, ctx)?,
                    _ => {}
                }
            }
            Ok(Term::Call {
                name: name.ok_or_else(|| ctx.malformed("call", span))?,
                args,
            })
        }

        Rule::mapping => pair
            .into_inner()
            .map(|entry| build_map_entry(entry, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Term::Map),

        other => Err(ctx.malformed(&describe(other), span)),
    }
}

fn build_map_entry(pair: Pair<Rule>, ctx: &ParseContext) -> Result<MapEntry, CbsError> {
    let span = span_of(&pair);
    let mut maps_to = false;
    let mut terms = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::maps_to => maps_to = true,
            Rule::expr => terms.push(build_expr(p, ctx)?),
            _ => {}
        }
    }
    let mut terms = terms.into_iter();
    match (terms.next(), terms.next(), maps_to) {
        (Some(key), Some(value), true) => Ok(MapEntry::Pair { key, value }),
        (Some(value), Some(ty), false) => Ok(MapEntry::Element(Param::typed(value, ty))),
        (Some(value), None, false) => Ok(MapEntry::Element(Param::new(value))),
        _ => Err(ctx.malformed("map entry", span)),
    }
}

fn head_identifier(pair: Pair<Rule>) -> Option<String> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::identifier)
        .map(|p| p.as_str().to_string())
}

/// Parameters of a rule with an optional inner `params` pair.
fn build_params_in(pair: Pair<Rule>, ctx: &ParseContext) -> Result<Vec<Param>, CbsError> {
    match pair.into_inner().find(|p| p.as_rule() == Rule::params) {
        Some(params) => build_params(params, ctx),
        None => Ok(Vec::new()),
    }
}

fn build_params(pair: Pair<Rule>, ctx: &ParseContext) -> Result<Vec<Param>, CbsError> {
    pair.into_inner()
        .map(|param| {
            let span = span_of(&param);
            let mut terms = param
                .into_inner()
                .map(|p| build_expr(p, ctx))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter();
            match (terms.next(), terms.next()) {
                (Some(value), ty) => Ok(Param { value, ty }),
                (None, _) => Err(ctx.malformed("parameter", span)),
            }
        })
        .collect()
}

fn build_inner_expr(pair: Pair<Rule>, ctx: &ParseContext) -> Result<Term, CbsError> {
    let expr = find_inner(pair, Rule::expr, "term", ctx)?;
    build_expr(expr, ctx)
}

// ============================================================================
// UTILITIES
// ============================================================================

fn span_of(pair: &Pair<Rule>) -> SourceSpan {
    let span = pair.as_span();
    SourceSpan::from(span.start()..span.end())
}

fn origin(ctx: &ParseContext) -> Origin {
    Origin::new(
        ctx.source.name.clone(),
        ctx.component.as_ref().map_or(1, |c| c.line),
    )
}

fn first_inner<'i>(
    pair: Pair<'i, Rule>,
    what: &str,
    ctx: &ParseContext,
) -> Result<Pair<'i, Rule>, CbsError> {
    let span = span_of(&pair);
    pair.into_inner()
        .next()
        .ok_or_else(|| ctx.malformed(what, span))
}

fn find_inner<'i>(
    pair: Pair<'i, Rule>,
    rule: Rule,
    what: &str,
    ctx: &ParseContext,
) -> Result<Pair<'i, Rule>, CbsError> {
    let span = span_of(&pair);
    pair.into_inner()
        .find(|p| p.as_rule() == rule)
        .ok_or_else(|| ctx.malformed(what, span))
}

/// Human-readable name of a grammar rule for "expected ..." messages.
fn describe(rule: Rule) -> String {
    let text = match rule {
        Rule::EOI => "end of input",
        Rule::expr | Rule::term_entry => "term",
        Rule::identifier => "identifier",
        Rule::number => "number",
        Rule::string => "string",
        Rule::params | Rule::param | Rule::signature_params => "parameter",
        Rule::call | Rule::call_head => "call",
        Rule::paren => "parenthesised term",
        Rule::list | Rule::list_index | Rule::index_head => "list",
        Rule::mapping | Rule::map_entry => "map",
        Rule::bar => "transition bar",
        Rule::step | Rule::steps => "step arrow",
        Rule::action | Rule::actions => "action",
        Rule::star | Rule::plus | Rule::qmark => "arity marker",
        Rule::lazy | Rule::complement => "prefix operator",
        Rule::or_op | Rule::and_op | Rule::computes => "infix operator",
        Rule::rewrites_to => "`~>`",
        Rule::eq_op | Rule::neq_op => "`==` or `=/=`",
        Rule::mutable_side => "`<`",
        Rule::kw_funcon => "`Funcon`",
        Rule::kw_type => "`Type`",
        Rule::kw_datatype => "`Datatype`",
        Rule::kw_entity => "`Entity`",
        Rule::kw_metavariables => "`Meta-variables`",
        Rule::kw_alias => "`Alias`",
        Rule::kw_rule => "`Rule`",
        Rule::kw_assert => "`Assert`",
        other => return format!("{:?}", other).replace('_', " "),
    };
    text.to_string()
}

fn found_at(text: &str, pos: usize) -> String {
    match text.get(pos..).and_then(|rest| rest.split_whitespace().next()) {
        Some(token) => {
            let short: String = token.chars().take(16).collect();
            format!("'{}'", short)
        }
        None => "end of input".to_string(),
    }
}

fn convert_error(
    err: pest::error::Error<Rule>,
    text: &str,
    ctx: &ParseContext,
    options: &ParseOptions,
) -> CbsError {
    let (start, end) = match err.location {
        InputLocation::Pos(p) => (p, p),
        InputLocation::Span((s, e)) => (s, e),
    };
    match err.variant {
        ErrorVariant::ParsingError { positives, .. } => {
            let mut expected: Vec<String> = positives.into_iter().map(describe).collect();
            expected.sort();
            expected.dedup();
            if expected.is_empty() {
                expected.push("valid input".to_string());
            }
            let found = found_at(text, start);
            let width = text
                .get(start..)
                .and_then(|rest| rest.split_whitespace().next())
                .map_or(0, str::len);
            ctx.syntax(expected, &found, SourceSpan::from(start..start + width))
        }
        ErrorVariant::CustomError { message } if message.contains("call limit") => ctx.report(
            ErrorKind::RecursionLimit {
                measure: "grammar call count".to_string(),
                limit: options.call_limit.map_or(0, |n| n.get()),
            },
            SourceSpan::from(start..end.max(start)),
        ),
        ErrorVariant::CustomError { message } => {
            ctx.malformed(&message, SourceSpan::from(start..end.max(start)))
        }
    }
}
