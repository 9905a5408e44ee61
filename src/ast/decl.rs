use super::{write_joined, Arity, Operator, Origin, Param, Term};
use crate::syntax::keywords::{Keyword, Qualifier};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// RULES AND PREMISES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    TermRewrite {
        pattern: Term,
        target: Term,
    },
    /// Zero or more premises above a bar and one conclusion. A rule made of
    /// a single premise that is not a rewrite has no premises.
    Transition {
        premises: Vec<Premise>,
        conclusion: Premise,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Premise {
    Rewrite { term: Term, target: Term },
    TypeJudgement { value: Term, ty: Term },
    Equality { left: Term, right: Term, negated: bool },
    ContextualTransition(Transition),
}

/// `[context |-] source --steps--> target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub context: Option<Term>,
    pub source: Side,
    pub steps: Vec<Step>,
    pub target: Side,
}

/// One side of a transition: a plain term or a `< term , store >` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Term(Term),
    Mutable(Term, Term),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub actions: Vec<Action>,
    pub sequence: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub polarity: Option<Polarity>,
    pub args: Vec<Param>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// `!`
    Output,
    /// `?`
    Input,
}

impl Rule {
    /// Name of the funcon the rule is about.
    pub fn head_name(&self) -> Option<&str> {
        match self {
            Rule::TermRewrite { pattern, .. } => pattern.head_name(),
            Rule::Transition { conclusion, .. } => conclusion.head_name(),
        }
    }
}

impl Premise {
    pub fn head_name(&self) -> Option<&str> {
        match self {
            Premise::Rewrite { term, .. } => term.head_name(),
            Premise::TypeJudgement { value, .. } => value.head_name(),
            Premise::Equality { left, .. } => left.head_name(),
            Premise::ContextualTransition(t) => match &t.source {
                Side::Term(term) | Side::Mutable(term, _) => term.head_name(),
            },
        }
    }
}

// ============================================================================
// DECLARATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunconDecl {
    pub qualifier: Option<Qualifier>,
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Term,
    pub rewrites_to: Option<Term>,
    pub aliases: Vec<AliasDecl>,
    pub rules: Vec<Rule>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub qualifier: Option<Qualifier>,
    pub term: Term,
    pub definition: Option<Term>,
    pub rewrites_to: Option<Term>,
    pub aliases: Vec<AliasDecl>,
    pub origin: Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    /// `::=`
    Define,
    /// `<:`
    Subtype,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatatypeDecl {
    pub qualifier: Option<Qualifier>,
    pub name: String,
    pub params: Vec<Param>,
    pub assign: Option<AssignOp>,
    pub definition: Option<Term>,
    pub aliases: Vec<AliasDecl>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDecl {
    pub transition: Transition,
    pub aliases: Vec<AliasDecl>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metavar {
    pub name: String,
    pub arity: Arity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetavarDecl {
    pub names: Vec<Metavar>,
    pub definition: Term,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasDecl {
    pub alias: String,
    pub original: String,
    pub origin: Origin,
}

/// A `Rule` component that could not be attached to a funcon while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDecl {
    pub rule: Rule,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertDecl {
    pub term: Term,
    pub context: Option<Term>,
    pub expected: Term,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    Funcon(FunconDecl),
    Type(TypeDecl),
    Datatype(DatatypeDecl),
    Entity(EntityDecl),
    Metavariables(MetavarDecl),
    Alias(AliasDecl),
    Rule(RuleDecl),
    Assert(AssertDecl),
}

impl Declaration {
    pub fn keyword(&self) -> Keyword {
        match self {
            Declaration::Funcon(_) => Keyword::Funcon,
            Declaration::Type(_) => Keyword::Type,
            Declaration::Datatype(_) => Keyword::Datatype,
            Declaration::Entity(_) => Keyword::Entity,
            Declaration::Metavariables(_) => Keyword::MetaVariables,
            Declaration::Alias(_) => Keyword::Alias,
            Declaration::Rule(_) => Keyword::Rule,
            Declaration::Assert(_) => Keyword::Assert,
        }
    }

    /// The name the declaration introduces, if it introduces one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::Funcon(d) => Some(&d.name),
            Declaration::Type(d) => d.name(),
            Declaration::Datatype(d) => Some(&d.name),
            Declaration::Entity(d) => d.name(),
            Declaration::Alias(d) => Some(&d.alias),
            Declaration::Metavariables(_) | Declaration::Rule(_) | Declaration::Assert(_) => None,
        }
    }

    pub fn origin(&self) -> &Origin {
        match self {
            Declaration::Funcon(d) => &d.origin,
            Declaration::Type(d) => &d.origin,
            Declaration::Datatype(d) => &d.origin,
            Declaration::Entity(d) => &d.origin,
            Declaration::Metavariables(d) => &d.origin,
            Declaration::Alias(d) => &d.origin,
            Declaration::Rule(d) => &d.origin,
            Declaration::Assert(d) => &d.origin,
        }
    }

    /// Aliases declared together with this declaration.
    pub fn aliases(&self) -> &[AliasDecl] {
        match self {
            Declaration::Funcon(d) => &d.aliases,
            Declaration::Type(d) => &d.aliases,
            Declaration::Datatype(d) => &d.aliases,
            Declaration::Entity(d) => &d.aliases,
            _ => &[],
        }
    }

    pub fn aliases_mut(&mut self) -> Option<&mut Vec<AliasDecl>> {
        match self {
            Declaration::Funcon(d) => Some(&mut d.aliases),
            Declaration::Type(d) => Some(&mut d.aliases),
            Declaration::Datatype(d) => Some(&mut d.aliases),
            Declaration::Entity(d) => Some(&mut d.aliases),
            _ => None,
        }
    }
}

impl FunconDecl {
    /// Whether `name` is this funcon's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a.alias == name)
    }

    pub fn is_builtin(&self) -> bool {
        self.qualifier == Some(Qualifier::BuiltIn)
    }
}

impl TypeDecl {
    pub fn name(&self) -> Option<&str> {
        self.term.strip_markers().head_name()
    }
}

impl DatatypeDecl {
    /// The `|`-separated alternatives of the definition, left to right.
    pub fn alternatives(&self) -> Vec<&Term> {
        fn collect<'a>(term: &'a Term, out: &mut Vec<&'a Term>) {
            match term {
                Term::Operator {
                    op: Operator::Or,
                    operands,
                } => operands.iter().for_each(|t| collect(t, out)),
                other => out.push(other),
            }
        }
        let mut out = Vec::new();
        if let Some(definition) = &self.definition {
            collect(definition, &mut out);
        }
        out
    }

    /// Whether one of the alternatives is a constructor called `name`.
    pub fn constructs(&self, name: &str) -> bool {
        self.assign == Some(AssignOp::Define)
            && self
                .alternatives()
                .iter()
                .any(|alt| alt.strip_markers().head_name() == Some(name))
    }
}

impl EntityDecl {
    /// The entity's name: the store of a mutable entity, the context of a
    /// contextual one, otherwise the first action.
    pub fn name(&self) -> Option<&str> {
        let t = &self.transition;
        if let Side::Mutable(_, store) = &t.source {
            return store.head_name();
        }
        if let Some(context) = &t.context {
            return context.head_name();
        }
        t.steps
            .iter()
            .flat_map(|s| s.actions.iter())
            .map(|a| a.name.as_str())
            .next()
    }
}

// ============================================================================
// PRINTING
// ============================================================================

fn write_qualifier(f: &mut fmt::Formatter<'_>, qualifier: Option<Qualifier>) -> fmt::Result {
    match qualifier {
        Some(q) => write!(f, "{} ", q),
        None => Ok(()),
    }
}

fn write_signature(f: &mut fmt::Formatter<'_>, params: &[Param]) -> fmt::Result {
    if params.is_empty() {
        return Ok(());
    }
    f.write_str("(")?;
    write_joined(f, params, ", ")?;
    f.write_str(")")
}

fn write_aliases(f: &mut fmt::Formatter<'_>, aliases: &[AliasDecl]) -> fmt::Result {
    for alias in aliases {
        write!(f, "\n{}", alias)?;
    }
    Ok(())
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::TermRewrite { pattern, target } => write!(f, "{} ~> {}", pattern, target),
            Rule::Transition {
                premises,
                conclusion,
            } => {
                if !premises.is_empty() {
                    write_joined(f, premises, "\n")?;
                    f.write_str("\n---------------\n")?;
                }
                write!(f, "{}", conclusion)
            }
        }
    }
}

impl fmt::Display for Premise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Premise::Rewrite { term, target } => write!(f, "{} ~> {}", term, target),
            Premise::TypeJudgement { value, ty } => write!(f, "{} : {}", value, ty),
            Premise::Equality {
                left,
                right,
                negated,
            } => write!(f, "{} {} {}", left, if *negated { "=/=" } else { "==" }, right),
            Premise::ContextualTransition(t) => write!(f, "{}", t),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{} |- ", context)?;
        }
        write!(f, "{} ", self.source)?;
        write_joined(f, &self.steps, " ; ")?;
        write!(f, " {}", self.target)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Term(t) => write!(f, "{}", t),
            Side::Mutable(term, store) => write!(f, "< {} , {} >", term, store),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("--")?;
        write_joined(f, &self.actions, ",")?;
        f.write_str("->")?;
        if let Some(n) = self.sequence {
            write!(f, "{}", n)?;
        }
        Ok(())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        match self.polarity {
            Some(Polarity::Output) => f.write_str("!")?,
            Some(Polarity::Input) => f.write_str("?")?,
            None => {}
        }
        if !self.args.is_empty() {
            f.write_str("(")?;
            write_joined(f, &self.args, ", ")?;
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for FunconDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_qualifier(f, self.qualifier)?;
        write!(f, "Funcon {}", self.name)?;
        write_signature(f, &self.params)?;
        write!(f, " : {}", self.returns)?;
        if let Some(target) = &self.rewrites_to {
            write!(f, " ~> {}", target)?;
        }
        write_aliases(f, &self.aliases)?;
        for rule in &self.rules {
            write!(f, "\nRule {}", rule)?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_qualifier(f, self.qualifier)?;
        write!(f, "Type {}", self.term)?;
        if let Some(def) = &self.definition {
            write!(f, " <: {}", def)?;
        }
        if let Some(target) = &self.rewrites_to {
            write!(f, " ~> {}", target)?;
        }
        write_aliases(f, &self.aliases)
    }
}

impl fmt::Display for DatatypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_qualifier(f, self.qualifier)?;
        write!(f, "Datatype {}", self.name)?;
        write_signature(f, &self.params)?;
        if let Some(def) = &self.definition {
            let op = match self.assign {
                Some(AssignOp::Subtype) => "<:",
                _ => "::=",
            };
            write!(f, " {} {}", op, def)?;
        }
        write_aliases(f, &self.aliases)
    }
}

impl fmt::Display for EntityDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity {}", self.transition)?;
        write_aliases(f, &self.aliases)
    }
}

impl fmt::Display for Metavar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.arity.marker())
    }
}

impl fmt::Display for MetavarDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Meta-variables ")?;
        write_joined(f, &self.names, ", ")?;
        write!(f, " <: {}", self.definition)
    }
}

impl fmt::Display for AliasDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alias {} = {}", self.alias, self.original)
    }
}

impl fmt::Display for AssertDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Assert {}", self.term)?;
        if let Some(context) = &self.context {
            write!(f, " {}", context)?;
        }
        write!(f, " == {}", self.expected)
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Declaration::Funcon(d) => write!(f, "{}", d),
            Declaration::Type(d) => write!(f, "{}", d),
            Declaration::Datatype(d) => write!(f, "{}", d),
            Declaration::Entity(d) => write!(f, "{}", d),
            Declaration::Metavariables(d) => write!(f, "{}", d),
            Declaration::Alias(d) => write!(f, "{}", d),
            Declaration::Rule(d) => write!(f, "Rule {}", d.rule),
            Declaration::Assert(d) => write!(f, "{}", d),
        }
    }
}
