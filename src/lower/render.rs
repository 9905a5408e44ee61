//! Text rendering of node specs as interpreter class sketches.

use super::layout::SlotKind;
use super::spec::{Access, ChildSlot, Condition, NodeBody, NodeSpec, SpecKind, Value};
use std::fmt::{self, Write as _};

const INDENT: &str = "    ";

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Child { slot } => write!(f, "p{}", slot),
            Access::Element { of, index } => write!(f, "{}[{}]", of, index),
            Access::FromEnd { of, back } => write!(f, "{of}[{of}.size - {back}]"),
            Access::Field { of, class, slot } => write!(f, "({} as {}).p{}", of, class, slot),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Field { at } => write!(f, "{}", at),
            Value::Spread { at } => write!(f, "*{}", at),
            Value::Slice { at, from, back } => write!(f, "*slice({}, {}, {})", at, from, back),
            Value::Sequence { items } => write_list(f, items),
            Value::Construct { class, args } => {
                write!(f, "{}(", class)?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Value::Literal { class, text } => write!(f, "{}({:?})", class, text),
            Value::Atom { name } => write!(f, "atom({:?})", name),
            Value::Number { value } => write!(f, "{}", value),
            Value::Text { value } => write!(f, "{:?}", value),
            Value::Tuple { items } => {
                f.write_str("tuple(")?;
                write_list(f, items)?;
                f.write_str(")")
            }
            Value::List { items } => {
                f.write_str("list(")?;
                write_list(f, items)?;
                f.write_str(")")
            }
            Value::Map { entries } => {
                f.write_str("map(")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} to {}", key, value)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::VarargEmpty { at } => write!(f, "{}.isEmpty()", at),
            Condition::VarargLength { at, len, at_least } => {
                let op = if *at_least { ">=" } else { "==" };
                write!(f, "{}.size {} {}", at, op, len)
            }
            Condition::Equals { at, value } => write!(f, "{} == {}", at, value),
            Condition::HasType { at, class } => write!(f, "{} is {}", at, class),
            Condition::Equivalent { left, right } => write!(f, "{} == {}", left, right),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn slot_list(children: &[ChildSlot]) -> String {
    children
        .iter()
        .map(|c| {
            let lazy = if c.lazy { "@Lazy " } else { "" };
            let vararg = if c.kind == SlotKind::Vararg { "vararg " } else { "" };
            format!("{}{}{}: {}", lazy, vararg, c.name, c.class)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders one spec. Writing to a `String` cannot fail, so the
/// `fmt::Result`s below are discarded.
pub fn render(spec: &NodeSpec) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// {} ({})", spec.name, spec.origin);
    for warning in &spec.warnings {
        let _ = writeln!(out, "// warning: {}", warning);
    }
    if spec.skipped_transitions > 0 {
        let _ = writeln!(
            out,
            "// {} transition rule(s) not generated",
            spec.skipped_transitions
        );
    }
    if !spec.aliases.is_empty() {
        let _ = writeln!(out, "// aliases: {}", spec.aliases.join(", "));
    }

    let params = slot_list(&spec.children);
    match (&spec.kind, &spec.body) {
        (SpecKind::Datatype, NodeBody::Constructors(constructors)) => {
            let _ = writeln!(
                out,
                "sealed class {}({}) : ValuesNode",
                spec.class_name, params
            );
            for ctor in constructors {
                let _ = writeln!(
                    out,
                    "class {}({}) : {}",
                    ctor.class_name,
                    slot_list(&ctor.children),
                    spec.class_name
                );
            }
        }
        (SpecKind::Datatype, _) => {
            let parent = spec.supertype.as_deref().unwrap_or("ValuesNode");
            let _ = writeln!(out, "open class {}({}) : {}", spec.class_name, params, parent);
        }
        (SpecKind::Funcon, NodeBody::Interface | NodeBody::Constructors(_)) => {
            let _ = writeln!(out, "abstract class {}({}) : FunconNode {{", spec.class_name, params);
            let _ = writeln!(out, "{}abstract fun execute(): {}", INDENT, spec.returns);
            out.push_str("}\n");
        }
        (SpecKind::Funcon, NodeBody::Unconditional(value)) => {
            let _ = writeln!(out, "class {}({}) : FunconNode {{", spec.class_name, params);
            let _ = writeln!(out, "{}fun execute(): {} {{", INDENT, spec.returns);
            let _ = writeln!(out, "{0}{0}return {1}", INDENT, value);
            let _ = writeln!(out, "{}}}", INDENT);
            out.push_str("}\n");
        }
        (SpecKind::Funcon, NodeBody::Dispatch(branches)) => {
            let _ = writeln!(out, "class {}({}) : FunconNode {{", spec.class_name, params);
            let _ = writeln!(out, "{}fun execute(): {} {{", INDENT, spec.returns);
            for branch in branches {
                let _ = writeln!(out, "{0}{0}// {1}", INDENT, branch.rule);
                if branch.conditions.is_empty() {
                    let _ = writeln!(out, "{0}{0}return {1}", INDENT, branch.result);
                    continue;
                }
                let conditions: Vec<String> =
                    branch.conditions.iter().map(ToString::to_string).collect();
                let _ = writeln!(out, "{0}{0}if ({1}) {{", INDENT, conditions.join(" && "));
                let _ = writeln!(out, "{0}{0}{0}return {1}", INDENT, branch.result);
                let _ = writeln!(out, "{0}{0}}}", INDENT);
            }
            let _ = writeln!(out, "{0}{0}fail()", INDENT);
            let _ = writeln!(out, "{}}}", INDENT);
            out.push_str("}\n");
        }
    }
    out
}

/// Renders every spec, separated by blank lines.
pub fn render_all(specs: &[NodeSpec]) -> String {
    specs.iter().map(render).collect::<Vec<_>>().join("\n")
}

pub fn to_json(specs: &[NodeSpec]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Arity, Origin};
    use crate::lower::spec::Branch;

    fn spec(body: NodeBody) -> NodeSpec {
        NodeSpec {
            name: "not".into(),
            class_name: "NotNode".into(),
            kind: SpecKind::Funcon,
            children: vec![ChildSlot {
                name: "p0".into(),
                kind: SlotKind::Regular,
                arity: Arity::Single,
                class: "BooleansNode".into(),
                lazy: false,
            }],
            returns: "BooleansNode".into(),
            supertype: None,
            aliases: vec![],
            body,
            origin: Origin::new("bool.cbs", 3),
            warnings: vec![],
            skipped_transitions: 0,
        }
    }

    #[test]
    fn accesses_render_as_expressions() {
        let from_end = Access::FromEnd {
            of: Box::new(Access::child(1)),
            back: 2,
        };
        assert_eq!(from_end.to_string(), "p1[p1.size - 2]");
        let field = Access::Field {
            of: Box::new(Access::Element {
                of: Box::new(Access::child(0)),
                index: 0,
            }),
            class: "GNode".into(),
            slot: 1,
        };
        assert_eq!(field.to_string(), "(p0[0] as GNode).p1");
    }

    #[test]
    fn dispatch_renders_guarded_returns() {
        let branch = Branch {
            conditions: vec![Condition::Equals {
                at: Access::child(0),
                value: Value::Atom {
                    name: "false".into(),
                },
            }],
            result: Value::Literal {
                class: "BooleansNode".into(),
                text: "true".into(),
            },
            rule: "not(false) ~> true".into(),
        };
        let text = render(&spec(NodeBody::Dispatch(vec![branch])));
        assert!(text.contains("class NotNode(p0: BooleansNode) : FunconNode {"));
        assert!(text.contains("if (p0 == atom(\"false\")) {"));
        assert!(text.contains("return BooleansNode(\"true\")"));
        assert!(text.trim_end().ends_with("fail()\n    }\n}"));
    }

    #[test]
    fn interfaces_are_abstract() {
        let text = render(&spec(NodeBody::Interface));
        assert!(text.contains("abstract class NotNode"));
        assert!(text.contains("abstract fun execute(): BooleansNode"));
    }

    #[test]
    fn json_carries_the_body_kind() {
        let json = to_json(&[spec(NodeBody::Interface)]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["body"]["kind"], "interface");
    }
}
