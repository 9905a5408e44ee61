//! Parameter classification and argument index resolution.
//!
//! A declaration's parameters split into `regular` slots, at most one
//! vararg slot, and `final` slots after it. A call with `n` arguments
//! spreads over these as: the first `regular` arguments, then a window of
//! `n - regular - finals` arguments in the vararg, then the finals.

use crate::ast::{Arity, Param};
use crate::errors::{CbsError, ErrorReporting, LoweringContext};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Regular,
    Vararg,
    Final,
}

/// Where a runtime argument lives among a node's child slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Regular(usize),
    /// Element `offset` of the vararg array in `slot`.
    Vararg { slot: usize, offset: usize },
    /// Element `size - back` of the vararg array in `slot`.
    VarargFromEnd { slot: usize, back: usize },
    /// A final slot; `back` counts from the end of the argument list.
    Final { slot: usize, back: usize },
}

impl Location {
    /// The child slot the argument is stored in.
    pub fn slot(self) -> usize {
        match self {
            Location::Regular(slot)
            | Location::Vararg { slot, .. }
            | Location::VarargFromEnd { slot, .. }
            | Location::Final { slot, .. } => slot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamLayout {
    regular: usize,
    vararg: Option<Arity>,
    finals: usize,
}

impl ParamLayout {
    /// Classifies `params`, failing when more than one is variadic.
    pub fn classify(
        name: &str,
        params: &[Param],
        ctx: &LoweringContext,
    ) -> Result<Self, CbsError> {
        let variadic: Vec<usize> = params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.arity().is_variadic())
            .map(|(i, _)| i)
            .collect();

        match variadic.as_slice() {
            [] => Ok(Self::positional(params.len())),
            [at] => Ok(Self {
                regular: *at,
                vararg: Some(params[*at].arity()),
                finals: params.len() - at - 1,
            }),
            [_, second, ..] => Err(ctx.arity(
                name,
                format!(
                    "{} parameters are variadic, at most one is allowed",
                    variadic.len()
                ),
                ctx.find(&params[*second].to_string()),
            )),
        }
    }

    /// A layout of `n` regular slots.
    pub fn positional(n: usize) -> Self {
        Self {
            regular: n,
            vararg: None,
            finals: 0,
        }
    }

    pub fn regular(&self) -> usize {
        self.regular
    }

    pub fn finals(&self) -> usize {
        self.finals
    }

    /// Slot index of the vararg, if there is one.
    pub fn vararg_slot(&self) -> Option<usize> {
        self.vararg.map(|_| self.regular)
    }

    pub fn vararg_arity(&self) -> Option<Arity> {
        self.vararg
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.regular + self.finals + usize::from(self.vararg.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind_of(&self, slot: usize) -> SlotKind {
        match self.vararg_slot() {
            Some(v) if slot == v => SlotKind::Vararg,
            Some(v) if slot > v => SlotKind::Final,
            _ => SlotKind::Regular,
        }
    }

    /// Whether a call with `n` arguments fits the layout.
    pub fn accepts(&self, n: usize) -> bool {
        match self.vararg {
            None => n == self.regular,
            Some(arity) => n >= self.regular + self.finals + arity.min_len(),
        }
    }

    /// Resolves declared position `i` of a call with `n` arguments.
    pub fn get_index(&self, i: usize, n: usize) -> Option<Location> {
        if i >= n || !self.accepts(n) {
            return None;
        }
        let tail_start = n - self.finals;
        if i < self.regular {
            Some(Location::Regular(i))
        } else if i < tail_start && self.vararg.is_some() {
            Some(Location::Vararg {
                slot: self.regular,
                offset: i - self.regular,
            })
        } else {
            let back = n - i;
            Some(Location::Final {
                slot: self.regular + 1 + (self.finals - back),
                back,
            })
        }
    }

    /// Position `i` counted from the start when the argument count is not
    /// known. Positions past the regular slots fall into the vararg.
    pub fn from_start(&self, i: usize) -> Option<Location> {
        if i < self.regular {
            Some(Location::Regular(i))
        } else {
            self.vararg_slot().map(|slot| Location::Vararg {
                slot,
                offset: i - self.regular,
            })
        }
    }

    /// The argument `back` places from the end (`back >= 1`) when the
    /// argument count is not known.
    pub fn from_end(&self, back: usize) -> Option<Location> {
        if back == 0 {
            return None;
        }
        if back <= self.finals {
            Some(Location::Final {
                slot: self.regular + 1 + (self.finals - back),
                back,
            })
        } else {
            self.vararg_slot().map(|slot| Location::VarargFromEnd {
                slot,
                back: back - self.finals,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::parse_term;

    fn params(texts: &[&str]) -> Vec<Param> {
        texts
            .iter()
            .map(|t| Param::typed(crate::ast::Term::ident("_"), parse_term(t).unwrap()))
            .collect()
    }

    fn ctx() -> LoweringContext {
        LoweringContext::new("test.cbs:1", "Funcon f")
    }

    #[test]
    fn classifies_regular_vararg_and_final() {
        let layout =
            ParamLayout::classify("f", &params(&["values", "values*", "values", "values"]), &ctx())
                .unwrap();
        assert_eq!(layout.regular(), 1);
        assert_eq!(layout.finals(), 2);
        assert_eq!(layout.vararg_slot(), Some(1));
        assert_eq!(layout.len(), 4);
        assert_eq!(layout.kind_of(3), SlotKind::Final);
    }

    #[test]
    fn nested_markers_count_as_variadic() {
        let layout = ParamLayout::classify("f", &params(&["(=>null-type)*", "=>T"]), &ctx()).unwrap();
        assert_eq!(layout.vararg_slot(), Some(0));
        assert_eq!(layout.finals(), 1);
    }

    #[test]
    fn two_variadic_parameters_are_rejected() {
        let err = ParamLayout::classify("f", &params(&["values*", "values+"]), &ctx()).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::errors::ErrorKind::ArityConsistency { .. }
        ));
    }

    #[test]
    fn get_index_splits_regular_window_and_tail() {
        let layout = ParamLayout::classify("f", &params(&["T", "T*", "T"]), &ctx()).unwrap();
        assert_eq!(layout.get_index(0, 5), Some(Location::Regular(0)));
        assert_eq!(layout.get_index(2, 5), Some(Location::Vararg { slot: 1, offset: 1 }));
        assert_eq!(layout.get_index(4, 5), Some(Location::Final { slot: 2, back: 1 }));
        assert_eq!(layout.get_index(1, 2), Some(Location::Final { slot: 2, back: 1 }));
        assert_eq!(layout.get_index(5, 5), None);
        assert_eq!(layout.get_index(0, 1), None);
    }

    #[test]
    fn plus_vararg_needs_one_argument() {
        let layout = ParamLayout::classify("f", &params(&["T+"]), &ctx()).unwrap();
        assert!(!layout.accepts(0));
        assert!(layout.accepts(1));
    }

    #[test]
    fn unknown_count_positions() {
        let layout = ParamLayout::classify("f", &params(&["T", "T*", "T"]), &ctx()).unwrap();
        assert_eq!(layout.from_start(2), Some(Location::Vararg { slot: 1, offset: 1 }));
        assert_eq!(layout.from_end(1), Some(Location::Final { slot: 2, back: 1 }));
        assert_eq!(layout.from_end(3), Some(Location::VarargFromEnd { slot: 1, back: 2 }));
        assert_eq!(ParamLayout::positional(2).from_start(2), None);
    }
}
