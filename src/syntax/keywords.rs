//! Reserved words of the CBS notation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level declaration keywords. The derived order is the order the
/// `Document` lists its buckets in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Funcon,
    Type,
    Datatype,
    Entity,
    MetaVariables,
    Alias,
    Rule,
    Assert,
}

/// Provenance qualifier in front of `Funcon`, `Type` or `Datatype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Qualifier {
    BuiltIn,
    Auxiliary,
}

impl Keyword {
    pub const ALL: [Keyword; 8] = [
        Keyword::Funcon,
        Keyword::Type,
        Keyword::Datatype,
        Keyword::Entity,
        Keyword::MetaVariables,
        Keyword::Alias,
        Keyword::Rule,
        Keyword::Assert,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Keyword::Funcon => "Funcon",
            Keyword::Type => "Type",
            Keyword::Datatype => "Datatype",
            Keyword::Entity => "Entity",
            Keyword::MetaVariables => "Meta-variables",
            Keyword::Alias => "Alias",
            Keyword::Rule => "Rule",
            Keyword::Assert => "Assert",
        }
    }

    pub fn from_word(word: &str) -> Option<Keyword> {
        Self::ALL.into_iter().find(|k| k.as_str() == word)
    }

    /// Whether `qualifier` may precede this keyword.
    pub fn accepts(self, qualifier: Qualifier) -> bool {
        match qualifier {
            Qualifier::BuiltIn => matches!(self, Keyword::Funcon | Keyword::Type | Keyword::Datatype),
            Qualifier::Auxiliary => self == Keyword::Funcon,
        }
    }
}

impl Qualifier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Qualifier::BuiltIn => "Built-in",
            Qualifier::Auxiliary => "Auxiliary",
        }
    }

    pub fn from_word(word: &str) -> Option<Qualifier> {
        match word {
            "Built-in" => Some(Qualifier::BuiltIn),
            "Auxiliary" => Some(Qualifier::Auxiliary),
            _ => None,
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
