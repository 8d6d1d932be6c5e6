//! Naming conventions for mapping entity and property names to table and column names.

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};

/// How entity and property names are rewritten into database identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingConvention {
    /// Use names unchanged.
    #[default]
    AsIs,
    /// `OrderLine` -> `order_line`
    SnakeCase,
    /// `OrderLine` -> `orderline`
    LowerCase,
    /// `OrderLine` -> `ORDERLINE`
    UpperCase,
    /// `OrderLine` -> `ORDER_LINE`
    UpperSnakeCase,
    /// `OrderLine` -> `orderLine`
    CamelCase,
}

impl NamingConvention {
    /// Rewrite `name` according to this convention.
    pub fn apply(self, name: &str) -> String {
        match self {
            NamingConvention::AsIs => name.to_string(),
            NamingConvention::SnakeCase => name.to_case(Case::Snake),
            NamingConvention::LowerCase => name.to_lowercase(),
            NamingConvention::UpperCase => name.to_uppercase(),
            NamingConvention::UpperSnakeCase => name.to_case(Case::UpperSnake),
            NamingConvention::CamelCase => name.to_case(Case::Camel),
        }
    }
}
