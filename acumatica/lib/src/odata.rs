//! OData query options and a small filter expression builder.
//!
//! ```rust
//! use acumatica_client::odata::{F, QueryOptions};
//!
//! let filter = F::field("Price").sub(5).gt(10) & F::field("Name").tolower().startswith("a");
//! let options = QueryOptions::new().filter(filter).top(10);
//!
//! let params = options.to_params();
//! assert_eq!(params[0].0, "$filter");
//! assert_eq!(
//!     params[0].1,
//!     "(((Price sub 5) gt 10) and startswith(tolower(Name),'a'))"
//! );
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

/// Conversion of Rust values to OData operand text.
///
/// Strings become quoted literals (embedded quotes doubled), booleans
/// `true`/`false`, `None` becomes `null`, and filters keep their expression.
pub trait IntoOperand {
    fn into_operand(self) -> String;
}

impl IntoOperand for Filter {
    fn into_operand(self) -> String {
        self.expr
    }
}

impl IntoOperand for &Filter {
    fn into_operand(self) -> String {
        self.expr.clone()
    }
}

impl IntoOperand for &str {
    fn into_operand(self) -> String {
        format!("'{}'", self.replace('\'', "''"))
    }
}

impl IntoOperand for String {
    fn into_operand(self) -> String {
        self.as_str().into_operand()
    }
}

impl IntoOperand for bool {
    fn into_operand(self) -> String {
        if self { "true" } else { "false" }.to_string()
    }
}

macro_rules! numeric_operand {
    ($($t:ty),*) => {
        $(impl IntoOperand for $t {
            fn into_operand(self) -> String {
                self.to_string()
            }
        })*
    };
}

numeric_operand!(i32, i64, u32, u64, usize, f32, f64);

impl<T: IntoOperand> IntoOperand for Option<T> {
    fn into_operand(self) -> String {
        self.map_or_else(|| "null".to_string(), IntoOperand::into_operand)
    }
}

/// An OData filter expression.
///
/// Every method returns a new expression; `&`, `|` and `!` map to `and`,
/// `or` and `not`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    expr: String,
}

impl Filter {
    /// Wraps a raw expression string.
    pub fn raw(expr: impl Into<String>) -> Self {
        Self { expr: expr.into() }
    }

    /// Navigates into a linked entity (`MainContact` → `MainContact/Email`).
    pub fn nav(&self, name: &str) -> Self {
        Self::raw(format!("{}/{name}", self.expr))
    }

    fn binary(&self, op: &str, other: impl IntoOperand) -> Self {
        Self::raw(format!("({} {op} {})", self.expr, other.into_operand()))
    }

    fn function(&self, name: &str, args: Vec<String>) -> Self {
        let mut all = vec![self.expr.clone()];
        all.extend(args);
        Self::raw(format!("{name}({})", all.join(",")))
    }

    fn unary(&self, name: &str) -> Self {
        Self::raw(format!("{name}({})", self.expr))
    }

    pub fn eq(&self, other: impl IntoOperand) -> Self {
        self.binary("eq", other)
    }

    pub fn ne(&self, other: impl IntoOperand) -> Self {
        self.binary("ne", other)
    }

    pub fn gt(&self, other: impl IntoOperand) -> Self {
        self.binary("gt", other)
    }

    pub fn ge(&self, other: impl IntoOperand) -> Self {
        self.binary("ge", other)
    }

    pub fn lt(&self, other: impl IntoOperand) -> Self {
        self.binary("lt", other)
    }

    pub fn le(&self, other: impl IntoOperand) -> Self {
        self.binary("le", other)
    }

    pub fn and(&self, other: impl IntoOperand) -> Self {
        self.binary("and", other)
    }

    pub fn or(&self, other: impl IntoOperand) -> Self {
        self.binary("or", other)
    }

    pub fn add(&self, other: impl IntoOperand) -> Self {
        self.binary("add", other)
    }

    pub fn sub(&self, other: impl IntoOperand) -> Self {
        self.binary("sub", other)
    }

    pub fn mul(&self, other: impl IntoOperand) -> Self {
        self.binary("mul", other)
    }

    pub fn div(&self, other: impl IntoOperand) -> Self {
        self.binary("div", other)
    }

    pub fn modulo(&self, other: impl IntoOperand) -> Self {
        self.binary("mod", other)
    }

    /// `substringof(substring, field)`.
    pub fn contains(&self, substring: impl IntoOperand) -> Self {
        Self::raw(format!("substringof({}, {})", substring.into_operand(), self.expr))
    }

    pub fn startswith(&self, prefix: impl IntoOperand) -> Self {
        self.function("startswith", vec![prefix.into_operand()])
    }

    pub fn endswith(&self, suffix: impl IntoOperand) -> Self {
        self.function("endswith", vec![suffix.into_operand()])
    }

    pub fn indexof(&self, substring: impl IntoOperand) -> Self {
        self.function("indexof", vec![substring.into_operand()])
    }

    pub fn replace(&self, find: impl IntoOperand, with: impl IntoOperand) -> Self {
        self.function("replace", vec![find.into_operand(), with.into_operand()])
    }

    pub fn substring(&self, pos: u32, length: Option<u32>) -> Self {
        let mut args = vec![pos.to_string()];
        args.extend(length.map(|l| l.to_string()));
        self.function("substring", args)
    }

    pub fn concat(&self, other: impl IntoOperand) -> Self {
        self.function("concat", vec![other.into_operand()])
    }

    pub fn isof(&self, type_name: Option<&str>) -> Self {
        match type_name {
            Some(name) => self.function("isof", vec![name.into_operand()]),
            None => self.unary("isof"),
        }
    }

    pub fn length(&self) -> Self {
        self.unary("length")
    }

    pub fn tolower(&self) -> Self {
        self.unary("tolower")
    }

    pub fn toupper(&self) -> Self {
        self.unary("toupper")
    }

    pub fn trim(&self) -> Self {
        self.unary("trim")
    }

    pub fn day(&self) -> Self {
        self.unary("day")
    }

    pub fn hour(&self) -> Self {
        self.unary("hour")
    }

    pub fn minute(&self) -> Self {
        self.unary("minute")
    }

    pub fn second(&self) -> Self {
        self.unary("second")
    }

    pub fn month(&self) -> Self {
        self.unary("month")
    }

    pub fn year(&self) -> Self {
        self.unary("year")
    }

    pub fn round(&self) -> Self {
        self.unary("round")
    }

    pub fn floor(&self) -> Self {
        self.unary("floor")
    }

    pub fn ceiling(&self) -> Self {
        self.unary("ceiling")
    }

    /// The finished expression.
    pub fn build(&self) -> &str {
        &self.expr
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        self.and(rhs)
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        self.or(rhs)
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        Filter::raw(format!("not ({})", self.expr))
    }
}

/// Entry point for field expressions.
pub struct F;

impl F {
    /// A field reference.
    pub fn field(name: &str) -> Filter {
        Filter::raw(name)
    }

    /// A custom field reference, `cf.<Type>(f='<View>.<Field>')`.
    pub fn cf(type_name: &str, view_name: &str, field_name: &str) -> Filter {
        Filter::raw(format!("cf.{type_name}(f='{view_name}.{field_name}')"))
    }
}

/// An entry of the `$custom` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomField {
    Field {
        view: String,
        field: String,
        /// Detail entity hosting the field; added to `$expand` automatically.
        entity: Option<String>,
    },
    Attribute {
        view: String,
        attribute_id: String,
    },
}

impl CustomField {
    pub fn field(view: &str, field: &str) -> Self {
        Self::Field {
            view: view.to_string(),
            field: field.to_string(),
            entity: None,
        }
    }

    pub fn detail_field(entity: &str, view: &str, field: &str) -> Self {
        Self::Field {
            view: view.to_string(),
            field: field.to_string(),
            entity: Some(entity.to_string()),
        }
    }

    pub fn attribute(view: &str, attribute_id: &str) -> Self {
        Self::Attribute {
            view: view.to_string(),
            attribute_id: attribute_id.to_string(),
        }
    }

    fn entity(&self) -> Option<&str> {
        match self {
            Self::Field { entity, .. } => entity.as_deref(),
            Self::Attribute { .. } => None,
        }
    }
}

impl fmt::Display for CustomField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field {
                view,
                field,
                entity: Some(entity),
            } => write!(f, "{entity}/{view}.{field}"),
            Self::Field { view, field, .. } => write!(f, "{view}.{field}"),
            Self::Attribute { view, attribute_id } => write!(f, "{view}.Attribute{attribute_id}"),
        }
    }
}

/// OData query parameters for list, get and put requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    filter: Option<String>,
    expand: Vec<String>,
    select: Vec<String>,
    top: Option<u32>,
    skip: Option<u32>,
    custom: Vec<CustomField>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `$filter` from a [`Filter`] or a raw string.
    pub fn filter(mut self, filter: impl fmt::Display) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    pub fn expand<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand.extend(entities.into_iter().map(Into::into));
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn custom(mut self, field: CustomField) -> Self {
        self.custom.push(field);
        self
    }

    /// Renders the options as query parameters.
    ///
    /// Detail entities of custom fields are added to `$expand`; the expand
    /// list is de-duplicated and sorted.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.is_empty()) {
            params.push(("$filter".to_string(), filter.to_string()));
        }
        if !self.select.is_empty() {
            params.push(("$select".to_string(), self.select.join(",")));
        }
        if let Some(top) = self.top {
            params.push(("$top".to_string(), top.to_string()));
        }
        if let Some(skip) = self.skip {
            params.push(("$skip".to_string(), skip.to_string()));
        }

        let mut expand: BTreeSet<&str> = self.expand.iter().map(String::as_str).collect();
        expand.extend(self.custom.iter().filter_map(CustomField::entity));

        if !self.custom.is_empty() {
            let custom: Vec<String> = self.custom.iter().map(ToString::to_string).collect();
            params.push(("$custom".to_string(), custom.join(",")));
        }
        if !expand.is_empty() {
            let expand: Vec<&str> = expand.into_iter().collect();
            params.push(("$expand".to_string(), expand.join(",")));
        }
        params
    }
}
