//! The matcher engine.
//!
//! Matchers are boolean predicates over store objects, composed from
//! relational comparisons on expressions, regular-expression matches,
//! null tests, boolean connectives, structural quantifiers over an
//! object's children, and array membership. Evaluation is infallible:
//! type mismatches and other evaluation failures count as non-matches.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;

use crate::error::StoreError;
use crate::store::expr::Expr;
use crate::store::objects::ObjectRef;

const REGEX_CACHE_MAX: usize = 1024;

static REGEX_CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();

fn cached_regex(pattern: &str) -> Result<Regex, StoreError> {
    let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    {
        let guard = cache
            .read()
            .map_err(|_| StoreError::LockPoisoned("regex cache"))?;
        if let Some(re) = guard.get(pattern) {
            return Ok(re.clone());
        }
    }

    let compiled = Regex::new(pattern).map_err(|e| StoreError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut guard = cache
        .write()
        .map_err(|_| StoreError::LockPoisoned("regex cache"))?;

    if guard.len() >= REGEX_CACHE_MAX {
        // Keep the cache bounded.
        guard.clear();
    }

    // Another thread may have compiled the same pattern in the meantime.
    guard
        .entry(pattern.to_string())
        .or_insert_with(|| compiled.clone());
    Ok(compiled)
}

/// Relational comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl CmpOp {
    fn accepts(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Eq => ord == Equal,
            Self::Ne => ord != Equal,
            Self::Lt => ord == Less,
            Self::Le => ord != Greater,
            Self::Gt => ord == Greater,
            Self::Ge => ord != Less,
        }
    }
}

/// A structural child set of a store object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSet {
    /// The object's attributes.
    Attributes,
    /// The host's services.
    Services,
    /// The host's metrics.
    Metrics,
}

/// A boolean predicate over a store object.
///
/// # Examples
///
/// ```
/// use sysdb::{Datum, Expr, Field, Matcher, Timestamp};
///
/// // last_update > 1us
/// let m = Matcher::cmp_gt(
///     Expr::field(Field::LastUpdate),
///     Expr::constant(Datum::DateTime(Timestamp::from_micros(1))),
/// );
/// ```
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Relational comparison of two expressions.
    Cmp {
        /// The comparison operator.
        op: CmpOp,
        /// Left expression.
        lhs: Expr,
        /// Right expression.
        rhs: Expr,
    },
    /// Regular-expression match on a string-valued expression.
    Regex {
        /// The expression producing the matched string.
        expr: Expr,
        /// The compiled pattern.
        regex: Regex,
        /// Invert the match (`nregex`).
        negate: bool,
    },
    /// Tests whether an expression evaluates to an unset value.
    IsNull {
        /// The tested expression.
        expr: Expr,
        /// Invert the test (`isnnull`).
        negate: bool,
    },
    /// Both sub-matchers accept; short-circuits.
    And(Box<Matcher>, Box<Matcher>),
    /// Either sub-matcher accepts; short-circuits.
    Or(Box<Matcher>, Box<Matcher>),
    /// The sub-matcher rejects.
    Not(Box<Matcher>),
    /// Some child in the set satisfies the predicate; empty set rejects.
    Any {
        /// The quantified child set.
        set: ChildSet,
        /// Predicate applied to each child.
        pred: Box<Matcher>,
    },
    /// Every child in the set satisfies the predicate; empty set accepts.
    All {
        /// The quantified child set.
        set: ChildSet,
        /// Predicate applied to each child.
        pred: Box<Matcher>,
    },
    /// The needle's value equals some element of the haystack array.
    In {
        /// Expression producing the sought value.
        needle: Expr,
        /// Expression producing the array.
        haystack: Expr,
    },
}

impl Matcher {
    /// `lhs == rhs`.
    #[must_use]
    pub const fn cmp_eq(lhs: Expr, rhs: Expr) -> Self {
        Self::Cmp {
            op: CmpOp::Eq,
            lhs,
            rhs,
        }
    }

    /// `lhs != rhs`.
    #[must_use]
    pub const fn cmp_ne(lhs: Expr, rhs: Expr) -> Self {
        Self::Cmp {
            op: CmpOp::Ne,
            lhs,
            rhs,
        }
    }

    /// `lhs < rhs`.
    #[must_use]
    pub const fn cmp_lt(lhs: Expr, rhs: Expr) -> Self {
        Self::Cmp {
            op: CmpOp::Lt,
            lhs,
            rhs,
        }
    }

    /// `lhs <= rhs`.
    #[must_use]
    pub const fn cmp_le(lhs: Expr, rhs: Expr) -> Self {
        Self::Cmp {
            op: CmpOp::Le,
            lhs,
            rhs,
        }
    }

    /// `lhs > rhs`.
    #[must_use]
    pub const fn cmp_gt(lhs: Expr, rhs: Expr) -> Self {
        Self::Cmp {
            op: CmpOp::Gt,
            lhs,
            rhs,
        }
    }

    /// `lhs >= rhs`.
    #[must_use]
    pub const fn cmp_ge(lhs: Expr, rhs: Expr) -> Self {
        Self::Cmp {
            op: CmpOp::Ge,
            lhs,
            rhs,
        }
    }

    /// Regular-expression match; the pattern is compiled eagerly.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRegex`] if the pattern does not
    /// compile.
    pub fn regex(expr: Expr, pattern: &str) -> Result<Self, StoreError> {
        Ok(Self::Regex {
            expr,
            regex: cached_regex(pattern)?,
            negate: false,
        })
    }

    /// Negated regular-expression match.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRegex`] if the pattern does not
    /// compile.
    pub fn nregex(expr: Expr, pattern: &str) -> Result<Self, StoreError> {
        Ok(Self::Regex {
            expr,
            regex: cached_regex(pattern)?,
            negate: true,
        })
    }

    /// Accepts when the expression evaluates to an unset value.
    #[must_use]
    pub const fn is_null(expr: Expr) -> Self {
        Self::IsNull {
            expr,
            negate: false,
        }
    }

    /// Accepts when the expression evaluates to a set value.
    #[must_use]
    pub const fn is_not_null(expr: Expr) -> Self {
        Self::IsNull { expr, negate: true }
    }

    /// Boolean conjunction.
    #[must_use]
    pub fn and(lhs: Self, rhs: Self) -> Self {
        Self::And(Box::new(lhs), Box::new(rhs))
    }

    /// Boolean disjunction.
    #[must_use]
    pub fn or(lhs: Self, rhs: Self) -> Self {
        Self::Or(Box::new(lhs), Box::new(rhs))
    }

    /// Boolean negation.
    #[must_use]
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Existential quantifier over a child set.
    #[must_use]
    pub fn any(set: ChildSet, pred: Self) -> Self {
        Self::Any {
            set,
            pred: Box::new(pred),
        }
    }

    /// Universal quantifier over a child set.
    #[must_use]
    pub fn all(set: ChildSet, pred: Self) -> Self {
        Self::All {
            set,
            pred: Box::new(pred),
        }
    }

    /// Array membership test.
    #[must_use]
    pub const fn is_in(needle: Expr, haystack: Expr) -> Self {
        Self::In { needle, haystack }
    }

    /// Evaluates the predicate against a store object.
    ///
    /// Expression failures and type mismatches are non-matches, never
    /// errors.
    #[must_use]
    pub fn matches(&self, obj: &ObjectRef<'_>) -> bool {
        match self {
            Self::Cmp { op, lhs, rhs } => {
                let (Ok(lhs), Ok(rhs)) = (lhs.eval(obj), rhs.eval(obj)) else {
                    return false;
                };
                lhs.compare(&rhs).is_some_and(|ord| op.accepts(ord))
            }
            Self::Regex {
                expr,
                regex,
                negate,
            } => {
                let Ok(value) = expr.eval(obj) else {
                    return false;
                };
                let Some(s) = value.as_str() else {
                    return false;
                };
                regex.is_match(s) != *negate
            }
            Self::IsNull { expr, negate } => match expr.eval(obj) {
                Ok(value) => value.is_null() != *negate,
                Err(_) => false,
            },
            Self::And(lhs, rhs) => lhs.matches(obj) && rhs.matches(obj),
            Self::Or(lhs, rhs) => lhs.matches(obj) || rhs.matches(obj),
            Self::Not(inner) => !inner.matches(obj),
            Self::Any { set, pred } => children(obj, *set).any(|c| pred.matches(&c)),
            Self::All { set, pred } => children(obj, *set).all(|c| pred.matches(&c)),
            Self::In { needle, haystack } => {
                let (Ok(needle), Ok(haystack)) = (needle.eval(obj), haystack.eval(obj)) else {
                    return false;
                };
                if needle.is_null() {
                    return false;
                }
                haystack.as_array().is_some_and(|items| {
                    items.iter().any(|item| {
                        item.compare(&needle) == Some(std::cmp::Ordering::Equal)
                    })
                })
            }
        }
    }
}

fn children<'a>(
    obj: &ObjectRef<'a>,
    set: ChildSet,
) -> Box<dyn Iterator<Item = ObjectRef<'a>> + 'a> {
    match (obj, set) {
        (ObjectRef::Host(h), ChildSet::Attributes) => {
            Box::new(h.attributes().map(ObjectRef::Attribute))
        }
        (ObjectRef::Host(h), ChildSet::Services) => {
            Box::new(h.services().map(ObjectRef::Service))
        }
        (ObjectRef::Host(h), ChildSet::Metrics) => {
            Box::new(h.metrics().map(ObjectRef::Metric))
        }
        (ObjectRef::Service(s), ChildSet::Attributes) => {
            Box::new(s.attributes().map(ObjectRef::Attribute))
        }
        (ObjectRef::Metric(m), ChildSet::Attributes) => {
            Box::new(m.attributes().map(ObjectRef::Attribute))
        }
        _ => Box::new(std::iter::empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Field;
    use crate::store::objects::{name_key, Attribute, Host, Service};
    use crate::time::Timestamp;
    use crate::value::Datum;

    fn host() -> Host {
        let mut host = Host::new("web-1", Timestamp::from_micros(100));
        host.attributes.insert(
            name_key("role"),
            Attribute::new("role", Datum::from("frontend"), Timestamp::from_micros(50)),
        );
        host.attributes.insert(
            name_key("cores"),
            Attribute::new("cores", Datum::Integer(8), Timestamp::from_micros(60)),
        );
        host.services.insert(
            name_key("httpd"),
            Service::new("httpd", Timestamp::from_micros(80)),
        );
        host
    }

    fn name_is(name: &str) -> Matcher {
        Matcher::cmp_eq(Expr::field(Field::Name), Expr::constant(name))
    }

    #[test]
    fn test_cmp_operators() {
        let host = host();
        let obj = ObjectRef::Host(&host);
        let lu = |micros| {
            Expr::constant(Datum::DateTime(Timestamp::from_micros(micros)))
        };

        assert!(Matcher::cmp_eq(Expr::field(Field::LastUpdate), lu(100)).matches(&obj));
        assert!(Matcher::cmp_ne(Expr::field(Field::LastUpdate), lu(99)).matches(&obj));
        assert!(Matcher::cmp_lt(Expr::field(Field::LastUpdate), lu(101)).matches(&obj));
        assert!(Matcher::cmp_le(Expr::field(Field::LastUpdate), lu(100)).matches(&obj));
        assert!(Matcher::cmp_gt(Expr::field(Field::LastUpdate), lu(99)).matches(&obj));
        assert!(Matcher::cmp_ge(Expr::field(Field::LastUpdate), lu(100)).matches(&obj));

        assert!(!Matcher::cmp_gt(Expr::field(Field::LastUpdate), lu(100)).matches(&obj));
    }

    #[test]
    fn test_cmp_type_mismatch_is_false() {
        let host = host();
        let obj = ObjectRef::Host(&host);

        // name (string) vs integer: no comparison, not even for !=
        let m = Matcher::cmp_ne(Expr::field(Field::Name), Expr::constant(Datum::Integer(1)));
        assert!(!m.matches(&obj));
    }

    #[test]
    fn test_cmp_eval_error_is_false() {
        let host = host();
        let obj = ObjectRef::Host(&host);

        let bad = Expr::field(Field::Name).add(Expr::constant(Datum::Integer(1)));
        assert!(!Matcher::cmp_eq(bad, Expr::constant(Datum::Integer(1))).matches(&obj));
    }

    #[test]
    fn test_regex() {
        let host = host();
        let obj = ObjectRef::Host(&host);

        let m = Matcher::regex(Expr::field(Field::Name), "^web-[0-9]+$").unwrap();
        assert!(m.matches(&obj));

        let m = Matcher::nregex(Expr::field(Field::Name), "^db-").unwrap();
        assert!(m.matches(&obj));

        // Non-string operand: false for both polarities.
        let m = Matcher::regex(Expr::field(Field::LastUpdate), "1").unwrap();
        assert!(!m.matches(&obj));
        let m = Matcher::nregex(Expr::field(Field::LastUpdate), "1").unwrap();
        assert!(!m.matches(&obj));
    }

    #[test]
    fn test_regex_invalid_pattern() {
        assert!(matches!(
            Matcher::regex(Expr::field(Field::Name), "("),
            Err(StoreError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_regex_cache_reuse() {
        let first = Matcher::regex(Expr::field(Field::Name), "cache-probe-[a-z]+").unwrap();
        let second = Matcher::regex(Expr::field(Field::Name), "cache-probe-[a-z]+").unwrap();
        let (Matcher::Regex { regex: a, .. }, Matcher::Regex { regex: b, .. }) =
            (&first, &second)
        else {
            panic!("constructors must build regex matchers");
        };
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_isnull() {
        let host = host();
        let obj = ObjectRef::Host(&host);
        let attr = host.attribute("role").unwrap();
        let attr_obj = ObjectRef::Attribute(attr);

        // Hosts have no value; attributes do.
        assert!(Matcher::is_null(Expr::field(Field::Value)).matches(&obj));
        assert!(!Matcher::is_null(Expr::field(Field::Value)).matches(&attr_obj));
        assert!(Matcher::is_not_null(Expr::field(Field::Value)).matches(&attr_obj));
        assert!(!Matcher::is_not_null(Expr::field(Field::Value)).matches(&obj));
    }

    #[test]
    fn test_boolean_composition() {
        let host = host();
        let obj = ObjectRef::Host(&host);

        assert!(Matcher::and(name_is("web-1"), name_is("web-1")).matches(&obj));
        assert!(!Matcher::and(name_is("web-1"), name_is("db-1")).matches(&obj));
        assert!(Matcher::or(name_is("db-1"), name_is("web-1")).matches(&obj));
        assert!(!Matcher::or(name_is("db-1"), name_is("db-2")).matches(&obj));
        assert!(Matcher::not(name_is("db-1")).matches(&obj));
    }

    #[test]
    fn test_any_all_over_attributes() {
        let host = host();
        let obj = ObjectRef::Host(&host);

        let value_is_int = Matcher::cmp_eq(
            Expr::field(Field::Value),
            Expr::constant(Datum::Integer(8)),
        );
        assert!(Matcher::any(ChildSet::Attributes, value_is_int.clone()).matches(&obj));
        assert!(!Matcher::all(ChildSet::Attributes, value_is_int).matches(&obj));

        let recent = Matcher::cmp_ge(
            Expr::field(Field::LastUpdate),
            Expr::constant(Datum::DateTime(Timestamp::from_micros(50))),
        );
        assert!(Matcher::all(ChildSet::Attributes, recent).matches(&obj));
    }

    #[test]
    fn test_any_all_over_services() {
        let host = host();
        let obj = ObjectRef::Host(&host);

        assert!(Matcher::any(ChildSet::Services, name_is("httpd")).matches(&obj));
        assert!(!Matcher::any(ChildSet::Metrics, name_is("httpd")).matches(&obj));
        // Empty set: all() accepts, any() rejects.
        assert!(Matcher::all(ChildSet::Metrics, name_is("x")).matches(&obj));
    }

    #[test]
    fn test_structural_sets_on_non_hosts() {
        let host = host();
        let svc = host.service("httpd").unwrap();
        let obj = ObjectRef::Service(svc);

        // Services have no services/metrics below them.
        assert!(!Matcher::any(ChildSet::Services, name_is("httpd")).matches(&obj));
        assert!(Matcher::all(ChildSet::Services, name_is("httpd")).matches(&obj));
    }

    #[test]
    fn test_in_matcher() {
        let host = host();
        let obj = ObjectRef::Host(&host);

        let haystack = Expr::constant(Datum::Array(vec![
            Datum::from("db-1"),
            Datum::from("web-1"),
        ]));
        assert!(Matcher::is_in(Expr::field(Field::Name), haystack).matches(&obj));

        let haystack = Expr::constant(Datum::Array(vec![Datum::from("db-1")]));
        assert!(!Matcher::is_in(Expr::field(Field::Name), haystack).matches(&obj));

        // Non-array haystack is a non-match.
        assert!(
            !Matcher::is_in(Expr::field(Field::Name), Expr::constant("web-1")).matches(&obj)
        );

        // A null needle never matches.
        let haystack = Expr::constant(Datum::Array(vec![Datum::Null]));
        assert!(!Matcher::is_in(Expr::field(Field::Value), haystack).matches(&obj));
    }
}
