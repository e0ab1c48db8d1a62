//! # Policy Model
//!
//! Immutable value types: [`Constraint`], [`Rule`] (used both as
//! [`Permission`] and [`Prohibition`]), and [`Policy`]. The evaluation
//! context is an open attribute map, [`EvaluationContext`], whose values
//! are scalars or lists ([`AttributeValue`]).
//!
//! Wire names follow ODRL (`leftOperand`, `rightOperand`); snake_case
//! aliases are accepted on input.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Action assumed when the context carries no `action` attribute.
pub const DEFAULT_ACTION: &str = "USE";

// ─── Attribute values ────────────────────────────────────────────────

/// A context attribute or constraint operand: a scalar or a list.
///
/// JSON `null` and objects are rejected at deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Build a list value from anything convertible into attribute values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<AttributeValue>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a numeric value. Returns `None` for NaN or infinite input.
    pub fn number(value: f64) -> Option<Self> {
        serde_json::Number::from_f64(value).map(Self::Number)
    }

    /// The list items, if this is a list.
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// The string, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(items: Vec<T>) -> Self {
        Self::list(items)
    }
}

/// String form used by the `contains` operator and in trace descriptions.
impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// ─── Evaluation context ──────────────────────────────────────────────

/// Attributes of the requesting party, keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationContext(BTreeMap<String, AttributeValue>);

impl EvaluationContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or replace an attribute.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up an attribute.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    /// The requested action: `context["action"]`, or [`DEFAULT_ACTION`].
    pub fn action(&self) -> String {
        match self.0.get("action") {
            Some(AttributeValue::Text(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => DEFAULT_ACTION.to_string(),
        }
    }

    /// Overlay `other` on top of this context; keys in `other` win.
    pub fn merged(&self, other: &EvaluationContext) -> Self {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }

    /// Iterate attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, AttributeValue>> for EvaluationContext {
    fn from(map: BTreeMap<String, AttributeValue>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for EvaluationContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ─── Operators ───────────────────────────────────────────────────────

/// Constraint comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Eq,
    Neq,
    In,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    HasAny,
}

impl Operator {
    /// Every supported operator, in declaration order.
    pub const ALL: [Operator; 9] = [
        Self::Eq,
        Self::Neq,
        Self::In,
        Self::Gt,
        Self::Lt,
        Self::Gte,
        Self::Lte,
        Self::Contains,
        Self::HasAny,
    ];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::In => "in",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Contains => "contains",
            Self::HasAny => "has_any",
        }
    }
}

/// Case-insensitive parse.
impl FromStr for Operator {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == lowered)
            .ok_or_else(|| PolicyError::UnknownOperator(s.to_string()))
    }
}

impl TryFrom<String> for Operator {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Constraints and rules ───────────────────────────────────────────

/// A single condition over one context attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Name of the context attribute to test.
    #[serde(rename = "leftOperand", alias = "left_operand")]
    pub left_operand: String,
    pub operator: Operator,
    /// Value the attribute is compared against.
    #[serde(rename = "rightOperand", alias = "right_operand")]
    pub right_operand: AttributeValue,
}

impl Constraint {
    pub fn new(
        left_operand: impl Into<String>,
        operator: Operator,
        right_operand: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            left_operand: left_operand.into(),
            operator,
            right_operand: right_operand.into(),
        }
    }

    /// Human-readable form, e.g. `partner_type eq tier1_supplier`.
    pub fn describe(&self) -> String {
        format!("{} {} {}", self.left_operand, self.operator, self.right_operand)
    }
}

/// An action gated by an ordered list of constraints.
///
/// With no constraints the rule applies unconditionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub action: String,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// Allow rule.
pub type Permission = Rule;

/// Deny rule.
pub type Prohibition = Rule;

impl Rule {
    /// A rule with no constraints.
    pub fn unconditional(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            constraints: Vec::new(),
        }
    }

    /// Builder-style constraint append.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Case-insensitive action comparison.
    pub fn matches_action(&self, action: &str) -> bool {
        self.action.to_uppercase() == action.to_uppercase()
    }
}

// ─── Policy ──────────────────────────────────────────────────────────

/// An access policy. Obligations are carried for display only and never
/// evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub prohibitions: Vec<Prohibition>,
    #[serde(default)]
    pub obligations: Vec<Rule>,
}

impl Policy {
    /// An empty policy. Denies everything until a permission is added.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            permissions: Vec::new(),
            prohibitions: Vec::new(),
            obligations: Vec::new(),
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn with_prohibition(mut self, prohibition: Prohibition) -> Self {
        self.prohibitions.push(prohibition);
        self
    }

    /// Parse a policy document from JSON, validating operators.
    pub fn from_json(s: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Parse a policy document from YAML, validating operators.
    pub fn from_yaml(s: &str) -> Result<Self, PolicyError> {
        Ok(serde_yaml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_parse_is_case_insensitive() {
        assert_eq!("EQ".parse::<Operator>().unwrap(), Operator::Eq);
        assert_eq!("Has_Any".parse::<Operator>().unwrap(), Operator::HasAny);
        assert_eq!(" gte ".parse::<Operator>().unwrap(), Operator::Gte);
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = "matches".parse::<Operator>().unwrap_err();
        assert!(matches!(err, PolicyError::UnknownOperator(ref s) if s == "matches"));
    }

    #[test]
    fn test_operator_names_roundtrip() {
        for op in Operator::ALL {
            assert_eq!(op.as_str().parse::<Operator>().unwrap(), op);
        }
    }

    #[test]
    fn test_policy_with_unknown_operator_fails_to_parse() {
        let doc = json!({
            "id": "policy-bad",
            "permissions": [{
                "action": "USE",
                "constraints": [{"leftOperand": "region", "operator": "like", "rightOperand": "EU"}]
            }]
        });
        assert!(Policy::from_json(&doc.to_string()).is_err());
    }

    #[test]
    fn test_constraint_accepts_snake_case_aliases() {
        let c: Constraint = serde_json::from_value(json!({
            "left_operand": "region",
            "operator": "IN",
            "right_operand": ["EU", "EEA"]
        }))
        .unwrap();
        assert_eq!(c.operator, Operator::In);
        assert_eq!(c.describe(), "region in [EU, EEA]");
    }

    #[test]
    fn test_constraint_serializes_odrl_names() {
        let c = Constraint::new("partner_type", Operator::Eq, "tier1_supplier");
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["leftOperand"], "partner_type");
        assert_eq!(v["operator"], "eq");
        assert_eq!(v["rightOperand"], "tier1_supplier");
    }

    #[test]
    fn test_policy_from_yaml() {
        let yaml = r#"
id: policy-yaml
permissions:
  - action: USE
    constraints:
      - leftOperand: certification
        operator: has_any
        rightOperand: [TISAX, ISO27001]
prohibitions:
  - action: DISTRIBUTE
"#;
        let policy = Policy::from_yaml(yaml).unwrap();
        assert_eq!(policy.permissions.len(), 1);
        assert_eq!(policy.prohibitions[0].action, "DISTRIBUTE");
        assert!(policy.obligations.is_empty());
    }

    #[test]
    fn test_attribute_value_rejects_null_and_objects() {
        assert!(serde_json::from_value::<AttributeValue>(json!(null)).is_err());
        assert!(serde_json::from_value::<AttributeValue>(json!({"a": 1})).is_err());
    }

    #[test]
    fn test_context_action_defaults_to_use() {
        assert_eq!(EvaluationContext::new().action(), "USE");
        assert_eq!(EvaluationContext::new().with("action", "distribute").action(), "distribute");
    }

    #[test]
    fn test_context_merge_prefers_overlay() {
        let base = EvaluationContext::new()
            .with("partner_type", "tier2_supplier")
            .with("region", "EU");
        let overlay = EvaluationContext::new().with("partner_type", "tier1_supplier");
        let merged = base.merged(&overlay);
        assert_eq!(merged.get("partner_type"), Some(&AttributeValue::from("tier1_supplier")));
        assert_eq!(merged.get("region"), Some(&AttributeValue::from("EU")));
    }

    #[test]
    fn test_rule_action_match_ignores_case() {
        let rule = Rule::unconditional("Use");
        assert!(rule.matches_action("USE"));
        assert!(rule.matches_action("use"));
        assert!(!rule.matches_action("DISTRIBUTE"));
    }
}
