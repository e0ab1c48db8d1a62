//! # Policy Evaluation
//!
//! `evaluate(policy, context) → PolicyDecision` with a full trace of every
//! constraint checked, satisfied or not, in the order it was checked.
//!
//! ## Algorithm
//!
//! 1. Prohibitions whose action matches the request action: if the
//!    constraint list is empty or every constraint holds, deny with
//!    `action '<ACTION>' is prohibited`.
//! 2. Permissions in declared order: the first matching one with no
//!    constraints, or with every constraint holding, grants.
//! 3. Otherwise deny with `no matching permission found`.
//!
//! A missing context attribute makes its constraint unsatisfied. Ordered
//! comparisons between anything other than two numbers or two strings are
//! unsatisfied.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{AttributeValue, Constraint, EvaluationContext, Operator, Policy};

// ---------------------------------------------------------------------------
// Decision types
// ---------------------------------------------------------------------------

/// Outcome of checking one constraint against the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintCheck {
    /// `"<leftOperand> <operator> <rightOperand>"`.
    pub constraint: String,
    /// The value found in the context; `None` when the attribute was not provided.
    pub context_value: Option<AttributeValue>,
    pub satisfied: bool,
}

/// Result of evaluating a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: String,
    /// Every constraint checked, in evaluation order.
    pub evaluated_constraints: Vec<ConstraintCheck>,
}

impl PolicyDecision {
    fn allow(reason: &str, trace: Vec<ConstraintCheck>) -> Self {
        Self {
            allowed: true,
            reason: reason.to_string(),
            evaluated_constraints: trace,
        }
    }

    fn deny(reason: String, trace: Vec<ConstraintCheck>) -> Self {
        Self {
            allowed: false,
            reason,
            evaluated_constraints: trace,
        }
    }
}

pub(crate) const REASON_UNCONSTRAINED: &str = "permission granted (no constraints)";
pub(crate) const REASON_SATISFIED: &str = "all permission constraints satisfied";
pub(crate) const REASON_NO_MATCH: &str = "no matching permission found";

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate `policy` against `context`. Pure and deterministic.
pub fn evaluate(policy: &Policy, context: &EvaluationContext) -> PolicyDecision {
    let action = context.action();
    let mut trace = Vec::new();

    for prohibition in policy.prohibitions.iter().filter(|p| p.matches_action(&action)) {
        let checks = check_all(&prohibition.constraints, context);
        let blocked = checks.iter().all(|c| c.satisfied);
        trace.extend(checks);
        if blocked {
            return PolicyDecision::deny(
                format!("action '{}' is prohibited", prohibition.action.to_uppercase()),
                trace,
            );
        }
    }

    for permission in policy.permissions.iter().filter(|p| p.matches_action(&action)) {
        if permission.constraints.is_empty() {
            return PolicyDecision::allow(REASON_UNCONSTRAINED, trace);
        }
        let checks = check_all(&permission.constraints, context);
        let granted = checks.iter().all(|c| c.satisfied);
        trace.extend(checks);
        if granted {
            return PolicyDecision::allow(REASON_SATISFIED, trace);
        }
    }

    PolicyDecision::deny(REASON_NO_MATCH.to_string(), trace)
}

fn check_all(constraints: &[Constraint], context: &EvaluationContext) -> Vec<ConstraintCheck> {
    constraints
        .iter()
        .map(|c| evaluate_constraint(c, context))
        .collect()
}

/// Check a single constraint and record what was observed.
pub fn evaluate_constraint(constraint: &Constraint, context: &EvaluationContext) -> ConstraintCheck {
    let observed = context.get(&constraint.left_operand);
    let satisfied = observed
        .map(|left| holds(constraint.operator, left, &constraint.right_operand))
        .unwrap_or(false);
    ConstraintCheck {
        constraint: constraint.describe(),
        context_value: observed.cloned(),
        satisfied,
    }
}

fn holds(operator: Operator, left: &AttributeValue, right: &AttributeValue) -> bool {
    match operator {
        Operator::Eq => values_equal(left, right),
        Operator::Neq => !values_equal(left, right),
        Operator::In => right
            .as_list()
            .map(|items| items.iter().any(|item| values_equal(left, item)))
            .unwrap_or(false),
        Operator::Gt => compare(left, right) == Some(Ordering::Greater),
        Operator::Lt => compare(left, right) == Some(Ordering::Less),
        Operator::Gte => matches!(compare(left, right), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lte => matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal)),
        Operator::Contains => match left.as_list() {
            Some(items) => items.iter().any(|item| values_equal(item, right)),
            None => left.to_string().contains(&right.to_string()),
        },
        Operator::HasAny => match (left.as_list(), right.as_list()) {
            (Some(have), Some(wanted)) => have
                .iter()
                .any(|h| wanted.iter().any(|w| values_equal(h, w))),
            _ => false,
        },
    }
}

/// Equality with numeric coercion: `1` equals `1.0`.
fn values_equal(a: &AttributeValue, b: &AttributeValue) -> bool {
    match (a, b) {
        (AttributeValue::Number(x), AttributeValue::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (AttributeValue::List(xs), AttributeValue::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

/// Ordering between two numbers or two strings; `None` for anything else.
fn compare(a: &AttributeValue, b: &AttributeValue) -> Option<Ordering> {
    match (a, b) {
        (AttributeValue::Number(x), AttributeValue::Number(y)) => {
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (AttributeValue::Text(x), AttributeValue::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rule;
    use crate::templates::standard_policies;
    use proptest::prelude::*;

    fn template(key: &str) -> Policy {
        standard_policies()
            .into_iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, p)| p)
            .unwrap()
    }

    fn single(op: Operator, right: impl Into<AttributeValue>) -> Policy {
        Policy::new("policy-test").with_permission(
            Rule::unconditional("USE").with_constraint(Constraint::new("attr", op, right)),
        )
    }

    fn allowed_with(policy: &Policy, value: impl Into<AttributeValue>) -> bool {
        evaluate(policy, &EvaluationContext::new().with("attr", value)).allowed
    }

    // ── Scenarios ───────────────────────────────────────────────────

    #[test]
    fn test_tier1_only_allows_tier1_supplier() {
        let ctx = EvaluationContext::new().with("partner_type", "tier1_supplier");
        let decision = evaluate(&template("tier1-only"), &ctx);
        assert!(decision.allowed);
        assert_eq!(decision.reason, "all permission constraints satisfied");
        assert_eq!(decision.evaluated_constraints.len(), 1);
        assert!(decision.evaluated_constraints[0].satisfied);
        assert_eq!(
            decision.evaluated_constraints[0].constraint,
            "partner_type eq tier1_supplier"
        );
    }

    #[test]
    fn test_quality_data_denies_wrong_purpose() {
        let ctx = EvaluationContext::new()
            .with("partner_type", "tier1_supplier")
            .with("purpose", "cost_reduction");
        let decision = evaluate(&template("quality-data"), &ctx);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "no matching permission found");
        let purpose = decision
            .evaluated_constraints
            .iter()
            .find(|c| c.constraint.starts_with("purpose"))
            .unwrap();
        assert!(!purpose.satisfied);
        assert_eq!(purpose.context_value, Some(AttributeValue::from("cost_reduction")));
    }

    #[test]
    fn test_missing_attribute_is_unsatisfied_and_recorded() {
        let decision = evaluate(&template("eu-region"), &EvaluationContext::new());
        assert!(!decision.allowed);
        assert_eq!(decision.evaluated_constraints.len(), 1);
        assert_eq!(decision.evaluated_constraints[0].context_value, None);
        assert!(!decision.evaluated_constraints[0].satisfied);
    }

    // ── Deny overrides allow ────────────────────────────────────────

    #[test]
    fn test_unconditional_prohibition_overrides_permission() {
        let policy = template("open-access");
        let ctx = EvaluationContext::new().with("action", "distribute");
        let decision = evaluate(&policy, &ctx);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "action 'DISTRIBUTE' is prohibited");
    }

    #[test]
    fn test_conditional_prohibition_blocks_only_when_satisfied() {
        let policy = Policy::new("policy-test")
            .with_permission(Rule::unconditional("USE"))
            .with_prohibition(
                Rule::unconditional("USE")
                    .with_constraint(Constraint::new("region", Operator::Eq, "NA")),
            );

        let na = EvaluationContext::new().with("region", "NA");
        assert!(!evaluate(&policy, &na).allowed);

        let eu = EvaluationContext::new().with("region", "EU");
        let decision = evaluate(&policy, &eu);
        assert!(decision.allowed);
        assert_eq!(decision.reason, "permission granted (no constraints)");
        // The unsatisfied prohibition check stays in the trace.
        assert_eq!(decision.evaluated_constraints.len(), 1);
        assert!(!decision.evaluated_constraints[0].satisfied);
    }

    #[test]
    fn test_unconstrained_permission_grants_any_context() {
        let decision = evaluate(&template("open-access"), &EvaluationContext::new());
        assert!(decision.allowed);
        assert!(decision.evaluated_constraints.is_empty());
    }

    #[test]
    fn test_first_matching_permission_wins_in_order() {
        let policy = Policy::new("policy-test")
            .with_permission(
                Rule::unconditional("USE")
                    .with_constraint(Constraint::new("region", Operator::Eq, "NA")),
            )
            .with_permission(Rule::unconditional("USE"));
        let decision = evaluate(&policy, &EvaluationContext::new().with("region", "EU"));
        assert!(decision.allowed);
        assert_eq!(decision.reason, "permission granted (no constraints)");
        assert_eq!(decision.evaluated_constraints.len(), 1);
    }

    #[test]
    fn test_empty_policy_denies() {
        let decision = evaluate(&Policy::new("policy-empty"), &EvaluationContext::new());
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "no matching permission found");
    }

    #[test]
    fn test_action_mismatch_skips_permission() {
        let policy = Policy::new("p").with_permission(Rule::unconditional("USE"));
        let ctx = EvaluationContext::new().with("action", "ARCHIVE");
        assert!(!evaluate(&policy, &ctx).allowed);
    }

    // ── Operators ───────────────────────────────────────────────────

    #[test]
    fn test_eq_and_neq() {
        assert!(allowed_with(&single(Operator::Eq, "EU"), "EU"));
        assert!(!allowed_with(&single(Operator::Eq, "EU"), "NA"));
        assert!(allowed_with(&single(Operator::Neq, "EU"), "NA"));
        assert!(!allowed_with(&single(Operator::Neq, "EU"), "EU"));
    }

    #[test]
    fn test_eq_coerces_numbers() {
        let policy = single(Operator::Eq, AttributeValue::number(5.0).unwrap());
        assert!(allowed_with(&policy, 5i64));
    }

    #[test]
    fn test_in_requires_list_operand() {
        assert!(allowed_with(&single(Operator::In, vec!["EU", "EEA"]), "EEA"));
        assert!(!allowed_with(&single(Operator::In, vec!["EU", "EEA"]), "NA"));
        assert!(!allowed_with(&single(Operator::In, "EU"), "EU"));
    }

    #[test]
    fn test_ordered_comparisons() {
        assert!(allowed_with(&single(Operator::Gt, 3i64), 4i64));
        assert!(!allowed_with(&single(Operator::Gt, 3i64), 3i64));
        assert!(allowed_with(&single(Operator::Gte, 3i64), 3i64));
        assert!(allowed_with(&single(Operator::Lt, 3i64), 2i64));
        assert!(allowed_with(&single(Operator::Lte, 3i64), 3i64));
        assert!(allowed_with(&single(Operator::Gt, "b"), "c"));
    }

    #[test]
    fn test_ordered_comparison_type_mismatch_is_unsatisfied() {
        assert!(!allowed_with(&single(Operator::Gt, 3i64), "4"));
        assert!(!allowed_with(&single(Operator::Lte, "z"), 1i64));
        assert!(!allowed_with(&single(Operator::Gte, 1i64), vec![2i64]));
    }

    #[test]
    fn test_contains_on_list_and_string() {
        let policy = single(Operator::Contains, "IATF16949");
        assert!(allowed_with(&policy, vec!["TISAX", "IATF16949"]));
        assert!(!allowed_with(&policy, vec!["TISAX"]));
        assert!(allowed_with(&policy, "certified IATF16949 plant"));
        assert!(!allowed_with(&policy, "ISO27001"));
    }

    #[test]
    fn test_has_any_requires_two_lists() {
        let policy = single(Operator::HasAny, vec!["TISAX", "ISO27001"]);
        assert!(allowed_with(&policy, vec!["ISO27001", "IATF16949"]));
        assert!(!allowed_with(&policy, vec!["IATF16949"]));
        assert!(!allowed_with(&policy, Vec::<&str>::new()));
        assert!(!allowed_with(&policy, "TISAX"));
    }

    // ── Properties ──────────────────────────────────────────────────

    fn arb_certs() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(prop::sample::select(vec!["TISAX", "ISO27001", "IATF16949", "ISO9001"]), 0..4)
            .prop_map(|v| v.into_iter().map(String::from).collect())
    }

    proptest! {
        #[test]
        fn prop_evaluation_is_deterministic(
            partner in prop::sample::select(vec!["tier1_supplier", "tier2_supplier", "oem"]),
            purpose in prop::sample::select(vec!["quality_analysis", "cost_reduction"]),
            certs in arb_certs(),
        ) {
            let ctx = EvaluationContext::new()
                .with("partner_type", partner)
                .with("purpose", purpose)
                .with("certification", certs);
            for (_, policy) in standard_policies() {
                prop_assert_eq!(evaluate(&policy, &ctx), evaluate(&policy, &ctx));
            }
        }

        #[test]
        fn prop_has_any_matches_set_intersection(left in arb_certs(), right in arb_certs()) {
            let policy = single(Operator::HasAny, right.clone());
            let expected = left.iter().any(|l| right.contains(l));
            prop_assert_eq!(allowed_with(&policy, left), expected);
        }

        #[test]
        fn prop_unconditional_prohibition_always_denies(certs in arb_certs()) {
            let policy = Policy::new("p")
                .with_permission(Rule::unconditional("USE"))
                .with_prohibition(Rule::unconditional("use"));
            let ctx = EvaluationContext::new().with("certification", certs);
            prop_assert!(!evaluate(&policy, &ctx).allowed);
        }
    }
}
