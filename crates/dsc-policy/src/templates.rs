//! # Standard Policy Templates
//!
//! Six automotive supply-chain policies the provider can bind assets to,
//! keyed by short policy key:
//!
//! | Key                  | Grants `USE` when                                   | Prohibits            |
//! |----------------------|-----------------------------------------------------|----------------------|
//! | `tier1-only`         | `partner_type eq tier1_supplier`                    | DISTRIBUTE           |
//! | `certified-partners` | `certification has_any [TISAX, ISO27001]`           | DISTRIBUTE, MODIFY   |
//! | `eu-region`          | `region in [EU, EEA]`                               | DISTRIBUTE           |
//! | `quality-data`       | tier-1/2 supplier AND `purpose eq quality_analysis` | DISTRIBUTE, ARCHIVE  |
//! | `traceability`       | `certification contains IATF16949`                  | —                    |
//! | `open-access`        | always                                              | DISTRIBUTE           |

use dsc_core::PolicyKey;

use crate::model::{Constraint, Operator, Policy, Rule};

fn key(s: &'static str) -> PolicyKey {
    PolicyKey::from_static(s)
}

fn use_when(constraints: Vec<Constraint>) -> Rule {
    constraints
        .into_iter()
        .fold(Rule::unconditional("USE"), Rule::with_constraint)
}

/// The standard policy set, in a fixed order.
pub fn standard_policies() -> Vec<(PolicyKey, Policy)> {
    vec![
        (
            key("tier1-only"),
            Policy::new("policy-tier1-only")
                .with_permission(use_when(vec![Constraint::new(
                    "partner_type",
                    Operator::Eq,
                    "tier1_supplier",
                )]))
                .with_prohibition(Rule::unconditional("DISTRIBUTE")),
        ),
        (
            key("certified-partners"),
            Policy::new("policy-certified-partners")
                .with_permission(use_when(vec![Constraint::new(
                    "certification",
                    Operator::HasAny,
                    vec!["TISAX", "ISO27001"],
                )]))
                .with_prohibition(Rule::unconditional("DISTRIBUTE"))
                .with_prohibition(Rule::unconditional("MODIFY")),
        ),
        (
            key("eu-region"),
            Policy::new("policy-eu-region")
                .with_permission(use_when(vec![Constraint::new(
                    "region",
                    Operator::In,
                    vec!["EU", "EEA"],
                )]))
                .with_prohibition(Rule::unconditional("DISTRIBUTE")),
        ),
        (
            key("quality-data"),
            Policy::new("policy-quality-data")
                .with_permission(use_when(vec![
                    Constraint::new(
                        "partner_type",
                        Operator::In,
                        vec!["tier1_supplier", "tier2_supplier"],
                    ),
                    Constraint::new("purpose", Operator::Eq, "quality_analysis"),
                ]))
                .with_prohibition(Rule::unconditional("DISTRIBUTE"))
                .with_prohibition(Rule::unconditional("ARCHIVE")),
        ),
        (
            key("traceability"),
            Policy::new("policy-traceability").with_permission(use_when(vec![Constraint::new(
                "certification",
                Operator::Contains,
                "IATF16949",
            )])),
        ),
        (
            key("open-access"),
            Policy::new("policy-open-access")
                .with_permission(Rule::unconditional("USE"))
                .with_prohibition(Rule::unconditional("DISTRIBUTE")),
        ),
    ]
}

/// Human-readable summary, e.g.
/// `Allows USE when: partner_type eq tier1_supplier; Prohibits DISTRIBUTE`.
pub fn describe(policy: &Policy) -> String {
    let mut parts = Vec::new();

    for permission in &policy.permissions {
        let mut part = format!("Allows {}", permission.action);
        if !permission.constraints.is_empty() {
            let conditions: Vec<String> =
                permission.constraints.iter().map(Constraint::describe).collect();
            part.push_str(" when: ");
            part.push_str(&conditions.join(" AND "));
        }
        parts.push(part);
    }

    for prohibition in &policy.prohibitions {
        parts.push(format!("Prohibits {}", prohibition.action));
    }

    if parts.is_empty() {
        "No restrictions".to_string()
    } else {
        parts.join("; ")
    }
}
