//! # dsc-policy — Access Policies for Data Assets
//!
//! Every asset in the provider's catalog is published under a policy. A
//! policy is a set of **permissions** (allow rules) and **prohibitions**
//! (deny rules), each gated on a list of **constraints** over attributes of
//! the requesting consumer (`partner_type`, `region`, `certification`,
//! `purpose`, ...).
//!
//! ## Evaluation Semantics
//!
//! Deny overrides allow. A prohibition whose action matches the request and
//! whose constraints all hold stops evaluation with `allowed = false`. Only
//! then are permissions scanned, in declared order, for the first one whose
//! action matches and whose constraints all hold. No match is a denial.
//!
//! ## Determinism
//!
//! [`evaluate()`] is a pure function. Context attributes live in a
//! `BTreeMap`, registries are `BTreeMap`-keyed, and no clock or randomness is
//! consulted, so identical inputs always produce identical decisions and
//! identical traces.
//!
//! ## Crate Policy
//!
//! - Depends only on `dsc-core`.
//! - Operators are validated when a policy is parsed. An unknown operator
//!   never reaches the evaluator.

pub mod error;
pub mod evaluation;
pub mod model;
pub mod registry;
pub mod templates;

pub use error::PolicyError;
pub use evaluation::{evaluate, evaluate_constraint, ConstraintCheck, PolicyDecision};
pub use model::{
    AttributeValue, Constraint, EvaluationContext, Operator, Permission, Policy, Prohibition, Rule,
    DEFAULT_ACTION,
};
pub use registry::PolicyRegistry;
pub use templates::{describe, standard_policies};
