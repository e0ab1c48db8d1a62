//! # Policy Subcommand
//!
//! Inspect the standard policy templates and evaluate policies offline.
//!
//! ```text
//! dsc policy list
//! dsc policy show tier1-only
//! dsc policy evaluate --policy quality-data -a partner_type=tier1_supplier -a purpose=quality_analysis
//! dsc policy evaluate --policy-file my-policy.yaml --context-file consumer.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use dsc_core::PolicyKey;
use dsc_policy::{describe, evaluate, AttributeValue, EvaluationContext, Policy, PolicyRegistry};
use serde_json::json;

use crate::Report;

/// Arguments for the policy subcommand.
#[derive(Args, Debug)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// List the registered policy templates.
    List,
    /// Print one policy template.
    Show {
        /// Template key, e.g. `tier1-only`.
        key: String,
    },
    /// Evaluate a policy against consumer attributes.
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Template key to evaluate.
    #[arg(long, conflicts_with = "policy_file", required_unless_present = "policy_file")]
    pub policy: Option<String>,

    /// Policy document to evaluate (`.json`, otherwise parsed as YAML).
    #[arg(long)]
    pub policy_file: Option<PathBuf>,

    /// Attribute as KEY=VALUE. Comma-separated values become lists.
    #[arg(short = 'a', long = "attr", value_parser = parse_attribute)]
    pub attributes: Vec<(String, AttributeValue)>,

    /// JSON or YAML object of attributes; `--attr` values win on conflict.
    #[arg(long)]
    pub context_file: Option<PathBuf>,
}

pub fn run(args: &PolicyArgs) -> anyhow::Result<Report> {
    let registry = PolicyRegistry::standard();
    match &args.command {
        PolicyCommand::List => Ok(Report::ok(json!(registry
            .list()
            .map(|(key, policy)| json!({
                "key": key,
                "id": policy.id,
                "description": describe(policy),
            }))
            .collect::<Vec<_>>()))),
        PolicyCommand::Show { key } => {
            let policy = lookup(&registry, key)?;
            Ok(Report::ok(json!({
                "key": key,
                "description": describe(policy),
                "policy": policy,
            })))
        }
        PolicyCommand::Evaluate(eval) => {
            let policy = match (&eval.policy, &eval.policy_file) {
                (Some(key), _) => lookup(&registry, key)?.clone(),
                (None, Some(path)) => load_policy(path)?,
                (None, None) => bail!("either --policy or --policy-file is required"),
            };
            let context = build_context(eval)?;
            tracing::debug!(policy = %policy.id, attributes = context.len(), "evaluating policy");
            let decision = evaluate(&policy, &context);
            let output = json!({ "policy_id": policy.id, "decision": decision });
            Ok(if decision.allowed {
                Report::ok(output)
            } else {
                Report::failed(output)
            })
        }
    }
}

fn lookup<'a>(registry: &'a PolicyRegistry, key: &str) -> anyhow::Result<&'a Policy> {
    let key = PolicyKey::new(key)?;
    registry
        .get(&key)
        .with_context(|| format!("no policy template named '{key}'"))
}

/// Read a policy document. `.json` files are parsed as JSON, anything else
/// as YAML.
pub fn load_policy(path: &Path) -> anyhow::Result<Policy> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file {}", path.display()))?;
    let policy = if has_json_extension(path) {
        Policy::from_json(&text)
    } else {
        Policy::from_yaml(&text)
    };
    policy.with_context(|| format!("invalid policy document {}", path.display()))
}

fn build_context(args: &EvaluateArgs) -> anyhow::Result<EvaluationContext> {
    let mut context = match &args.context_file {
        Some(path) => load_context(path)?,
        None => EvaluationContext::new(),
    };
    for (key, value) in &args.attributes {
        context.insert(key.clone(), value.clone());
    }
    Ok(context)
}

fn load_context(path: &Path) -> anyhow::Result<EvaluationContext> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read context file {}", path.display()))?;
    let context = if has_json_extension(path) {
        serde_json::from_str(&text)?
    } else {
        serde_yaml::from_str(&text)?
    };
    Ok(context)
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Parse `KEY=VALUE`. Values are typed loosely: `true`/`false` become
/// booleans, numbers become numbers, and a value containing a comma becomes
/// a list of strings.
pub fn parse_attribute(raw: &str) -> Result<(String, AttributeValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("attribute name missing in '{raw}'"));
    }
    let value = value.trim();
    let parsed = if value.contains(',') {
        AttributeValue::list(
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty()),
        )
    } else if let Ok(flag) = value.parse::<bool>() {
        AttributeValue::from(flag)
    } else if let Ok(n) = value.parse::<i64>() {
        AttributeValue::from(n)
    } else if let Some(n) = value.parse::<f64>().ok().and_then(AttributeValue::number) {
        n
    } else {
        AttributeValue::from(value)
    };
    Ok((key.to_string(), parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attribute_types() {
        assert_eq!(
            parse_attribute("region=EU").unwrap(),
            ("region".to_string(), AttributeValue::from("EU"))
        );
        assert_eq!(
            parse_attribute("verified=true").unwrap().1,
            AttributeValue::from(true)
        );
        assert_eq!(parse_attribute("tier=2").unwrap().1, AttributeValue::from(2_i64));
        assert_eq!(
            parse_attribute("certification=TISAX, ISO27001").unwrap().1,
            AttributeValue::list(["TISAX", "ISO27001"])
        );
    }

    #[test]
    fn test_parse_attribute_rejects_missing_separator() {
        assert!(parse_attribute("region").is_err());
        assert!(parse_attribute("=EU").is_err());
    }

    #[test]
    fn test_list_includes_every_template() {
        let report = run(&PolicyArgs {
            command: PolicyCommand::List,
        })
        .unwrap();
        assert!(report.success);
        let keys: Vec<&str> = report
            .output
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["key"].as_str().unwrap())
            .collect();
        assert!(keys.contains(&"tier1-only"));
        assert!(keys.contains(&"open-access"));
    }

    #[test]
    fn test_show_unknown_template_fails() {
        let result = run(&PolicyArgs {
            command: PolicyCommand::Show { key: "nope".into() },
        });
        assert!(result.unwrap_err().to_string().contains("nope"));
    }

    #[test]
    fn test_evaluate_template_with_attributes() {
        let args = |purpose: &str| PolicyArgs {
            command: PolicyCommand::Evaluate(EvaluateArgs {
                policy: Some("quality-data".into()),
                policy_file: None,
                attributes: vec![
                    parse_attribute("partner_type=tier2_supplier").unwrap(),
                    parse_attribute(&format!("purpose={purpose}")).unwrap(),
                ],
                context_file: None,
            }),
        };

        let allowed = run(&args("quality_analysis")).unwrap();
        assert!(allowed.success);
        assert_eq!(allowed.output["decision"]["allowed"], true);

        let denied = run(&args("cost_reduction")).unwrap();
        assert!(!denied.success);
        assert_eq!(
            denied.output["decision"]["reason"],
            "no matching permission found"
        );
    }
}
