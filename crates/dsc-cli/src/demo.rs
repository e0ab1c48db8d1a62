//! # Demo Subcommand
//!
//! Runs a provider and a consumer in one process and walks the consumer
//! through the handshake: catalog, negotiation, agreement, transfer, and
//! data retrieval. The consumer reaches the provider through
//! [`LocalPeer`], so every step takes the same saga path it would take
//! over HTTP.

use std::sync::Arc;

use clap::Args;
use dsc_connector::{
    AuditLog, AuditSink, ConnectorError, ConsumerConnector, ConsumerIdentity, LocalPeer,
    ProviderConnector, DEFAULT_AUDIT_CAPACITY,
};
use dsc_core::AssetId;
use dsc_state::TransferOptions;
use serde_json::json;

use crate::Report;

/// Arguments for the demo subcommand.
#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Asset to negotiate for.
    #[arg(long, default_value = "part-catalog-2024")]
    pub asset: String,

    /// Override the consumer's declared purpose.
    #[arg(long)]
    pub purpose: Option<String>,

    /// Override the consumer's partner type.
    #[arg(long)]
    pub partner_type: Option<String>,
}

pub async fn run(args: &DemoArgs) -> anyhow::Result<Report> {
    let provider_audit = Arc::new(AuditLog::new(DEFAULT_AUDIT_CAPACITY));
    let consumer_audit = Arc::new(AuditLog::new(DEFAULT_AUDIT_CAPACITY));
    let provider = Arc::new(
        ProviderConnector::sample().with_audit(provider_audit.clone() as Arc<dyn AuditSink>),
    );

    let mut identity = ConsumerIdentity::default();
    if let Some(purpose) = &args.purpose {
        identity.purpose = purpose.clone();
    }
    if let Some(partner_type) = &args.partner_type {
        identity.partner_type = partner_type.clone();
    }
    let consumer = ConsumerConnector::new(identity, LocalPeer::new(provider.clone()))
        .with_audit(consumer_audit.clone() as Arc<dyn AuditSink>);

    let asset_id = AssetId::new(args.asset.clone())?;
    let catalog = consumer.browse_catalog().await?;
    tracing::info!(datasets = catalog.len(), "catalog fetched");

    let (negotiation, agreement) = match consumer.negotiate(asset_id).await {
        Ok(done) => done,
        Err(ConnectorError::PolicyDenied {
            negotiation_id,
            evaluation,
        }) => {
            tracing::warn!(%negotiation_id, reason = %evaluation.reason, "negotiation denied");
            return Ok(Report::failed(json!({
                "asset_id": args.asset,
                "negotiation_id": negotiation_id,
                "outcome": "denied",
                "evaluation": evaluation,
            })));
        }
        Err(err) => return Err(err.into()),
    };
    tracing::info!(agreement_id = %agreement.id, "agreement issued");

    let transfer = consumer
        .initiate_transfer(agreement.id, TransferOptions::default())
        .await?;
    let transfer_id = transfer.record.id;
    consumer.start_transfer(transfer_id).await?;
    let completed = consumer.complete_transfer(transfer_id).await?;
    let data = consumer.received_data(transfer_id)?;

    Ok(Report::ok(json!({
        "asset_id": args.asset,
        "outcome": "completed",
        "datasets": catalog.len(),
        "negotiation": {
            "id": negotiation.record.id,
            "state": negotiation.record.state,
            "history": negotiation.record.history.len(),
        },
        "agreement": agreement,
        "transfer": {
            "id": transfer_id,
            "state": completed.record.state,
        },
        "data": data,
        "audit_events": {
            "provider": provider_audit.len(),
            "consumer": consumer_audit.len(),
        },
        "provider_statistics": provider.statistics(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(asset: &str, purpose: Option<&str>) -> DemoArgs {
        DemoArgs {
            asset: asset.to_string(),
            purpose: purpose.map(str::to_string),
            partner_type: None,
        }
    }

    #[tokio::test]
    async fn test_demo_completes_for_default_identity() {
        let report = run(&args("part-catalog-2024", None)).await.unwrap();
        assert!(report.success);
        assert_eq!(report.output["outcome"], "completed");
        assert_eq!(report.output["negotiation"]["state"], "FINALIZED");
        assert_eq!(report.output["transfer"]["state"], "COMPLETED");
        assert_eq!(report.output["data"]["metadata"]["catalog_version"], "2024.4");
        assert_eq!(report.output["provider_statistics"]["agreements"], 1);
    }

    #[tokio::test]
    async fn test_demo_reports_denial() {
        let report = run(&args("quality-metrics-q4", Some("cost_reduction")))
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.output["outcome"], "denied");
        assert_eq!(report.output["evaluation"]["allowed"], false);
    }

    #[tokio::test]
    async fn test_demo_unknown_asset_is_an_error() {
        assert!(run(&args("no-such-asset", None)).await.is_err());
    }
}
