//! # Asset Catalog
//!
//! Read-only asset metadata and payloads, looked up by asset id. The
//! provider consults the catalog to resolve an asset's policy when a
//! negotiation opens and to load the payload when a transfer completes.
//!
//! [`InMemoryCatalog::sample()`] carries the three demo assets of an
//! automotive OEM. Payloads are embedded; when a data directory is
//! configured, assets with a `data_ref` are read from `<dir>/<data_ref>`
//! instead. Files are read once, when the catalog is built, so lookups
//! never touch the filesystem. A JSON `null` payload counts as no data.

use std::collections::HashMap;
use std::path::PathBuf;

use dsc_core::{AssetId, ParticipantId, PolicyKey};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Participant id of the sample provider.
pub const SAMPLE_PROVIDER_ID: &str = "provider-automotors-oem";

/// A published data asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub description: String,
    pub content_type: String,
    /// Key of the policy the asset is published under.
    pub policy_id: PolicyKey,
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// File name of the payload inside the catalog's data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_ref: Option<String>,
}

/// Lookup interface the connectors depend on.
pub trait AssetCatalog: Send + Sync {
    fn get_asset(&self, id: &AssetId) -> Option<Asset>;

    /// Every asset, in publication order.
    fn list_assets(&self) -> Vec<Asset>;

    /// The raw payload; `None` when the asset is unknown or has no data.
    fn get_asset_data(&self, id: &AssetId) -> Option<Value>;
}

/// Catalog held entirely in memory, with optional file-backed payloads.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    assets: Vec<Asset>,
    data: HashMap<AssetId, Value>,
    data_dir: Option<PathBuf>,
    /// Payloads read from `data_dir`; unreadable files have no entry.
    file_data: HashMap<AssetId, Value>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an asset, optionally with an embedded payload.
    pub fn with_asset(mut self, asset: Asset, data: Option<Value>) -> Self {
        if let Some(data) = data {
            self.data.insert(asset.id.clone(), data);
        }
        self.file_data.remove(&asset.id);
        if let Some(value) = self.read_data_file(&asset) {
            self.file_data.insert(asset.id.clone(), value);
        }
        self.assets.retain(|a| a.id != asset.id);
        self.assets.push(asset);
        self
    }

    /// Read payloads for assets with a `data_ref` from `dir`, now and for
    /// assets published afterwards.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self.file_data = self
            .assets
            .iter()
            .filter_map(|asset| Some((asset.id.clone(), self.read_data_file(asset)?)))
            .collect();
        self
    }

    /// The demo catalog: a parts catalog, quality metrics, and battery
    /// traceability data.
    pub fn sample() -> Self {
        sample_assets()
            .into_iter()
            .fold(Self::new(), |catalog, (asset, data)| catalog.with_asset(asset, Some(data)))
    }

    fn read_data_file(&self, asset: &Asset) -> Option<Value> {
        let path = self.data_dir.as_ref()?.join(asset.data_ref.as_ref()?);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(asset = %asset.id, path = %path.display(), error = %e, "asset data file unreadable");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(asset = %asset.id, path = %path.display(), error = %e, "asset data file is not valid JSON");
                None
            }
        }
    }
}

impl AssetCatalog for InMemoryCatalog {
    fn get_asset(&self, id: &AssetId) -> Option<Asset> {
        self.assets.iter().find(|a| &a.id == id).cloned()
    }

    fn list_assets(&self) -> Vec<Asset> {
        self.assets.clone()
    }

    fn get_asset_data(&self, id: &AssetId) -> Option<Value> {
        let asset = self.assets.iter().find(|a| &a.id == id)?;
        let data = if self.data_dir.is_some() && asset.data_ref.is_some() {
            self.file_data.get(id)
        } else {
            self.data.get(id)
        };
        data.filter(|v| !v.is_null()).cloned()
    }
}

/// First-level summary of a payload: nested objects and arrays are replaced
/// by their size, `metadata` is passed through unchanged.
pub fn preview(data: &Value) -> Value {
    let Some(object) = data.as_object() else {
        return Value::Object(Map::new());
    };
    let summary = object
        .iter()
        .map(|(key, value)| {
            let shown = match value {
                _ if key == "metadata" => value.clone(),
                Value::Object(inner) => Value::String(format!("<object with {} keys>", inner.len())),
                Value::Array(items) => Value::String(format!("<array with {} items>", items.len())),
                other => other.clone(),
            };
            (key.clone(), shown)
        })
        .collect();
    Value::Object(summary)
}

// -- Sample assets ------------------------------------------------------------

fn properties(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn sample_assets() -> Vec<(Asset, Value)> {
    vec![
        (
            Asset {
                id: AssetId::from_static("part-catalog-2024"),
                name: "2024 Vehicle Part Catalog".into(),
                description: "Complete parts catalog for 2024 model year electric vehicles \
                              including powertrain, battery, and chassis components."
                    .into(),
                content_type: "application/json".into(),
                policy_id: PolicyKey::from_static("tier1-only"),
                properties: properties(json!({
                    "automotive:dataCategory": "parts-master",
                    "automotive:vehicleModels": ["EV-Sport", "EV-Sedan", "EV-SUV"],
                    "automotive:partCount": 15420,
                    "automotive:lastUpdated": "2024-12-01",
                    "automotive:confidentiality": "internal"
                })),
                data_ref: Some("part-catalog.json".into()),
            },
            json!({
                "metadata": {
                    "catalog_version": "2024.4",
                    "manufacturer": "AutoMotors OEM",
                    "generated": "2024-12-01"
                },
                "categories": {
                    "powertrain": 4210,
                    "battery": 1875,
                    "chassis": 9335
                },
                "parts": [
                    {"part_number": "PT-2024-0001", "name": "Drive Motor Assembly", "category": "powertrain", "models": ["EV-Sport", "EV-Sedan"]},
                    {"part_number": "BT-2024-0113", "name": "Battery Module 48V", "category": "battery", "models": ["EV-SUV"]},
                    {"part_number": "CH-2024-0420", "name": "Front Subframe", "category": "chassis", "models": ["EV-Sedan", "EV-SUV"]}
                ]
            }),
        ),
        (
            Asset {
                id: AssetId::from_static("quality-metrics-q4"),
                name: "Q4 2024 Quality Metrics".into(),
                description: "Supplier quality performance data for Q4 2024, including PPM \
                              rates, delivery performance, and corrective actions."
                    .into(),
                content_type: "application/json".into(),
                policy_id: PolicyKey::from_static("quality-data"),
                properties: properties(json!({
                    "automotive:dataCategory": "quality",
                    "automotive:reportingPeriod": "2024-Q4",
                    "automotive:confidentiality": "restricted",
                    "automotive:suppliers": ["TierOne Electronics", "BatteryCell Corp", "DriveSystem Parts", "SuspensionTech"]
                })),
                data_ref: Some("quality-data.json".into()),
            },
            json!({
                "metadata": {
                    "reporting_period": "2024-Q4",
                    "currency": "EUR"
                },
                "suppliers": [
                    {"name": "TierOne Electronics", "ppm": 12, "on_time_delivery": 0.987, "open_corrective_actions": 1},
                    {"name": "BatteryCell Corp", "ppm": 31, "on_time_delivery": 0.954, "open_corrective_actions": 3},
                    {"name": "DriveSystem Parts", "ppm": 8, "on_time_delivery": 0.991, "open_corrective_actions": 0},
                    {"name": "SuspensionTech", "ppm": 19, "on_time_delivery": 0.972, "open_corrective_actions": 2}
                ],
                "summary": {
                    "average_ppm": 17.5,
                    "target_ppm": 20
                }
            }),
        ),
        (
            Asset {
                id: AssetId::from_static("traceability-batch-001"),
                name: "Battery Traceability Data".into(),
                description: "Complete traceability data for battery components including raw \
                              material origins, manufacturing data, and carbon footprint."
                    .into(),
                content_type: "application/json".into(),
                policy_id: PolicyKey::from_static("certified-partners"),
                properties: properties(json!({
                    "automotive:dataCategory": "traceability",
                    "automotive:componentType": "battery",
                    "automotive:regulatoryCompliance": ["EU-Battery-Regulation-2023", "UN38.3"],
                    "automotive:carbonFootprint": true
                })),
                data_ref: Some("traceability-data.json".into()),
            },
            json!({
                "metadata": {
                    "batch_id": "BATCH-2024-001",
                    "cell_chemistry": "NMC811"
                },
                "raw_materials": [
                    {"material": "lithium", "origin": "Chile", "certified": true},
                    {"material": "cobalt", "origin": "Australia", "certified": true},
                    {"material": "nickel", "origin": "Finland", "certified": true}
                ],
                "manufacturing": {
                    "plant": "Cell Plant Nord",
                    "line": "L3",
                    "completed": "2024-11-18"
                },
                "carbon_footprint_kg_co2e_per_kwh": 61.2
            }),
        ),
    ]
}

/// Participant id of the sample provider.
pub fn sample_provider_id() -> ParticipantId {
    ParticipantId::from_static(SAMPLE_PROVIDER_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_catalog_has_three_assets_in_order() {
        let catalog = InMemoryCatalog::sample();
        let ids: Vec<String> = catalog.list_assets().iter().map(|a| a.id.to_string()).collect();
        assert_eq!(
            ids,
            vec!["part-catalog-2024", "quality-metrics-q4", "traceability-batch-001"]
        );
    }

    #[test]
    fn test_sample_policies() {
        let catalog = InMemoryCatalog::sample();
        let quality = catalog.get_asset(&AssetId::from_static("quality-metrics-q4")).unwrap();
        assert_eq!(quality.policy_id.as_str(), "quality-data");
        assert!(catalog.get_asset(&AssetId::from_static("missing")).is_none());
    }

    #[test]
    fn test_embedded_payloads() {
        let catalog = InMemoryCatalog::sample();
        let data = catalog
            .get_asset_data(&AssetId::from_static("part-catalog-2024"))
            .unwrap();
        assert_eq!(data["metadata"]["catalog_version"], "2024.4");
    }

    #[test]
    fn test_asset_without_payload_has_no_data() {
        let asset = Asset {
            id: AssetId::from_static("empty"),
            name: "Empty".into(),
            description: String::new(),
            content_type: "application/json".into(),
            policy_id: PolicyKey::from_static("open-access"),
            properties: Map::new(),
            data_ref: None,
        };
        let catalog = InMemoryCatalog::new().with_asset(asset, None);
        assert!(catalog.get_asset(&AssetId::from_static("empty")).is_some());
        assert!(catalog.get_asset_data(&AssetId::from_static("empty")).is_none());
    }

    #[test]
    fn test_data_dir_overrides_embedded_payload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quality-data.json"), r#"{"from_file": true}"#).unwrap();
        let catalog = InMemoryCatalog::sample().with_data_dir(dir.path());

        let quality = catalog
            .get_asset_data(&AssetId::from_static("quality-metrics-q4"))
            .unwrap();
        assert_eq!(quality, json!({"from_file": true}));

        // No file on disk for this one.
        assert!(catalog
            .get_asset_data(&AssetId::from_static("part-catalog-2024"))
            .is_none());
    }

    #[test]
    fn test_data_dir_payload_survives_file_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quality-data.json");
        std::fs::write(&path, r#"{"from_file": true}"#).unwrap();
        let catalog = InMemoryCatalog::sample().with_data_dir(dir.path());
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            catalog.get_asset_data(&AssetId::from_static("quality-metrics-q4")),
            Some(json!({"from_file": true}))
        );
    }

    #[test]
    fn test_asset_published_after_data_dir_reads_its_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("late.json"), r#"{"late": 1}"#).unwrap();
        let asset = Asset {
            id: AssetId::from_static("late"),
            name: "Late".into(),
            description: String::new(),
            content_type: "application/json".into(),
            policy_id: PolicyKey::from_static("open-access"),
            properties: Map::new(),
            data_ref: Some("late.json".into()),
        };
        let catalog = InMemoryCatalog::new()
            .with_data_dir(dir.path())
            .with_asset(asset, None);
        assert_eq!(
            catalog.get_asset_data(&AssetId::from_static("late")),
            Some(json!({"late": 1}))
        );
    }

    #[test]
    fn test_null_payload_counts_as_no_data() {
        let asset = Asset {
            id: AssetId::from_static("null-data"),
            name: "Null".into(),
            description: String::new(),
            content_type: "application/json".into(),
            policy_id: PolicyKey::from_static("open-access"),
            properties: Map::new(),
            data_ref: None,
        };
        let catalog = InMemoryCatalog::new().with_asset(asset, Some(Value::Null));
        assert!(catalog.get_asset_data(&AssetId::from_static("null-data")).is_none());

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quality-data.json"), "null").unwrap();
        let catalog = InMemoryCatalog::sample().with_data_dir(dir.path());
        assert!(catalog
            .get_asset_data(&AssetId::from_static("quality-metrics-q4"))
            .is_none());
    }

    #[test]
    fn test_invalid_json_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part-catalog.json"), "not json").unwrap();
        let catalog = InMemoryCatalog::sample().with_data_dir(dir.path());
        assert!(catalog
            .get_asset_data(&AssetId::from_static("part-catalog-2024"))
            .is_none());
    }

    #[test]
    fn test_preview_summarizes_nested_values() {
        let data = json!({
            "metadata": {"version": 1},
            "parts": [1, 2, 3],
            "categories": {"a": 1, "b": 2},
            "count": 7
        });
        let p = preview(&data);
        assert_eq!(p["metadata"], json!({"version": 1}));
        assert_eq!(p["parts"], "<array with 3 items>");
        assert_eq!(p["categories"], "<object with 2 keys>");
        assert_eq!(p["count"], 7);
    }

    #[test]
    fn test_preview_of_non_object_is_empty() {
        assert_eq!(preview(&json!([1, 2])), json!({}));
    }
}
