//! Wire model for `Dataset`, trimmed to the fields this emulator actually
//! needs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::DatasetReference;

/// `storageBillingModel` tag.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageBillingModel {
    StorageBillingModelUnspecified,
    #[default]
    Logical,
    Physical,
}

/// `linkState` tag for linked datasets.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkState {
    LinkStateUnspecified,
    #[default]
    Unlinked,
    Linked,
}

/// A user-defined resource tag, `{tagKey, tagValue}`.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTag {
    pub tag_key: String,
    pub tag_value: String,
}

/// The `Dataset` wire entity.
///
/// Timestamps are carried as seconds-since-epoch strings on the wire
/// (`#[serde(with = "super::from_str")]`-style fields), matching the
/// warehouse's numeric-as-string convention used throughout the wire model.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Always `"bigquery#dataset"` once constructed; set by the catalog on read.
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub etag: String,
    pub dataset_reference: DatasetReference,
    pub friendly_name: Option<String>,
    pub description: Option<String>,
    /// Decorative in the emulator; always `"US"` unless the caller set it.
    pub location: Option<String>,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub creation_time: Option<i64>,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub last_modified_time: Option<i64>,
    #[serde(default)]
    pub storage_billing_model: StorageBillingModel,
    #[serde(default)]
    pub link_state: LinkState,
    pub labels: Option<HashMap<String, String>>,
    pub resource_tags: Option<HashMap<String, String>>,
}

impl Dataset {
    /// Builds the synthetic backfill record `list_datasets` uses when an
    /// engine schema has no corresponding metadata row.
    pub fn synthetic(reference: DatasetReference, now_epoch_seconds: i64) -> Self {
        Self {
            kind: "bigquery#dataset".to_string(),
            etag: String::new(),
            dataset_reference: reference,
            friendly_name: None,
            description: None,
            location: Some("US".to_string()),
            creation_time: Some(now_epoch_seconds),
            last_modified_time: Some(now_epoch_seconds),
            storage_billing_model: StorageBillingModel::Logical,
            link_state: LinkState::Unlinked,
            labels: None,
            resource_tags: None,
        }
    }

    /// Partial merge used by `patch_dataset`: any field set on `patch`
    /// overwrites `self`; unset fields keep their current value.
    pub fn merge_patch(&mut self, patch: Dataset) {
        if patch.friendly_name.is_some() {
            self.friendly_name = patch.friendly_name;
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if patch.labels.is_some() {
            self.labels = patch.labels;
        }
        if patch.resource_tags.is_some() {
            self.resource_tags = patch.resource_tags;
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetList {
    pub kind: String,
    pub datasets: Vec<Dataset>,
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_are_omitted_not_null() {
        let dataset = Dataset {
            kind: "bigquery#dataset".into(),
            dataset_reference: DatasetReference {
                project_id: "p".into(),
                dataset_id: "d".into(),
            },
            ..Default::default()
        };
        let json = serde_json::to_value(&dataset).unwrap();
        assert!(!json.as_object().unwrap().contains_key("friendlyName"));
    }

    #[test]
    fn merge_patch_keeps_unset_fields() {
        let mut dataset = Dataset {
            friendly_name: Some("original".into()),
            description: Some("kept".into()),
            ..Default::default()
        };
        dataset.merge_patch(Dataset {
            friendly_name: Some("updated".into()),
            ..Default::default()
        });
        assert_eq!(dataset.friendly_name.as_deref(), Some("updated"));
        assert_eq!(dataset.description.as_deref(), Some("kept"));
    }
}
