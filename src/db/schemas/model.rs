//! Model document schema
//!
//! Metadata describing a trainable model. Training itself happens elsewhere;
//! the server only records what a model is and which dataset it uses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::schemas::Metadata;
use crate::db::store::{IndexSpec, MutMetadata, Record};

/// Collection name for models
pub const MODEL_COLLECTION: &str = "models";

/// Kind of model
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Classifier,
    #[default]
    Regressor,
}

impl ModelType {
    /// Only the exact literal `classifier` selects a classifier; anything else is a regressor
    pub fn normalize(raw: Option<&Value>) -> Self {
        match raw {
            Some(Value::String(s)) if s == "classifier" => Self::Classifier,
            _ => Self::Regressor,
        }
    }
}

/// Model document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscipleModel {
    /// Store-assigned record id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "type", default)]
    pub model_type: ModelType,

    /// Identifier of the dataset record this model trains on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,

    #[serde(flatten)]
    pub metadata: Metadata,
}

impl DiscipleModel {
    /// Build a new record from admin input
    pub fn from_input(input: &ModelInput) -> Self {
        Self {
            id: None,
            name: input.name.clone(),
            description: input.description.clone(),
            model_type: ModelType::normalize(input.model_type.as_ref()),
            dataset: input.dataset_ref(),
            metadata: Metadata::default(),
        }
    }

    /// Shallow merge: every field present in the input overwrites the stored one
    pub fn merge(&mut self, input: &ModelInput) {
        if let Some(name) = &input.name {
            self.name = Some(name.clone());
        }
        if let Some(description) = &input.description {
            self.description = Some(description.clone());
        }
        if input.model_type.is_some() {
            self.model_type = ModelType::normalize(input.model_type.as_ref());
        }
        if input.dataset.is_some() {
            self.dataset = input.dataset_ref();
        }
    }
}

impl Record for DiscipleModel {
    const COLLECTION: &'static str = MODEL_COLLECTION;

    const FIELDS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "type",
        "dataset",
        "createdAt",
        "updatedAt",
    ];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn into_indices() -> Vec<IndexSpec> {
        vec![IndexSpec::plain("name"), IndexSpec::plain("dataset")]
    }
}

impl MutMetadata for DiscipleModel {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Payload of the `model` admin command
///
/// `id` selects the record to update; the other fields are the values to write.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelInput {
    #[serde(default)]
    pub id: Option<Value>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Raw type; normalized with [`ModelType::normalize`]
    #[serde(rename = "type", default)]
    pub model_type: Option<Value>,

    /// Dataset reference, accepted as a string or a number
    #[serde(default)]
    pub dataset: Option<Value>,
}

impl ModelInput {
    /// The id to match, as the store represents ids
    pub fn id_ref(&self) -> Option<String> {
        self.id.as_ref().and_then(scalar_to_string)
    }

    fn dataset_ref(&self) -> Option<String> {
        self.dataset.as_ref().and_then(scalar_to_string)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
