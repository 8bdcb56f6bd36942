use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// Marketing contact record.
///
/// `custom_fields` is merged into the serialized record *after* the named
/// fields, so a custom key such as `"email"` or `"first_name"` overrides the
/// corresponding field. SendGrid receives whatever wins that merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contact {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub custom_fields: Map<String, Value>,
}

impl Contact {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    /// Flattened record as sent to SendGrid
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("email".to_string(), Value::String(self.email.clone()));
        if let Some(first_name) = &self.first_name {
            record.insert("first_name".to_string(), Value::String(first_name.clone()));
        }
        if let Some(last_name) = &self.last_name {
            record.insert("last_name".to_string(), Value::String(last_name.clone()));
        }
        for (key, value) in &self.custom_fields {
            record.insert(key.clone(), value.clone());
        }
        record
    }
}

impl Serialize for Contact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = self.to_record();
        let mut map = serializer.serialize_map(Some(record.len()))?;
        for (key, value) in &record {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Body of `PUT /marketing/contacts`
#[derive(Debug, Clone, serde::Serialize)]
pub struct UpsertContactsRequest {
    pub contacts: Vec<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_ids: Option<Vec<String>>,
}
