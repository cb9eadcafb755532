//! Serde-deserializable types matching backend responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs. Every field is
//! decoded leniently: missing, null or mistyped values become `None` (or an
//! empty list) instead of failing the whole record.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

/// Decode a field, turning any type mismatch into `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned,
{
  let value = Value::deserialize(deserializer)?;
  Ok(serde_json::from_value(value).ok())
}

/// Decode a list field, dropping elements that don't match and treating
/// a non-array as empty.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned,
{
  let value = Value::deserialize(deserializer)?;
  Ok(match value {
    Value::Array(items) => items
      .into_iter()
      .filter_map(|item| serde_json::from_value(item).ok())
      .collect(),
    _ => Vec::new(),
  })
}

/// Decode a raw record, falling back to all-defaults when `raw` is not an object.
pub fn decode_record<T: DeserializeOwned + Default>(raw: &Value) -> T {
  if !raw.is_object() {
    return T::default();
  }
  T::deserialize(raw).unwrap_or_default()
}

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiNamed {
  #[serde(default, deserialize_with = "lenient")]
  pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiCity {
  #[serde(default, deserialize_with = "lenient")]
  pub name: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub country: Option<ApiNamed>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiPropertyImage {
  #[serde(default, deserialize_with = "lenient")]
  pub path: Option<String>,
}

// ============================================================================
// Property
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProperty {
  #[serde(default, deserialize_with = "lenient")]
  pub property_id: Option<u64>,
  #[serde(default, deserialize_with = "lenient")]
  pub title: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub description: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub price: Option<f64>,
  #[serde(default, deserialize_with = "lenient")]
  pub surface: Option<f64>,
  #[serde(default, deserialize_with = "lenient")]
  pub rooms: Option<u32>,
  #[serde(default, deserialize_with = "lenient")]
  pub bedrooms: Option<u32>,
  #[serde(default, deserialize_with = "lenient")]
  pub bathroom: Option<u32>,
  #[serde(default, deserialize_with = "lenient")]
  pub floor: Option<i32>,
  #[serde(default, deserialize_with = "lenient")]
  pub address: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub city: Option<ApiCity>,
  #[serde(default, deserialize_with = "lenient")]
  pub quartier: Option<ApiNamed>,
  #[serde(default, deserialize_with = "lenient")]
  pub commune: Option<ApiNamed>,
  #[serde(default, deserialize_with = "lenient")]
  pub city_value: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub quartier_value: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub commune_value: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub country_value: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub sold: Option<bool>,
  #[serde(default, deserialize_with = "lenient")]
  pub transaction_type: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub property_type: Option<ApiNamed>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub features: Vec<ApiNamed>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub property_image: Vec<ApiPropertyImage>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub property_image_living_room: Vec<ApiPropertyImage>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub property_image_room: Vec<ApiPropertyImage>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub property_image_kitchen: Vec<ApiPropertyImage>,
  #[serde(default, deserialize_with = "lenient")]
  pub available: Option<bool>,
  #[serde(default, deserialize_with = "lenient")]
  pub created_at: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub updated_at: Option<String>,
}

/// `GET /api/property` response: a pageable wrapper around the records.
#[derive(Debug, Default, Deserialize)]
pub struct ApiPropertyPage {
  #[serde(default, deserialize_with = "lenient_list")]
  pub content: Vec<Value>,
  #[serde(rename = "totalElements", default, deserialize_with = "lenient")]
  pub total_elements: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPropertiesResponse {
  pub properties: ApiPropertyPage,
}

// ============================================================================
// Article ("actuality")
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiArticle {
  #[serde(default, deserialize_with = "lenient")]
  pub id: Option<u64>,
  #[serde(default, deserialize_with = "lenient")]
  pub title: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub summary: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub content: Option<String>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub learning_points: Vec<String>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub key_points: Vec<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub image: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub category: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub author: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub author_photo: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub publish_date: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub read_time: Option<u32>,
  #[serde(default, deserialize_with = "lenient")]
  pub views: Option<u64>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub tags: Vec<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub featured: Option<bool>,
  #[serde(default, deserialize_with = "lenient")]
  pub status: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub created_at: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub updated_at: Option<String>,
}

// ============================================================================
// Envelopes
// ============================================================================

/// `{ success, data, message }` wrapper used by the article and reference endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ApiEnvelope {
  #[serde(default, deserialize_with = "lenient")]
  pub success: Option<bool>,
  #[serde(default)]
  pub data: Option<Value>,
  #[serde(default, deserialize_with = "lenient")]
  pub message: Option<String>,
}
