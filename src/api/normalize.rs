//! Canonical record normalization.
//!
//! Maps loosely-shaped backend records onto the domain types in
//! [`super::types`]. Normalization is total: absent or malformed input
//! fields resolve to documented defaults and never fail.

use serde_json::Value;

use super::api_types::{decode_record, ApiArticle, ApiNamed, ApiProperty, ApiPropertyImage};
use super::types::{
  Article, ArticleStatus, Property, PropertyStatus, PropertyType, TransactionKind,
};

/// Shown when a listing has no images at all.
pub const PLACEHOLDER_IMAGE: &str = "https://images.unsplash.com/photo-1560518883-ce09059eeffa?w=800";

/// Used when the backend label is missing or not in [`PROPERTY_TYPE_LABELS`].
pub const DEFAULT_PROPERTY_TYPE: PropertyType = PropertyType::Apartment;

pub const DEFAULT_ARTICLE_CATEGORY: &str = "general";

/// Backend property-type labels and the domain type each maps to.
pub const PROPERTY_TYPE_LABELS: &[(&str, PropertyType)] = &[
  ("Studio", PropertyType::Apartment),
  ("Apparts", PropertyType::Apartment),
  ("Maisons", PropertyType::House),
  ("Villa", PropertyType::Villa),
  ("Terrain", PropertyType::Land),
  ("Bureau", PropertyType::Office),
  ("Entrepôt", PropertyType::Warehouse),
  ("Local commercial", PropertyType::Commercial),
  ("Salle de fête", PropertyType::PartyHall),
  ("Salle funéraire", PropertyType::FuneralHall),
  ("Lieu de vacance", PropertyType::VacationRental),
  ("Hôtel", PropertyType::Hotel),
];

/// Feature synonyms. Names not listed pass through lower-cased.
const FEATURE_SYNONYMS: &[(&str, &str)] = &[
  ("wifi", "internet"),
  ("cuisine équipé", "cuisine équipée"),
];

/// Backend label for a sale; every other transaction label means rent.
const SALE_LABEL: &str = "vente";

pub fn map_property_type(label: Option<&str>) -> PropertyType {
  label
    .and_then(|label| {
      PROPERTY_TYPE_LABELS
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, kind)| *kind)
    })
    .unwrap_or(DEFAULT_PROPERTY_TYPE)
}

pub fn map_transaction_kind(label: Option<&str>) -> TransactionKind {
  match label {
    Some(SALE_LABEL) => TransactionKind::ForSale,
    _ => TransactionKind::ForRent,
  }
}

pub fn map_article_status(label: Option<&str>) -> ArticleStatus {
  match label.map(str::to_ascii_lowercase).as_deref() {
    Some("published") => ArticleStatus::Published,
    Some("archived") => ArticleStatus::Archived,
    _ => ArticleStatus::Draft,
  }
}

/// The first non-empty of a denormalized value and a relational name.
fn prefer_value(value: Option<String>, relation: Option<String>) -> Option<String> {
  value
    .filter(|v| !v.is_empty())
    .or(relation)
    .filter(|v| !v.is_empty())
}

fn relation_name(named: Option<ApiNamed>) -> Option<String> {
  named.and_then(|n| n.name)
}

fn build_location(api: &mut ApiProperty) -> String {
  let city = api.city.take();
  let (city_name, country_name) = match city {
    Some(city) => (city.name, relation_name(city.country)),
    None => (None, None),
  };

  [
    api.address.take().filter(|a| !a.is_empty()),
    prefer_value(api.quartier_value.take(), relation_name(api.quartier.take())),
    prefer_value(api.commune_value.take(), relation_name(api.commune.take())),
    prefer_value(api.city_value.take(), city_name),
    prefer_value(api.country_value.take(), country_name),
  ]
  .into_iter()
  .flatten()
  .collect::<Vec<_>>()
  .join(", ")
}

fn collect_images(api: &mut ApiProperty) -> Vec<String> {
  let groups: [Vec<ApiPropertyImage>; 4] = [
    std::mem::take(&mut api.property_image),
    std::mem::take(&mut api.property_image_living_room),
    std::mem::take(&mut api.property_image_room),
    std::mem::take(&mut api.property_image_kitchen),
  ];

  let images: Vec<String> = groups
    .into_iter()
    .flatten()
    .filter_map(|image| image.path)
    .filter(|path| !path.is_empty())
    .collect();

  if images.is_empty() {
    vec![PLACEHOLDER_IMAGE.to_string()]
  } else {
    images
  }
}

fn normalize_feature(name: String) -> String {
  let lower = name.to_lowercase();
  FEATURE_SYNONYMS
    .iter()
    .find(|(from, _)| *from == lower)
    .map(|(_, to)| to.to_string())
    .unwrap_or(lower)
}

/// Zero counts are treated as "not specified".
fn non_zero(n: Option<u32>) -> Option<u32> {
  n.filter(|n| *n != 0)
}

impl ApiProperty {
  pub fn into_property(mut self) -> Property {
    let location = build_location(&mut self);
    let images = collect_images(&mut self);
    let kind = map_property_type(self.property_type.and_then(|t| t.name).as_deref());
    let category = map_transaction_kind(self.transaction_type.as_deref());

    Property {
      id: self.property_id.unwrap_or_default(),
      title: self.title.unwrap_or_default(),
      description: self.description.unwrap_or_default(),
      price: self.price.unwrap_or_default(),
      location,
      kind,
      group: kind.group(),
      bedrooms: non_zero(self.bedrooms),
      bathrooms: non_zero(self.bathroom),
      rooms: non_zero(self.rooms),
      floor: self.floor.filter(|f| *f != 0),
      area: self.surface.unwrap_or_default(),
      images,
      features: self
        .features
        .into_iter()
        .filter_map(|f| f.name)
        .map(normalize_feature)
        .collect(),
      status: PropertyStatus::derive(category, self.sold.unwrap_or(false)),
      category,
      available: self.available.unwrap_or(true),
      created_at: self.created_at,
      updated_at: self.updated_at,
    }
  }
}

impl ApiArticle {
  pub fn into_article(self) -> Article {
    Article {
      id: self.id.unwrap_or_default(),
      title: self.title.unwrap_or_default(),
      summary: self.summary.unwrap_or_default(),
      content: self.content.unwrap_or_default(),
      learning_points: self.learning_points,
      key_points: self.key_points,
      image: self.image.filter(|s| !s.is_empty()),
      category: self
        .category
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_ARTICLE_CATEGORY.to_string()),
      author: self.author,
      author_photo: self.author_photo.filter(|s| !s.is_empty()),
      publish_date: self.publish_date,
      read_time: self.read_time.unwrap_or_default(),
      views: self.views.unwrap_or_default(),
      tags: self.tags,
      featured: self.featured.unwrap_or(false),
      status: map_article_status(self.status.as_deref()),
      created_at: self.created_at,
      updated_at: self.updated_at,
    }
  }
}

impl Property {
  /// Normalize any backend property record. Never fails.
  pub fn normalize(raw: &Value) -> Self {
    let mut api: ApiProperty = decode_record(raw);
    if api.property_id.is_none() {
      api.property_id = raw.get("id").and_then(Value::as_u64);
    }
    api.into_property()
  }
}

impl Article {
  /// Normalize any backend article record. Never fails.
  pub fn normalize(raw: &Value) -> Self {
    decode_record::<ApiArticle>(raw).into_article()
  }
}
