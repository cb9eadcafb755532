use serde::{Deserialize, Serialize};

/// Entry of a small lookup table (e.g. account types)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntity {
  #[serde(alias = "typeAccountId")]
  pub id: u64,
  #[serde(default)]
  pub name: String,
}

/// Kind of property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
  House,
  Apartment,
  Villa,
  Land,
  Commercial,
  Office,
  Warehouse,
  PartyHall,
  FuneralHall,
  VacationRental,
  Hotel,
}

impl PropertyType {
  /// Broad grouping used for filtering.
  pub fn group(self) -> PropertyGroup {
    match self {
      PropertyType::House | PropertyType::Apartment | PropertyType::Villa => {
        PropertyGroup::Residential
      }
      PropertyType::Land => PropertyGroup::Land,
      PropertyType::Commercial | PropertyType::Office | PropertyType::Warehouse => {
        PropertyGroup::Commercial
      }
      PropertyType::PartyHall | PropertyType::FuneralHall => PropertyGroup::Event,
      PropertyType::VacationRental | PropertyType::Hotel => PropertyGroup::Hospitality,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyGroup {
  Residential,
  Commercial,
  Event,
  Hospitality,
  Land,
}

/// Whether a listing is offered for sale or for rent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
  ForSale,
  ForRent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyStatus {
  ForSale,
  ForRent,
  Sold,
  Rented,
}

impl PropertyStatus {
  /// Combine the transaction kind with the "already completed" flag.
  pub fn derive(kind: TransactionKind, completed: bool) -> Self {
    match (kind, completed) {
      (TransactionKind::ForSale, false) => PropertyStatus::ForSale,
      (TransactionKind::ForRent, false) => PropertyStatus::ForRent,
      (TransactionKind::ForSale, true) => PropertyStatus::Sold,
      (TransactionKind::ForRent, true) => PropertyStatus::Rented,
    }
  }
}

/// Normalized property listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
  pub id: u64,
  pub title: String,
  pub description: String,
  pub price: f64,
  pub location: String,
  #[serde(rename = "type")]
  pub kind: PropertyType,
  pub group: PropertyGroup,
  pub bedrooms: Option<u32>,
  pub bathrooms: Option<u32>,
  pub rooms: Option<u32>,
  pub floor: Option<i32>,
  /// Surface in m²
  pub area: f64,
  pub images: Vec<String>,
  pub features: Vec<String>,
  pub status: PropertyStatus,
  pub category: TransactionKind,
  pub available: bool,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
  Draft,
  Published,
  Archived,
}

/// Normalized news article
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
  pub id: u64,
  pub title: String,
  pub summary: String,
  pub content: String,
  pub learning_points: Vec<String>,
  pub key_points: Vec<String>,
  pub image: Option<String>,
  pub category: String,
  pub author: Option<String>,
  pub author_photo: Option<String>,
  pub publish_date: Option<String>,
  /// Minutes
  pub read_time: u32,
  pub views: u64,
  pub tags: Vec<String>,
  pub featured: bool,
  pub status: ArticleStatus,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}
