use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::normalize::{normalize_kind, normalize_objekt};

/// Transaction type of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Kind {
    #[default]
    Sale,
    Rent,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Sale => "SALE",
            Kind::Rent => "RENT",
        }
    }

    /// Column holding the asking amount for this kind.
    pub fn price_column(&self) -> &'static str {
        match self {
            Kind::Sale => "price",
            Kind::Rent => "rent_per_month",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Kind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Kind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(normalize_kind(raw.as_deref()))
    }
}

/// Property category. `Alla` is the "no category" filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Objekt {
    Villa,
    ParKedjeRadhus,
    Lagenhet,
    Fritidshus,
    Tomt,
    GardSkog,
    Ovrigt,
    #[default]
    Alla,
}

impl Objekt {
    pub const ALL: [Objekt; 8] = [
        Objekt::Villa,
        Objekt::ParKedjeRadhus,
        Objekt::Lagenhet,
        Objekt::Fritidshus,
        Objekt::Tomt,
        Objekt::GardSkog,
        Objekt::Ovrigt,
        Objekt::Alla,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Objekt::Villa => "Villa",
            Objekt::ParKedjeRadhus => "Par/Kedjehus/Radhus",
            Objekt::Lagenhet => "Lägenhet",
            Objekt::Fritidshus => "Fritidshus",
            Objekt::Tomt => "Tomt",
            Objekt::GardSkog => "Gård/Skog",
            Objekt::Ovrigt => "Övrigt",
            Objekt::Alla => "Alla",
        }
    }

    pub fn is_house_type(&self) -> bool {
        matches!(
            self,
            Objekt::Villa | Objekt::ParKedjeRadhus | Objekt::Fritidshus
        )
    }
}

impl fmt::Display for Objekt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Objekt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Objekt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(normalize_objekt(raw.as_deref()))
    }
}

pub const STATUS_PUBLISHED: &str = "published";

/// Columns the owner may change through the update endpoint.
pub const UPDATABLE_COLUMNS: [&str; 34] = [
    "kind",
    "objekt",
    "upplatelseform",
    "price",
    "rent_per_month",
    "rental_period",
    "title",
    "street",
    "zip",
    "city",
    "room_count",
    "living_area_m2",
    "balcony",
    "floor",
    "elevator",
    "plot_area_m2",
    "patio",
    "va_connection",
    "building_rights",
    "association",
    "energy_class",
    "fee_per_month",
    "price_per_m2",
    "includes_electricity",
    "includes_heating",
    "includes_water",
    "includes_internet",
    "contact_first_name",
    "contact_last_name",
    "contact_phone",
    "contact_email",
    "description",
    "image_urls",
    "status",
];

/// Drops every key that is not an updatable column.
pub fn retain_updatable(payload: Map<String, Value>) -> Map<String, Value> {
    payload
        .into_iter()
        .filter(|(key, _)| UPDATABLE_COLUMNS.contains(&key.as_str()))
        .collect()
}

/// A listing row as stored by the backend.
///
/// Decoding is lenient: legacy rows carry numbers as strings, free-form
/// kind and category values and missing image arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub kind: Kind,
    #[serde(default)]
    pub objekt: Objekt,
    #[serde(default)]
    pub upplatelseform: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub city: Option<String>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub room_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub living_area_m2: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub plot_area_m2: Option<f64>,

    #[serde(default)]
    pub balcony: Option<bool>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub floor: Option<i64>,
    #[serde(default)]
    pub elevator: Option<bool>,
    #[serde(default)]
    pub patio: Option<bool>,
    #[serde(default)]
    pub va_connection: Option<bool>,
    #[serde(default)]
    pub building_rights: Option<String>,

    #[serde(default)]
    pub association: Option<String>,
    #[serde(default)]
    pub energy_class: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub price: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub rent_per_month: Option<i64>,
    #[serde(default)]
    pub rental_period: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub fee_per_month: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub price_per_m2: Option<i64>,

    #[serde(default)]
    pub includes_electricity: Option<bool>,
    #[serde(default)]
    pub includes_heating: Option<bool>,
    #[serde(default)]
    pub includes_water: Option<bool>,
    #[serde(default)]
    pub includes_internet: Option<bool>,

    #[serde(default)]
    pub contact_first_name: Option<String>,
    #[serde(default)]
    pub contact_last_name: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub image_urls: Vec<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Listing {
    /// Asking amount for the listing's kind: sale price or monthly rent.
    pub fn asking_amount(&self) -> Option<i64> {
        match self.kind {
            Kind::Sale => self.price,
            Kind::Rent => self.rent_per_month,
        }
    }
}

/// Insert payload for a new listing, produced by form validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewListing {
    pub user_id: String,
    pub kind: Kind,
    pub objekt: Objekt,
    pub upplatelseform: String,

    pub price: Option<i64>,
    pub rent_per_month: Option<i64>,
    pub rental_period: Option<String>,

    pub title: String,
    pub street: String,
    pub zip: String,
    pub city: String,

    pub room_count: Option<f64>,
    pub living_area_m2: Option<f64>,
    pub balcony: Option<bool>,
    pub floor: Option<i64>,
    pub elevator: Option<bool>,

    pub plot_area_m2: Option<f64>,
    pub patio: Option<bool>,
    pub va_connection: Option<bool>,
    pub building_rights: Option<String>,

    pub association: Option<String>,
    pub energy_class: Option<String>,
    pub fee_per_month: Option<i64>,
    pub price_per_m2: Option<i64>,

    pub includes_electricity: Option<bool>,
    pub includes_heating: Option<bool>,
    pub includes_water: Option<bool>,
    pub includes_internet: Option<bool>,

    pub contact_first_name: String,
    pub contact_last_name: String,
    pub contact_phone: String,
    pub contact_email: String,

    pub description: String,
    pub image_urls: Vec<String>,
    pub status: String,
}

/// Row id as sent by clients: uuid strings for `listings`, integers in
/// some legacy tables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Text(String),
    Number(i64),
}

impl RowId {
    /// The id as text, `None` when blank.
    pub fn into_key(self) -> Option<String> {
        match self {
            RowId::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            RowId::Number(n) => Some(n.to_string()),
        }
    }
}

/// Text form of a scalar JSON value, used to compare ids and owners.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric view of a JSON value. Strings are parsed with `,` accepted as
/// decimal separator; non-finite and negative numbers are rejected.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }?;
    if n.is_finite() && n >= 0.0 {
        Some(n)
    } else {
        None
    }
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid listing id: {other}"))),
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(value_as_f64(&Value::deserialize(deserializer)?))
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(value_as_f64(&Value::deserialize(deserializer)?).map(|n| n.round() as i64))
}

fn lenient_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    })
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        _ => None,
    })
}
