use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Normal,
    Pro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum City {
    Paris,
    Cologne,
    Brussels,
    Amsterdam,
    Hamburg,
    Dusseldorf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferType {
    Apartment,
    House,
    Room,
    Hotel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Breakfast,
    #[serde(rename = "Air conditioning")]
    AirConditioning,
    #[serde(rename = "Laptop friendly workspace")]
    LaptopFriendlyWorkspace,
    #[serde(rename = "Baby seat")]
    BabySeat,
    Washer,
    Towels,
    Fridge,
    #[serde(rename = "Wi-Fi")]
    WiFi,
    Kitchen,
    #[serde(rename = "Washing machine")]
    WashingMachine,
    Heating,
    Parking,
    Balcony,
    #[serde(rename = "TV")]
    Tv,
    Dishwasher,
    Microwave,
    #[serde(rename = "Shared kitchen")]
    SharedKitchen,
    Iron,
}

/// Error for a string that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UserType {
    pub const ALL: [UserType; 2] = [UserType::Normal, UserType::Pro];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Normal => "normal",
            UserType::Pro => "pro",
        }
    }

    pub fn is_pro(&self) -> bool {
        *self == UserType::Pro
    }
}

impl City {
    pub const ALL: [City; 6] = [
        City::Paris,
        City::Cologne,
        City::Brussels,
        City::Amsterdam,
        City::Hamburg,
        City::Dusseldorf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            City::Paris => "Paris",
            City::Cologne => "Cologne",
            City::Brussels => "Brussels",
            City::Amsterdam => "Amsterdam",
            City::Hamburg => "Hamburg",
            City::Dusseldorf => "Dusseldorf",
        }
    }

    /// Map centre used when rendering the city on the client.
    pub fn center(&self) -> (f64, f64) {
        match self {
            City::Paris => (48.85661, 2.351499),
            City::Cologne => (50.938361, 6.959974),
            City::Brussels => (50.846557, 4.351697),
            City::Amsterdam => (52.37454, 4.897976),
            City::Hamburg => (53.550341, 10.000654),
            City::Dusseldorf => (51.225402, 6.776314),
        }
    }
}

impl OfferType {
    pub const ALL: [OfferType; 4] = [
        OfferType::Apartment,
        OfferType::House,
        OfferType::Room,
        OfferType::Hotel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferType::Apartment => "apartment",
            OfferType::House => "house",
            OfferType::Room => "room",
            OfferType::Hotel => "hotel",
        }
    }
}

impl Feature {
    pub const ALL: [Feature; 18] = [
        Feature::Breakfast,
        Feature::AirConditioning,
        Feature::LaptopFriendlyWorkspace,
        Feature::BabySeat,
        Feature::Washer,
        Feature::Towels,
        Feature::Fridge,
        Feature::WiFi,
        Feature::Kitchen,
        Feature::WashingMachine,
        Feature::Heating,
        Feature::Parking,
        Feature::Balcony,
        Feature::Tv,
        Feature::Dishwasher,
        Feature::Microwave,
        Feature::SharedKitchen,
        Feature::Iron,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Breakfast => "Breakfast",
            Feature::AirConditioning => "Air conditioning",
            Feature::LaptopFriendlyWorkspace => "Laptop friendly workspace",
            Feature::BabySeat => "Baby seat",
            Feature::Washer => "Washer",
            Feature::Towels => "Towels",
            Feature::Fridge => "Fridge",
            Feature::WiFi => "Wi-Fi",
            Feature::Kitchen => "Kitchen",
            Feature::WashingMachine => "Washing machine",
            Feature::Heating => "Heating",
            Feature::Parking => "Parking",
            Feature::Balcony => "Balcony",
            Feature::Tv => "TV",
            Feature::Dishwasher => "Dishwasher",
            Feature::Microwave => "Microwave",
            Feature::SharedKitchen => "Shared kitchen",
            Feature::Iron => "Iron",
        }
    }
}

// String conversions shared by the enums above. `FromStr` looks the value up
// in `ALL`; SQLite stores the `as_str` form.
macro_rules! text_enum {
    ($ty:ident, $kind:literal) => {
        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: UnknownVariant| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(UserType, "user type");
text_enum!(City, "city");
text_enum!(OfferType, "offer type");
text_enum!(Feature, "feature");

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub user_type: UserType,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a user shown next to offers and reviews.
#[derive(Debug, Clone)]
pub struct Author {
    pub id: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub user_type: UserType,
}

#[derive(Debug, Clone)]
pub struct Offer {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub publish_date: DateTime<Utc>,
    pub city: City,
    pub preview_image: String,
    pub photos: Vec<String>,
    pub is_premium: bool,
    pub rating: f64,
    pub offer_type: OfferType,
    pub rooms: i64,
    pub guests: i64,
    pub price: i64,
    pub features: Vec<Feature>,
    pub latitude: f64,
    pub longitude: f64,
    pub author_id: i64,
    pub comments_count: i64,
}

#[derive(Debug, Clone)]
pub struct OfferWithAuthor {
    pub offer: Offer,
    pub author: Author,
}

#[derive(Debug, Clone)]
pub struct Review {
    pub id: i64,
    pub text: String,
    pub rating: i64,
    pub publish_date: DateTime<Utc>,
    pub author_id: i64,
    pub offer_id: i64,
}

#[derive(Debug, Clone)]
pub struct ReviewWithAuthor {
    pub review: Review,
    pub author: Author,
}

#[derive(Debug, Clone)]
pub struct Favorite {
    pub user_id: i64,
    pub offer_id: i64,
    pub created_at: DateTime<Utc>,
}

// --- Insert payloads ---

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub user_type: UserType,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOffer {
    pub title: String,
    pub description: String,
    pub city: City,
    pub preview_image: String,
    pub photos: Vec<String>,
    pub is_premium: bool,
    pub rating: f64,
    pub offer_type: OfferType,
    pub rooms: i64,
    pub guests: i64,
    pub price: i64,
    pub features: Vec<Feature>,
    pub latitude: f64,
    pub longitude: f64,
}
