//! Client-facing JSON views.
//!
//! Stored rows use integer ids, server-relative media paths and `user_type`
//! strings; the client wants string ids, absolute URLs, `isPro` flags and one
//! date format. Everything here is pure.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use url::Url;

use crate::db::models::{
    Author, City, Feature, Offer, OfferType, OfferWithAuthor, ReviewWithAuthor, User,
};
use crate::uploads::DEFAULT_AVATAR;

const CITY_ZOOM: u8 = 13;
const OFFER_ZOOM: u8 = 16;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityView {
    pub name: &'static str,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPreview {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub offer_type: OfferType,
    pub price: i64,
    pub city: CityView,
    pub location: Location,
    pub is_favorite: bool,
    pub is_premium: bool,
    pub rating: f64,
    pub preview_image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub avatar_url: String,
    pub is_pro: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullOffer {
    #[serde(flatten)]
    pub preview: OfferPreview,
    pub description: String,
    pub bedrooms: i64,
    pub goods: Vec<Feature>,
    pub host: UserSummary,
    pub images: Vec<String>,
    pub max_adults: i64,
    pub comments_count: i64,
    pub publish_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewView {
    pub id: String,
    pub comment: String,
    pub rating: f64,
    pub date: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub avatar_url: String,
    pub is_pro: bool,
    pub created_at: String,
    pub updated_at: String,
    pub has_custom_avatar: bool,
}

/// RFC 3339 in UTC with milliseconds, e.g. `2024-05-01T12:00:00.000Z`.
pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn city_view(city: City) -> CityView {
    let (latitude, longitude) = city.center();
    CityView {
        name: city.as_str(),
        location: Location {
            latitude,
            longitude,
            zoom: CITY_ZOOM,
        },
    }
}

/// Builds views, resolving media paths against the public base URL.
#[derive(Debug, Clone)]
pub struct Presenter {
    base: String,
}

impl Presenter {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(base_url)?;
        Ok(Self {
            base: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL for a stored media path. Absolute inputs pass through.
    pub fn media_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base, path)
        } else {
            format!("{}/{}", self.base, path)
        }
    }

    fn avatar_url(&self, avatar: Option<&str>) -> String {
        self.media_url(avatar.unwrap_or(DEFAULT_AVATAR))
    }

    pub fn user_summary(&self, author: &Author) -> UserSummary {
        UserSummary {
            id: author.id,
            name: author.username.clone(),
            avatar_url: self.avatar_url(author.avatar.as_deref()),
            is_pro: author.user_type.is_pro(),
        }
    }

    pub fn offer_preview(&self, offer: &Offer, is_favorite: bool) -> OfferPreview {
        OfferPreview {
            id: offer.id.to_string(),
            title: offer.title.clone(),
            offer_type: offer.offer_type,
            price: offer.price,
            city: city_view(offer.city),
            location: Location {
                latitude: offer.latitude,
                longitude: offer.longitude,
                zoom: OFFER_ZOOM,
            },
            is_favorite,
            is_premium: offer.is_premium,
            rating: offer.rating,
            preview_image: self.media_url(&offer.preview_image),
        }
    }

    pub fn full_offer(&self, found: &OfferWithAuthor, is_favorite: bool) -> FullOffer {
        let offer = &found.offer;
        FullOffer {
            preview: self.offer_preview(offer, is_favorite),
            description: offer.description.clone(),
            bedrooms: offer.rooms,
            goods: offer.features.clone(),
            host: self.user_summary(&found.author),
            images: offer.photos.iter().map(|p| self.media_url(p)).collect(),
            max_adults: offer.guests,
            comments_count: offer.comments_count,
            publish_date: format_date(&offer.publish_date),
        }
    }

    pub fn review(&self, found: &ReviewWithAuthor) -> ReviewView {
        ReviewView {
            id: found.review.id.to_string(),
            comment: found.review.text.clone(),
            rating: found.review.rating as f64,
            date: format_date(&found.review.publish_date),
            user: self.user_summary(&found.author),
        }
    }

    pub fn user(&self, user: &User) -> UserView {
        let avatar = user.avatar.as_deref().unwrap_or(DEFAULT_AVATAR);
        UserView {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            avatar_url: self.media_url(avatar),
            is_pro: user.user_type.is_pro(),
            created_at: format_date(&user.created_at),
            updated_at: format_date(&user.updated_at),
            has_custom_avatar: avatar != DEFAULT_AVATAR,
        }
    }
}
