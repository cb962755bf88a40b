//! Input rules for users, offers and reviews.
//!
//! Each `validate_*` function collects every failing field instead of
//! stopping at the first, so a client can highlight the whole form at once.

use serde_json::Value;

use crate::db::models::{City, Feature, NewOffer, OfferType, UserType};
use crate::error::{AppError, FieldError};
use crate::uploads::FormFields;

pub const REVIEW_MIN_LEN: usize = 40;
pub const REVIEW_MAX_LEN: usize = 1024;

const PASSWORD_SYMBOLS: &str = "@$!%*#?&";

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// `local@domain.tld`: one `@`, no whitespace, a dot inside the domain with
/// text on both sides.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// At least six characters, one ASCII letter and one digit; only letters,
/// digits and `@$!%*#?&` are allowed.
pub fn is_valid_password(password: &str) -> bool {
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c));
    allowed
        && password.len() >= 6
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// 2 to 50 characters: Latin or Cyrillic letters (`А-Я`, `а-я`), ASCII
/// digits and whitespace. Checked on the raw value.
pub fn is_valid_username(username: &str) -> bool {
    let len = char_len(username);
    (2..=50).contains(&len)
        && !username.trim().is_empty()
        && username.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || ('А'..='я').contains(&c)
                || c.is_whitespace()
        })
}

// --- Users ---

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub username: String,
    pub user_type: UserType,
}

/// Validate registration fields. Email is normalized to trimmed lowercase;
/// the username is kept as sent.
pub fn validate_registration(fields: &FormFields) -> Result<Registration, AppError> {
    let mut errors = Vec::new();

    let email = fields.text("email").map(|e| e.trim().to_lowercase());
    let password = fields.text("password").map(str::to_string);
    let username = fields.text("username").map(str::to_string);
    let user_type = fields.text("userType");

    match &email {
        None => errors.push(FieldError::new("email", "Email is required")),
        Some(e) if !is_valid_email(e) => {
            errors.push(FieldError::new("email", "Invalid email address"))
        }
        _ => {}
    }
    match &password {
        None => errors.push(FieldError::new("password", "Password is required")),
        Some(p) if !is_valid_password(p) => errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters and contain letters and digits",
        )),
        _ => {}
    }
    match &username {
        None => errors.push(FieldError::new("username", "Username is required")),
        Some(u) if !is_valid_username(u) => errors.push(FieldError::new(
            "username",
            "Username must be 2-50 characters of letters, digits and spaces",
        )),
        _ => {}
    }
    let user_type = match user_type {
        None => {
            errors.push(FieldError::new("userType", "User type is required"));
            None
        }
        Some(t) => match t.parse::<UserType>() {
            Ok(t) => Some(t),
            Err(_) => {
                errors.push(FieldError::new(
                    "userType",
                    "User type must be 'normal' or 'pro'",
                ));
                None
            }
        },
    };

    match (email, password, username, user_type) {
        (Some(email), Some(password), Some(username), Some(user_type)) if errors.is_empty() => {
            Ok(Registration {
                email,
                password,
                username,
                user_type,
            })
        }
        _ => Err(AppError::Validation(errors)),
    }
}

// --- Reviews ---

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDraft {
    pub text: String,
    pub rating: i64,
}

/// Accepts an integer rating as a JSON number or a numeric string.
fn integer_rating(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn validate_review(comment: Option<&str>, rating: Option<&Value>) -> Result<ReviewDraft, AppError> {
    let mut errors = Vec::new();

    // Length counts the text as sent, surrounding whitespace included.
    let text = comment.unwrap_or_default();
    let len = char_len(text);
    if text.trim().is_empty() {
        errors.push(FieldError::new("comment", "Comment is required"));
    } else if !(REVIEW_MIN_LEN..=REVIEW_MAX_LEN).contains(&len) {
        errors.push(FieldError::new(
            "comment",
            format!("Comment must be {REVIEW_MIN_LEN}-{REVIEW_MAX_LEN} characters"),
        ));
    }

    let rating = match rating.filter(|v| !v.is_null()) {
        None => {
            errors.push(FieldError::new("rating", "Rating is required"));
            None
        }
        Some(value) => match integer_rating(value) {
            Some(r) if (1..=5).contains(&r) => Some(r),
            _ => {
                errors.push(FieldError::new(
                    "rating",
                    "Rating must be an integer from 1 to 5",
                ));
                None
            }
        },
    };

    match rating {
        Some(rating) if errors.is_empty() => Ok(ReviewDraft {
            text: text.to_string(),
            rating,
        }),
        _ => Err(AppError::Validation(errors)),
    }
}

// --- Offers ---

/// Validated offer fields, waiting for their image paths.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferDraft {
    pub title: String,
    pub description: String,
    pub city: City,
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

impl OfferDraft {
    pub fn into_new_offer(self, preview_image: String, photos: Vec<String>) -> NewOffer {
        NewOffer {
            title: self.title,
            description: self.description,
            city: self.city,
            preview_image,
            photos,
            is_premium: self.is_premium,
            rating: self.rating,
            offer_type: self.offer_type,
            rooms: self.rooms,
            guests: self.guests,
            price: self.price,
            features: self.features,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

struct Collector<'a> {
    fields: &'a FormFields,
    errors: Vec<FieldError>,
}

impl Collector<'_> {
    fn required(&mut self, name: &str) -> Option<String> {
        match self.fields.text(name).map(str::trim) {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            _ => {
                self.errors
                    .push(FieldError::new(name, format!("{name} is required")));
                None
            }
        }
    }

    fn text_len(&mut self, name: &str, min: usize, max: usize) -> Option<String> {
        let value = self.required(name)?;
        if !(min..=max).contains(&char_len(&value)) {
            self.errors.push(FieldError::new(
                name,
                format!("{name} must be {min}-{max} characters"),
            ));
            return None;
        }
        Some(value)
    }

    fn integer(&mut self, name: &str, min: i64, max: i64) -> Option<i64> {
        let raw = self.required(name)?;
        match raw.parse::<i64>() {
            Ok(v) if (min..=max).contains(&v) => Some(v),
            _ => {
                self.errors.push(FieldError::new(
                    name,
                    format!("{name} must be an integer from {min} to {max}"),
                ));
                None
            }
        }
    }

    fn float(&mut self, name: &str, min: f64, max: f64) -> Option<f64> {
        let raw = self.required(name)?;
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && (min..=max).contains(&v) => Some(v),
            _ => {
                self.errors.push(FieldError::new(
                    name,
                    format!("{name} must be a number from {min} to {max}"),
                ));
                None
            }
        }
    }

    fn parsed<T: std::str::FromStr>(&mut self, name: &str, allowed: &[&str]) -> Option<T> {
        let raw = self.required(name)?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.errors.push(FieldError::new(
                    name,
                    format!("{name} must be one of: {}", allowed.join(", ")),
                ));
                None
            }
        }
    }

    fn boolean(&mut self, name: &str) -> bool {
        match self.fields.text(name).map(|v| v.trim().to_ascii_lowercase()) {
            None => false,
            Some(v) => match v.as_str() {
                "true" | "1" | "on" | "yes" => true,
                "" | "false" | "0" | "off" | "no" => false,
                _ => {
                    self.errors
                        .push(FieldError::new(name, format!("{name} must be a boolean")));
                    false
                }
            },
        }
    }

    fn features(&mut self) -> Vec<Feature> {
        let mut features = Vec::new();
        for label in feature_labels(self.fields.all("features")) {
            match label.parse::<Feature>() {
                Ok(f) if !features.contains(&f) => features.push(f),
                Ok(_) => {}
                Err(_) => self.errors.push(FieldError::new(
                    "features",
                    format!("Unknown feature: {label}"),
                )),
            }
        }
        features
    }
}

/// Features may arrive as repeated fields, a JSON array, or a comma list.
fn feature_labels(values: &[String]) -> Vec<String> {
    let mut labels = Vec::new();
    for value in values {
        let value = value.trim();
        if value.starts_with('[') {
            if let Ok(list) = serde_json::from_str::<Vec<String>>(value) {
                labels.extend(list);
                continue;
            }
        }
        labels.extend(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
    labels
}

pub fn validate_offer(fields: &FormFields) -> Result<OfferDraft, AppError> {
    let cities: Vec<&str> = City::ALL.iter().map(City::as_str).collect();
    let types: Vec<&str> = OfferType::ALL.iter().map(OfferType::as_str).collect();

    let mut c = Collector {
        fields,
        errors: Vec::new(),
    };

    let title = c.text_len("title", 10, 100);
    let description = c.text_len("description", 20, 1024);
    let city = c.parsed::<City>("city", &cities);
    let offer_type = c.parsed::<OfferType>("type", &types);
    let rating = c.float("rating", 1.0, 5.0);
    let rooms = c.integer("rooms", 1, 8);
    let guests = c.integer("guests", 1, 10);
    let price = c.integer("price", 50, 100_000);
    let latitude = c.float("latitude", -90.0, 90.0);
    let longitude = c.float("longitude", -180.0, 180.0);
    let is_premium = c.boolean("isPremium");
    let features = c.features();

    if !c.errors.is_empty() {
        return Err(AppError::Validation(c.errors));
    }

    match (
        title,
        description,
        city,
        offer_type,
        rating,
        rooms,
        guests,
        price,
        latitude,
        longitude,
    ) {
        (
            Some(title),
            Some(description),
            Some(city),
            Some(offer_type),
            Some(rating),
            Some(rooms),
            Some(guests),
            Some(price),
            Some(latitude),
            Some(longitude),
        ) => Ok(OfferDraft {
            title,
            description,
            city,
            is_premium,
            // Stored with one fractional digit.
            rating: (rating * 10.0).round() / 10.0,
            offer_type,
            rooms,
            guests,
            price,
            features,
            latitude,
            longitude,
        }),
        _ => Err(AppError::Internal("offer validation lost a field".into())),
    }
}
