//! Resource descriptors driving the generic lifecycle.
//!
//! Each constructor takes a fixture tag so that names never collide between
//! concurrently running tests or with leftovers from earlier runs.

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::assertions::{FieldMatch, RequiredField};

pub const DEFAULT_IDENTITY_FIELD: &str = "_id";

#[derive(Debug, Clone)]
pub struct ResourceSpec {
    pub name: &'static str,
    pub collection_path: String,
    pub create_body: Value,
    pub update_body: Value,
    pub identity_field: String,
    pub required_on_create: Vec<RequiredField>,
    pub checked_on_update: Vec<RequiredField>,
    /// Fields that the update body leaves alone and must keep their created value.
    pub kept_on_update: Vec<String>,
    pub read_requires_auth: bool,
    pub list_after_create: bool,
    pub timestamps: bool,
    pub listing_fields: Vec<String>,
    pub listing_dates: Vec<String>,
}

impl ResourceSpec {
    pub fn new(name: &'static str, collection_path: &str, create_body: Value, update_body: Value) -> Self {
        Self {
            name,
            collection_path: collection_path.trim_matches('/').to_string(),
            create_body,
            update_body,
            identity_field: DEFAULT_IDENTITY_FIELD.to_string(),
            required_on_create: Vec::new(),
            checked_on_update: Vec::new(),
            kept_on_update: Vec::new(),
            read_requires_auth: false,
            list_after_create: false,
            timestamps: false,
            listing_fields: Vec::new(),
            listing_dates: Vec::new(),
        }
    }

    pub fn identity(mut self, field: &str) -> Self {
        self.identity_field = field.to_string();
        self
    }

    pub fn require(mut self, field: &str, rule: FieldMatch) -> Self {
        self.required_on_create.push(RequiredField::new(field, rule));
        self
    }

    pub fn check_update(mut self, field: &str, rule: FieldMatch) -> Self {
        self.checked_on_update.push(RequiredField::new(field, rule));
        self
    }

    pub fn keep(mut self, field: &str) -> Self {
        self.kept_on_update.push(field.to_string());
        self
    }

    pub fn read_with_auth(mut self) -> Self {
        self.read_requires_auth = true;
        self
    }

    pub fn list_after_create(mut self) -> Self {
        self.list_after_create = true;
        self
    }

    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    pub fn listing(mut self, fields: &[&str]) -> Self {
        self.listing_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn listing_date(mut self, field: &str) -> Self {
        self.listing_dates.push(field.to_string());
        self
    }

    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.collection_path, id)
    }
}

/// Short random suffix for fixture names.
pub fn fixture_tag() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// A date a year out, so coupons created by the checks are never expired.
pub fn future_date(days: i64) -> String {
    (Utc::now() + Duration::days(days)).format("%Y-%m-%d").to_string()
}

pub fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

pub fn blog(tag: &str) -> ResourceSpec {
    ResourceSpec::new(
        "blog",
        "blog",
        json!({
            "title": format!("New Blog Post {}", tag),
            "description": "This is a new blog post content",
            "category": "Technology",
        }),
        json!({
            "title": format!("Updated Blog Post {}", tag),
            "description": "This is an updated blog post content",
        }),
    )
    .require("title", FieldMatch::Exact)
    .require("description", FieldMatch::Exact)
    .require("category", FieldMatch::Exact)
    .check_update("title", FieldMatch::Exact)
    .check_update("description", FieldMatch::Exact)
    .keep("category")
    .with_timestamps()
    .listing(&["title"])
}

pub fn brand(tag: &str) -> ResourceSpec {
    ResourceSpec::new(
        "brand",
        "brand",
        json!({ "title": format!("Test Brand {}", tag) }),
        json!({ "title": format!("Updated Brand {}", tag) }),
    )
    .require("title", FieldMatch::Exact)
    .check_update("title", FieldMatch::Exact)
    .with_timestamps()
    .listing(&["title"])
}

pub fn category(tag: &str) -> ResourceSpec {
    ResourceSpec::new(
        "category",
        "category",
        json!({ "title": format!("New Test Category {}", tag) }),
        json!({ "title": format!("Updated Title {}", tag) }),
    )
    .require("title", FieldMatch::Exact)
    .check_update("title", FieldMatch::Exact)
    .list_after_create()
    .with_timestamps()
    .listing(&["title"])
}

pub fn color(tag: &str) -> ResourceSpec {
    ResourceSpec::new(
        "color",
        "color",
        json!({ "title": format!("Test Color {}", tag) }),
        json!({ "title": format!("Updated Color {}", tag) }),
    )
    .require("title", FieldMatch::Exact)
    .check_update("title", FieldMatch::Exact)
    .with_timestamps()
    .listing(&["title"])
}

pub fn coupon(tag: &str) -> ResourceSpec {
    ResourceSpec::new(
        "coupon",
        "coupon",
        json!({
            "name": format!("New Test Coupon {}", tag),
            "discount": 20,
            "expiry": future_date(365),
        }),
        json!({
            "name": format!("Updated Coupon {}", tag),
            "discount": 25,
            "expiry": future_date(400),
        }),
    )
    .require("name", FieldMatch::Uppercased)
    .require("discount", FieldMatch::Number)
    .require("expiry", FieldMatch::SameInstant)
    .check_update("name", FieldMatch::Uppercased)
    .check_update("discount", FieldMatch::Number)
    .check_update("expiry", FieldMatch::SameInstant)
    .read_with_auth()
    .listing(&["name", "expiry"])
    .listing_date("expiry")
}

pub fn product(tag: &str) -> ResourceSpec {
    let title = format!("New Test Product {}", tag);
    ResourceSpec::new(
        "product",
        "product",
        json!({
            "title": title,
            "slug": slugify(&title),
            "description": "New Test Description",
            "price": 99.99,
            "category": "test",
            "brand": "test",
            "quantity": 100,
        }),
        json!({
            "title": format!("Updated Product {}", tag),
            "description": "Updated Product Description",
            "price": 39.99,
        }),
    )
    .require("title", FieldMatch::Exact)
    .require("slug", FieldMatch::Exact)
    .require("description", FieldMatch::Exact)
    .require("price", FieldMatch::Number)
    .require("category", FieldMatch::Exact)
    .require("brand", FieldMatch::Exact)
    .require("quantity", FieldMatch::Number)
    .check_update("title", FieldMatch::Exact)
    .check_update("description", FieldMatch::Exact)
    .check_update("price", FieldMatch::Number)
    .keep("brand")
    .with_timestamps()
    .listing(&["title"])
}

/// Every descriptor with CRUD routes, freshly tagged.
pub fn all(tag: &str) -> Vec<ResourceSpec> {
    vec![
        blog(tag),
        brand(tag),
        category(tag),
        color(tag),
        coupon(tag),
        product(tag),
    ]
}

pub fn by_name(name: &str, tag: &str) -> Option<ResourceSpec> {
    match name {
        "blog" => Some(blog(tag)),
        "brand" => Some(brand(tag)),
        "category" => Some(category(tag)),
        "color" => Some(color(tag)),
        "coupon" => Some(coupon(tag)),
        "product" => Some(product(tag)),
        _ => None,
    }
}
