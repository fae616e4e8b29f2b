//! Fixed accounts and catalog the checks rely on.

use anyhow::Result;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::info;

use super::users::{NewUser, ROLE_ADMIN, ROLE_USER};
use super::Database;
use shopcheck::resources::slugify;

pub const ADMIN_EMAIL: &str = "admin@gmail.com";
pub const USER_EMAIL: &str = "jordan@gmail.com";

const PRODUCTS: [(&str, f64, &str, &str); 6] = [
    ("Smartwatch Kids", 99.0, "Watch", "Xiaomi"),
    ("Electric Bike", 999.0, "Bike", "Xiaomi"),
    ("Electric Toothbrush", 79.0, "Health", "Oral-B"),
    ("Smartwatch Pro", 299.0, "Watch", "Samsung"),
    ("Gaming Laptop", 1499.0, "Laptop", "Asus"),
    ("4K Ultra HD TV", 899.0, "TV", "LG"),
];

const COLORS: [&str; 3] = ["Black", "White", "Red"];
const BRANDS: [&str; 5] = ["Xiaomi", "Oral-B", "Samsung", "Asus", "LG"];
const CATEGORIES: [&str; 5] = ["Watch", "Bike", "Health", "Laptop", "TV"];
const COUPONS: [(&str, u32); 3] = [("SUMMER21", 10), ("WINTER21", 15), ("BLACKFRIDAY", 30)];

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Idempotent: accounts and collections that already exist are left alone.
pub fn run(db: &Database) -> Result<()> {
    for (first, last, email, mobile, role) in [
        ("Admin", "Shop", ADMIN_EMAIL, "0888000001", ROLE_ADMIN),
        ("Jordan", "Peterson", USER_EMAIL, "0888000002", ROLE_USER),
    ] {
        if db.get_user_by_email(email)?.is_none() {
            db.create_user(&NewUser {
                firstname: first,
                lastname: last,
                email,
                mobile,
                password: email,
                role,
            })?;
            info!("Seeded {} account {}", role, email);
        }
    }

    if db.count_documents("product")? == 0 {
        for (title, price, category, brand) in PRODUCTS {
            db.insert_document(
                "product",
                object(json!({
                    "title": title,
                    "slug": slugify(title),
                    "description": format!("{} from the demo catalog", title),
                    "price": price,
                    "category": category,
                    "brand": brand,
                    "quantity": 50,
                    "sold": 0,
                    "images": [],
                    "color": COLORS,
                    "ratings": [],
                    "totalrating": 0,
                })),
            )?;
        }
        info!("Seeded {} products", PRODUCTS.len());
    }

    for (collection, titles) in [("color", &COLORS[..]), ("brand", &BRANDS[..]), ("category", &CATEGORIES[..])] {
        if db.count_documents(collection)? == 0 {
            for title in titles {
                db.insert_document(collection, object(json!({ "title": title })))?;
            }
        }
    }

    if db.count_documents("coupon")? == 0 {
        let expiry = (Utc::now() + Duration::days(365)).to_rfc3339_opts(SecondsFormat::Millis, true);
        for (name, discount) in COUPONS {
            db.insert_document(
                "coupon",
                object(json!({ "name": name, "expiry": expiry, "discount": discount })),
            )?;
        }
    }

    Ok(())
}
