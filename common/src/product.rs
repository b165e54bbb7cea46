use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::reais;

/// Unique product identifier (row id in the hosted backend).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog category of a piece of jewelry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProductCategory {
    Rings,
    Necklaces,
    Earrings,
    Bracelets,
    Pendants,
    Sets,
    Other(String),
}

impl ProductCategory {
    pub fn as_str(&self) -> &str {
        match self {
            ProductCategory::Rings => "rings",
            ProductCategory::Necklaces => "necklaces",
            ProductCategory::Earrings => "earrings",
            ProductCategory::Bracelets => "bracelets",
            ProductCategory::Pendants => "pendants",
            ProductCategory::Sets => "sets",
            ProductCategory::Other(name) => name,
        }
    }
}

impl From<String> for ProductCategory {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "rings" | "aneis" | "anéis" => ProductCategory::Rings,
            "necklaces" | "colares" => ProductCategory::Necklaces,
            "earrings" | "brincos" => ProductCategory::Earrings,
            "bracelets" | "pulseiras" => ProductCategory::Bracelets,
            "pendants" | "pingentes" => ProductCategory::Pendants,
            "sets" | "conjuntos" => ProductCategory::Sets,
            _ => ProductCategory::Other(value),
        }
    }
}

impl From<ProductCategory> for String {
    fn from(value: ProductCategory) -> Self {
        match value {
            ProductCategory::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// A catalog item. Read-only for the checkout; mutated only by admin actions.
///
/// Physical dimensions are frequently missing in catalog data, so they stay
/// optional here and the package aggregator substitutes placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Price in centavos.
    #[serde(with = "reais")]
    pub price: u64,
    pub stock: u32,
    /// Kilograms.
    #[serde(default)]
    pub weight: Option<f64>,
    /// Centimetres.
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub category: ProductCategory,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// True when `quantity` units can still be sold.
    pub fn is_available(&self, quantity: u32) -> bool {
        quantity > 0 && self.stock >= quantity
    }
}

/// Fields accepted when an admin creates or edits a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "reais")]
    pub price: u64,
    pub stock: u32,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub category: ProductCategory,
    #[serde(default)]
    pub is_featured: bool,
}

impl ProductDraft {
    /// Names of fields that must be filled before saving.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.price == 0 {
            missing.push("price");
        }
        if self.category.as_str().trim().is_empty() {
            missing.push("category");
        }
        missing
    }

    pub fn into_product(self, id: ProductId, created_at: Option<DateTime<Utc>>) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.stock,
            weight: self.weight,
            height: self.height,
            width: self.width,
            length: self.length,
            image_url: self.image_url,
            images: self.images,
            category: self.category,
            is_featured: self.is_featured,
            created_at,
        }
    }
}
