//! Reduce a cart to the single box the carrier is asked to quote.

use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::product::ProductId;

/// Weight used when a product has no usable weight (kg).
pub const PLACEHOLDER_WEIGHT_KG: f64 = 0.1;
/// Used for each missing spatial dimension (cm).
pub const PLACEHOLDER_DIMENSION_CM: f64 = 10.0;

/// Minimum package measurements accepted by the carriers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackageFloors {
    pub weight: f64,
    pub height: f64,
    pub width: f64,
    pub length: f64,
}

/// Correios limits as published for Melhor Envio quotes:
/// 0.3 kg billable minimum, 2 × 11 × 16 cm minimum box.
pub const CARRIER_MINIMUMS: PackageFloors = PackageFloors {
    weight: 0.3,
    height: 2.0,
    width: 11.0,
    length: 16.0,
};

/// Aggregated physical description of a whole cart. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Kilograms.
    pub weight: f64,
    /// Centimetres.
    pub height: f64,
    pub width: f64,
    pub length: f64,
}

impl PackageDescriptor {
    fn floored(self, floors: &PackageFloors) -> Self {
        Self {
            weight: self.weight.max(floors.weight),
            height: self.height.max(floors.height),
            width: self.width.max(floors.width),
            length: self.length.max(floors.length),
        }
    }
}

fn measured(value: Option<f64>, placeholder: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => placeholder,
    }
}

/// Aggregate with the canonical carrier minimums.
pub fn aggregate(lines: &[CartLine]) -> PackageDescriptor {
    aggregate_with(lines, &CARRIER_MINIMUMS)
}

/// Items stack lengthwise: weight and length add up per unit, height and width
/// take the largest item. Floors apply to the finished package, not per line.
pub fn aggregate_with(lines: &[CartLine], floors: &PackageFloors) -> PackageDescriptor {
    let mut package = PackageDescriptor {
        weight: 0.0,
        height: 0.0,
        width: 0.0,
        length: 0.0,
    };

    for line in lines {
        let qty = f64::from(line.quantity);
        let p = &line.product;
        package.weight += measured(p.weight, PLACEHOLDER_WEIGHT_KG) * qty;
        package.height = package.height.max(measured(p.height, PLACEHOLDER_DIMENSION_CM));
        package.width = package.width.max(measured(p.width, PLACEHOLDER_DIMENSION_CM));
        package.length += measured(p.length, PLACEHOLDER_DIMENSION_CM) * qty;
    }

    package.floored(floors)
}

/// Per-line data the carrier needs for insurance and the content declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredItem {
    pub id: ProductId,
    /// Line value in centavos.
    pub declared_value: u64,
    pub description: String,
    pub quantity: u32,
}

pub fn declared_items(lines: &[CartLine]) -> Vec<DeclaredItem> {
    lines
        .iter()
        .map(|line| DeclaredItem {
            id: line.product.id.clone(),
            declared_value: line.total(),
            description: line.product.name.clone(),
            quantity: line.quantity,
        })
        .collect()
}
