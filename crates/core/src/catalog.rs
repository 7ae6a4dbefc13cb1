use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: u32,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_price: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Product {
    pub fn unit_price(&self) -> Decimal {
        Decimal::from(self.price)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("catalog validation failed: {0}")]
    Validation(String),
}

/// The fixed product catalog. Static configuration data: loaded once at
/// startup, immutable afterwards.
#[derive(Clone, Debug)]
pub struct Catalog {
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    product: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut seen = BTreeSet::new();
        for product in &products {
            if product.price == 0 {
                return Err(CatalogError::Validation(format!(
                    "product `{}` must have a positive price",
                    product.id.0
                )));
            }
            if !seen.insert(product.id.0.clone()) {
                return Err(CatalogError::Validation(format!(
                    "duplicate product id `{}`",
                    product.id.0
                )));
            }
        }
        Ok(Self { products })
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
        let file: CatalogFile = toml::from_str(&raw)
            .map_err(|source| CatalogError::ParseFile { path: path.to_path_buf(), source })?;
        Self::new(file.product)
    }

    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|product| &product.id == id)
    }

    /// Distinct category names, sorted.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> =
            self.products.iter().map(|product| product.category.as_str()).collect();
        categories.sort_unstable();
        categories.dedup();
        categories
    }

    pub fn products_in(&self, category: &str) -> Vec<&Product> {
        self.products.iter().filter(|product| product.category == category).collect()
    }

    pub fn find_in_category(&self, category: &str, name: &str) -> Option<&Product> {
        self.products
            .iter()
            .find(|product| product.category == category && product.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// The built-in demo storefront.
    pub fn builtin() -> Self {
        let products = vec![
            product("airpods_pro_2", "AirPods Pro 2", 65, "Earbuds")
                .with_old_price(105)
                .with_bonus("🎁 Branded case included")
                .with_description("Active noise cancellation, iOS and Android support, up to 6 hours per charge"),
            product("airpods_4", "AirPods 4", 135, "Earbuds")
                .with_description("Improved sound, auto-connect, touch controls, up to 5 hours per charge"),
            product("airpods_2", "AirPods 2", 35, "Earbuds")
                .with_description("Clean sound, instant pairing, up to 4 hours per charge"),
            product("airpods_3", "AirPods 3", 50, "Earbuds")
                .with_description("Spatial sound, auto-connect, splash resistant, up to 5 hours per charge"),
            product("watch_8_ultra", "Apple Watch 8 Ultra", 65, "Watches")
                .with_old_price(75)
                .with_description("Titanium body, sport design, heart-rate monitor, up to 36 hours per charge"),
            product("watch_9", "Apple Watch 9", 100, "Watches")
                .with_description("Aluminium body, health tracking, Always-On display, up to 18 hours per charge"),
            product("watch_ultra_2", "Apple Watch Ultra 2", 120, "Watches")
                .with_description("Titanium body, extended sensors, extra-bright display, up to 36 hours per charge"),
            product("casio_vintage", "Casio Vintage square", 35, "Watches")
                .with_description("Steel body, calendar, backlight, splash resistant"),
            product("block_20w", "Power adapter 20W (AAA+)", 20, "Accessories")
                .with_description("20W fast charging for phone and tablet, overheat protection"),
            product("cable_lightning", "Lightning cable", 10, "Accessories")
                .with_description("Fast charging, reinforced braid, 1 metre"),
            product("cable_magsafe", "MagSafe cable", 20, "Accessories")
                .with_description("Magnetic mount, 15W fast charging"),
            product("dyson_fan", "Dyson hairdryer (full kit)", 185, "Other")
                .with_old_price(220)
                .with_bonus("🎁 AirPods 2 included")
                .with_description("Strong airflow, temperature control, overheat protection, full kit"),
            product("dualshock_4", "DualShock 4 v2", 50, "Other")
                .with_description("Wireless gamepad, touchpad, PC and PS4 support, up to 8 hours per charge"),
        ];

        Self { products }
    }
}

fn product(id: &str, name: &str, price: u32, category: &str) -> Product {
    Product {
        id: ProductId(id.to_string()),
        name: name.to_string(),
        price,
        category: category.to_string(),
        old_price: None,
        bonus: None,
        description: None,
    }
}

impl Product {
    fn with_old_price(mut self, old_price: u32) -> Self {
        self.old_price = Some(old_price);
        self
    }

    fn with_bonus(mut self, bonus: &str) -> Self {
        self.bonus = Some(bonus.to_string());
        self
    }

    fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{Catalog, Product, ProductId};

    #[test]
    fn builtin_catalog_is_valid_and_categorised() {
        let catalog = Catalog::builtin();

        assert_eq!(catalog.categories(), vec!["Accessories", "Earbuds", "Other", "Watches"]);
        assert!(catalog.products_in("Earbuds").len() >= 4);
        assert!(catalog.get(&ProductId("airpods_pro_2".to_string())).is_some());
    }

    #[test]
    fn zero_priced_products_are_rejected() {
        let result = Catalog::new(vec![Product {
            id: ProductId("freebie".to_string()),
            name: "Freebie".to_string(),
            price: 0,
            category: "Other".to_string(),
            old_price: None,
            bonus: None,
            description: None,
        }]);

        assert!(matches!(result, Err(super::CatalogError::Validation(_))));
    }

    #[test]
    fn duplicate_product_ids_are_rejected() {
        let entry = Product {
            id: ProductId("dup".to_string()),
            name: "Dup".to_string(),
            price: 10,
            category: "Other".to_string(),
            old_price: None,
            bonus: None,
            description: None,
        };

        let result = Catalog::new(vec![entry.clone(), entry]);

        assert!(matches!(result, Err(super::CatalogError::Validation(_))));
    }

    #[test]
    fn catalog_loads_from_toml_file() -> Result<(), String> {
        let dir = TempDir::new().map_err(|err| err.to_string())?;
        let path = dir.path().join("catalog.toml");
        fs::write(
            &path,
            r#"
[[product]]
id = "cable_lightning"
name = "Lightning cable"
price = 10
category = "Accessories"

[[product]]
id = "airpods_2"
name = "AirPods 2"
price = 35
category = "Earbuds"
description = "Clean sound"
"#,
        )
        .map_err(|err| err.to_string())?;

        let catalog = Catalog::load(&path).map_err(|err| err.to_string())?;

        if catalog.categories() != vec!["Accessories", "Earbuds"] {
            return Err("unexpected categories".to_string());
        }
        let product = catalog
            .find_in_category("Earbuds", "AirPods 2")
            .ok_or("product lookup by category and name failed")?;
        if product.description.as_deref() != Some("Clean sound") {
            return Err("description not loaded".to_string());
        }
        Ok(())
    }
}
