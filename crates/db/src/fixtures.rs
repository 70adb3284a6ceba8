//! Demo catalog used by `shopmate seed` and by end-to-end smoke runs.

use rust_decimal::Decimal;

use shopmate_core::domain::product::{Product, ProductId};

use crate::repositories::{ProductRepository, RepositoryError};

pub fn demo_catalog() -> Vec<Product> {
    fn item(id: &str, brand: &str, name: &str, cents: i64, category: &str, desc: &str) -> Product {
        Product {
            id: ProductId(id.to_owned()),
            brand: brand.to_owned(),
            name: name.to_owned(),
            price: Decimal::new(cents, 2),
            category: category.to_owned(),
            description: desc.to_owned(),
        }
    }

    vec![
        item(
            "prod-neck-massager",
            "Relaxo",
            "Neck Massager",
            6999,
            "Healthtech and Wellness",
            "Shiatsu neck and shoulder massager with heat, 15-minute auto shutoff.",
        ),
        item(
            "prod-foot-leg-massager",
            "Relaxo",
            "Revive Foot & Leg Massager",
            12999,
            "Healthtech and Wellness",
            "Compression massager for feet and calves with three intensity levels.",
        ),
        item(
            "prod-handheld-massager",
            "PulseWell",
            "Handheld Deep Tissue Massager",
            4999,
            "Healthtech and Wellness",
            "Cordless percussion massager for back, leg, and shoulder recovery.",
        ),
        item(
            "prod-portable-ecg",
            "CardioSense",
            "Portable ECG Device",
            18999,
            "Healthtech and Wellness",
            "Single-lead ECG monitor with smartphone sync and 30-second readings.",
        ),
        item(
            "prod-smart-scale",
            "PulseWell",
            "Smart Body Scale",
            3499,
            "Healthtech and Wellness",
            "Bluetooth scale tracking weight, BMI, and body composition trends.",
        ),
        item(
            "prod-posture-band",
            "AlignFit",
            "Posture Corrector Band",
            2499,
            "Healthtech and Wellness",
            "Adjustable upper-back brace for desk workers, breathable mesh.",
        ),
    ]
}

pub async fn seed_products(
    repository: &dyn ProductRepository,
) -> Result<usize, RepositoryError> {
    let catalog = demo_catalog();
    for product in &catalog {
        repository.insert(product).await?;
    }
    Ok(catalog.len())
}

#[cfg(test)]
mod tests {
    use super::{demo_catalog, seed_products};
    use crate::repositories::{InMemoryProductRepository, ProductRepository};

    #[tokio::test]
    async fn seed_inserts_every_catalog_item() {
        let repository = InMemoryProductRepository::default();
        let count = seed_products(&repository).await.expect("seed");
        assert_eq!(count, demo_catalog().len());

        let ids: Vec<String> = demo_catalog().into_iter().map(|p| p.id.0).collect();
        let fetched = repository.fetch_by_ids(&ids).await.expect("fetch");
        assert_eq!(fetched.len(), count);
    }

    #[test]
    fn catalog_ids_are_unique() {
        let catalog = demo_catalog();
        let mut ids: Vec<&str> = catalog.iter().map(|p| p.id.0.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
    }
}
