//! In-memory catalog.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use cube_common::Product;

use crate::catalog::{record_order, Catalog, DatasetQuery, DatasetRecord};
use crate::error::{StorageError, StorageResult};

/// Catalog held entirely in memory.
///
/// Applies the same coarse filters as the PostgreSQL backend. Can be switched
/// offline to exercise catalog-outage handling.
pub struct MemoryCatalog {
    products: RwLock<BTreeMap<String, Product>>,
    datasets: RwLock<BTreeMap<Uuid, DatasetRecord>>,
    available: AtomicBool,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(BTreeMap::new()),
            datasets: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Make every subsequent call fail with `Unavailable` (or recover).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn remove_dataset(&self, id: &Uuid) -> Option<DatasetRecord> {
        self.datasets.write().await.remove(id)
    }

    pub async fn dataset_count(&self) -> usize {
        self.datasets.read().await.len()
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::unavailable("in-memory catalog is offline"))
        }
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn search(&self, query: &DatasetQuery) -> StorageResult<Vec<DatasetRecord>> {
        self.check_available()?;
        let datasets = self.datasets.read().await;
        let mut found: Vec<DatasetRecord> = datasets
            .values()
            .filter(|r| r.matches(query))
            .cloned()
            .collect();
        found.sort_by(record_order);
        Ok(found)
    }

    async fn get_product(&self, name: &str) -> StorageResult<Product> {
        self.check_available()?;
        self.products
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::ProductNotFound(name.to_string()))
    }

    async fn list_products(&self) -> StorageResult<Vec<Product>> {
        self.check_available()?;
        Ok(self.products.read().await.values().cloned().collect())
    }

    async fn add_product(&self, product: &Product) -> StorageResult<()> {
        self.check_available()?;
        self.products
            .write()
            .await
            .insert(product.name.clone(), product.clone());
        Ok(())
    }

    async fn add_dataset(&self, record: &DatasetRecord) -> StorageResult<()> {
        self.check_available()?;
        self.datasets.write().await.insert(record.id, record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cube_common::{BoundingBox, DataType, Measurement, TimeRange, TimeSpan};

    fn product(name: &str) -> Product {
        Product {
            name: name.to_string(),
            description: String::new(),
            measurements: vec![Measurement::new("red", DataType::Int16, -999.0)],
            fusion: Default::default(),
            grid: None,
            storage: None,
        }
    }

    fn record(day: u32, bbox: Option<BoundingBox>) -> DatasetRecord {
        let at = Utc.with_ymd_and_hms(2016, 1, day, 0, 0, 0).unwrap();
        DatasetRecord {
            id: Uuid::new_v4(),
            product: "ls8".to_string(),
            time: Some(TimeSpan::instant(at)),
            bbox,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_search_filters_time_and_space() {
        let catalog = MemoryCatalog::new();
        catalog.add_product(&product("ls8")).await.unwrap();

        let inside = record(2, Some(BoundingBox::new(140.0, -36.0, 141.0, -35.0)));
        let far = record(2, Some(BoundingBox::new(10.0, 40.0, 11.0, 41.0)));
        let late = record(20, Some(BoundingBox::new(140.0, -36.0, 141.0, -35.0)));
        let unindexed = record(3, None);
        for r in [&inside, &far, &late, &unindexed] {
            catalog.add_dataset(r).await.unwrap();
        }

        let range = TimeRange::parse("2016-01-01/2016-01-10").unwrap();
        let query = DatasetQuery::new("ls8")
            .with_time_range(Some(range))
            .with_bbox(Some(BoundingBox::new(139.0, -37.0, 142.0, -34.0)));
        let found = catalog.search(&query).await.unwrap();

        let ids: Vec<Uuid> = found.iter().map(|r| r.id).collect();
        assert_eq!(found.len(), 2);
        assert!(ids.contains(&inside.id));
        assert!(ids.contains(&unindexed.id));
    }

    #[tokio::test]
    async fn test_search_orders_by_time() {
        let catalog = MemoryCatalog::new();
        let later = record(5, None);
        let earlier = record(1, None);
        catalog.add_dataset(&later).await.unwrap();
        catalog.add_dataset(&earlier).await.unwrap();

        let found = catalog.search(&DatasetQuery::new("ls8")).await.unwrap();
        assert_eq!(found[0].id, earlier.id);
        assert_eq!(found[1].id, later.id);
    }

    #[tokio::test]
    async fn test_products() {
        let catalog = MemoryCatalog::new();
        catalog.add_product(&product("b")).await.unwrap();
        catalog.add_product(&product("a")).await.unwrap();

        let names: Vec<String> = catalog
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(matches!(
            catalog.get_product("missing").await,
            Err(StorageError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_catalog() {
        let catalog = MemoryCatalog::new();
        catalog.set_available(false);
        let err = catalog.search(&DatasetQuery::new("ls8")).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));

        catalog.set_available(true);
        assert!(catalog.search(&DatasetQuery::new("ls8")).await.is_ok());
    }
}
