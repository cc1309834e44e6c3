//! # Reference Data Repositories
//!
//! Documents owned by other parts of the business that this engine only
//! reads: the menu catalog (`menu/{mealPeriod}`) and staff access records
//! (`usersAccess/{email}`). Writes exist for seeding and tests.

use banquet_core::{MenuCatalog, UserAccess};

use crate::documents::{collection, DocumentStore};
use crate::error::DbResult;

/// Repository for `menu`.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    store: DocumentStore,
}

impl CatalogRepository {
    pub fn new(store: DocumentStore) -> Self {
        CatalogRepository { store }
    }

    pub async fn get(&self, meal_period: &str) -> DbResult<Option<MenuCatalog>> {
        self.store.load(collection::MENU, meal_period).await
    }

    pub async fn save(&self, meal_period: &str, catalog: &MenuCatalog) -> DbResult<()> {
        self.store.store(collection::MENU, meal_period, catalog).await
    }
}

/// Repository for `usersAccess`.
#[derive(Debug, Clone)]
pub struct AccessRepository {
    store: DocumentStore,
}

impl AccessRepository {
    pub fn new(store: DocumentStore) -> Self {
        AccessRepository { store }
    }

    /// Access record for an email. Keys are stored lower-case.
    pub async fn get(&self, email: &str) -> DbResult<Option<UserAccess>> {
        self.store
            .load(collection::USERS_ACCESS, &email.trim().to_lowercase())
            .await
    }

    pub async fn list(&self) -> DbResult<Vec<UserAccess>> {
        let docs = self.store.list(collection::USERS_ACCESS).await?;
        Ok(docs.into_iter().map(|(_, access)| access).collect())
    }

    pub async fn save(&self, access: &UserAccess) -> DbResult<()> {
        self.store
            .store(collection::USERS_ACCESS, &access.email.trim().to_lowercase(), access)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use banquet_core::{AccessState, Money};
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn test_catalog_prices() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog: MenuCatalog = serde_json::from_value(json!({
            "categories": {
                "Silver": {
                    "price": "450",
                    "Starters": {"menuItems": [{"id": "s1", "name": "Paneer Tikka"}]}
                }
            }
        }))
        .unwrap();
        db.catalog().save("Dinner", &catalog).await.unwrap();

        let stored = db.catalog().get("Dinner").await.unwrap().unwrap();
        assert_eq!(stored.category_price("Silver"), Some(Money::from_rupees(450)));
        assert_eq!(stored.categories["Silver"].sub_categories().len(), 1);
        assert!(db.catalog().get("Lunch").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_access_lookup_by_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let access = UserAccess {
            name: "Ravi".to_string(),
            email: "Ravi@Example.com".to_string(),
            access_to_app: "Accountant".to_string(),
            access: AccessState::Enable,
            editable_prebookings: vec![],
            edit_data: true,
            edit_expiry: Some(Utc::now() + Duration::hours(2)),
        };
        db.access().save(&access).await.unwrap();

        let stored = db.access().get("ravi@example.com").await.unwrap().unwrap();
        assert!(stored.can_edit_booking("b1", Utc::now()));
        assert_eq!(db.access().list().await.unwrap().len(), 1);
    }
}
