use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, instrument};

use crate::api::CatalogApi;
use crate::error::{AppError, ResolveError, SubResource};
use crate::models::ResolvedProduct;

/// Fetches a product and the names of the resources it references.
///
/// The product is fetched first; its type and categories are then fetched concurrently.
/// Nothing is cached and nothing is retried here.
#[derive(Clone)]
pub struct EntityResolver {
    catalog: Arc<dyn CatalogApi>,
}

impl EntityResolver {
    pub fn new(catalog: Arc<dyn CatalogApi>) -> Self {
        Self { catalog }
    }

    /// Resolves `entity_id` into a [`ResolvedProduct`].
    ///
    /// # Errors
    ///
    /// * `ResolveError::EntityNotFound` - the catalog reports the product as missing
    /// * `ResolveError::SubResourceFailure` - any other failure, tagged with the resource
    ///   (product, product type or category) that could not be fetched
    #[instrument(skip(self))]
    pub async fn resolve(&self, entity_id: &str) -> Result<ResolvedProduct, ResolveError> {
        let catalog = self.catalog.as_ref();

        let entity = catalog.get_product(entity_id).await.map_err(|e| match e {
            AppError::NotFound(_) => ResolveError::EntityNotFound(entity_id.to_string()),
            cause => ResolveError::sub_resource(SubResource::Product, entity_id, cause),
        })?;

        let type_name = async {
            catalog
                .get_product_type(&entity.type_id)
                .await
                .map(|product_type| product_type.name)
                .map_err(|cause| {
                    ResolveError::sub_resource(SubResource::ProductType, &entity.type_id, cause)
                })
        };

        let category_names = try_join_all(entity.category_ids.iter().map(|id| async move {
            catalog
                .get_category(id)
                .await
                .map(|category| category.name)
                .map_err(|cause| ResolveError::sub_resource(SubResource::Category, id, cause))
        }));

        let (type_name, category_names) = futures::try_join!(type_name, category_names)?;

        debug!(
            type_name = %type_name,
            categories = category_names.len(),
            variants = entity.variants.len(),
            "Resolved product"
        );

        Ok(ResolvedProduct {
            entity,
            type_name,
            category_names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogEntity, Category, LocalizedString, ProductType, Variant};
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn localized(text: &str) -> LocalizedString {
        LocalizedString::from([("en-US".to_string(), text.to_string())])
    }

    fn product(id: &str, category_ids: &[&str]) -> CatalogEntity {
        CatalogEntity {
            id: id.to_string(),
            key: None,
            type_id: "t1".to_string(),
            name: localized("Shirt"),
            description: None,
            category_ids: category_ids.iter().map(|c| c.to_string()).collect(),
            variants: vec![],
            master_variant: Variant {
                id: 1,
                sku: None,
                prices: vec![],
                attributes: vec![],
            },
        }
    }

    #[derive(Default)]
    struct FakeCatalog {
        products: HashMap<String, CatalogEntity>,
        categories: HashMap<String, String>,
        fail_product: bool,
        fail_type: bool,
    }

    #[async_trait]
    impl CatalogApi for FakeCatalog {
        async fn get_product(&self, id: &str) -> Result<CatalogEntity, AppError> {
            if self.fail_product {
                return Err(AppError::Timeout(30));
            }
            self.products
                .get(id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("products/{id}")))
        }

        async fn get_product_type(&self, id: &str) -> Result<ProductType, AppError> {
            if self.fail_type {
                return Err(AppError::NetworkError("reset".to_string()));
            }
            Ok(ProductType {
                id: id.to_string(),
                name: "Apparel".to_string(),
            })
        }

        async fn get_category(&self, id: &str) -> Result<Category, AppError> {
            self.categories
                .get(id)
                .map(|name| Category {
                    id: id.to_string(),
                    name: localized(name),
                })
                .ok_or_else(|| AppError::NotFound(format!("categories/{id}")))
        }
    }

    fn catalog_with(product: CatalogEntity) -> FakeCatalog {
        let mut catalog = FakeCatalog::default();
        catalog.categories.insert("c1".into(), "Men".into());
        catalog.categories.insert("c2".into(), "Shirts".into());
        catalog.products.insert(product.id.clone(), product);
        catalog
    }

    #[tokio::test]
    async fn test_resolve_keeps_category_order() {
        let catalog = catalog_with(product("p1", &["c2", "c1"]));
        let resolver = EntityResolver::new(Arc::new(catalog));

        let resolved = resolver.resolve("p1").await.unwrap();
        assert_eq!(resolved.type_name, "Apparel");
        assert_eq!(
            resolved.category_names,
            vec![localized("Shirts"), localized("Men")]
        );
    }

    #[tokio::test]
    async fn test_resolve_without_categories() {
        let catalog = catalog_with(product("p1", &[]));
        let resolved = EntityResolver::new(Arc::new(catalog))
            .resolve("p1")
            .await
            .unwrap();
        assert!(resolved.category_names.is_empty());
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let resolver = EntityResolver::new(Arc::new(FakeCatalog::default()));
        let err = resolver.resolve("ghost").await.unwrap_err();
        assert!(matches!(err, ResolveError::EntityNotFound(ref id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_product_transport_failure_is_sub_resource_failure() {
        let mut catalog = catalog_with(product("p1", &[]));
        catalog.fail_product = true;
        let err = EntityResolver::new(Arc::new(catalog))
            .resolve("p1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::SubResourceFailure {
                resource: SubResource::Product,
                cause: AppError::Timeout(30),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_type_failure_names_product_type() {
        let mut catalog = catalog_with(product("p1", &["c1"]));
        catalog.fail_type = true;
        let err = EntityResolver::new(Arc::new(catalog))
            .resolve("p1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::SubResourceFailure {
                resource: SubResource::ProductType,
                ref id,
                ..
            } if id == "t1"
        ));
    }

    #[tokio::test]
    async fn test_missing_category_names_category() {
        let catalog = catalog_with(product("p1", &["c1", "gone"]));
        let err = EntityResolver::new(Arc::new(catalog))
            .resolve("p1")
            .await
            .unwrap_err();
        match err {
            ResolveError::SubResourceFailure {
                resource, id, cause, ..
            } => {
                assert_eq!(resource, SubResource::Category);
                assert_eq!(id, "gone");
                assert!(matches!(cause, AppError::NotFound(_)));
            }
            other => panic!("expected category failure, got {other:?}"),
        }
    }
}
