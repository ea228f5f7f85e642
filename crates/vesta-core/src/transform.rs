use crate::models::{CatalogEntity, LocalizedString, ResolvedProduct, SearchRecord};

/// Builds the search record for a catalog product.
///
/// Variants keep their order, optional fields stay absent, and `category_names` is taken as
/// already aligned with `entity.category_ids`.
pub fn transform(
    entity: CatalogEntity,
    type_name: String,
    category_names: Vec<LocalizedString>,
) -> SearchRecord {
    SearchRecord {
        object_id: entity.id,
        key: entity.key,
        type_name,
        name: entity.name,
        description: entity.description,
        category_names,
        variants: entity.variants,
        master_variant: entity.master_variant,
    }
}

impl From<ResolvedProduct> for SearchRecord {
    fn from(resolved: ResolvedProduct) -> Self {
        transform(resolved.entity, resolved.type_name, resolved.category_names)
    }
}
