//! Company resolution: find a company by normalized VAT or create it.

use tracing::info;

use carriertrust_core::{CompanyId, NewCompany, VatId};

use crate::store::{RecordStore, StoreError};

pub struct CompanyResolver<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> CompanyResolver<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Return the company registered under `vat_raw`, creating it from `name`
    /// and `country` if none exists. An existing company keeps its stored name
    /// and country.
    pub async fn resolve_company(
        &self,
        name: &str,
        vat_raw: &str,
        country: &str,
    ) -> Result<CompanyId, StoreError> {
        let vat = VatId::normalize(vat_raw);

        if let Some(existing) = self.store.find_company_by_vat(&vat).await? {
            return Ok(existing.id);
        }

        // Another submission may have created it since the lookup; the store
        // returns that row instead of inserting a duplicate.
        let company = self
            .store
            .create_company_or_fetch(NewCompany {
                name: name.to_string(),
                vat,
                country: country.to_string(),
            })
            .await?;
        info!("Resolved company {} ({})", company.id, company.vat);
        Ok(company.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRepository;

    #[tokio::test]
    async fn test_resolve_is_idempotent_and_keeps_first_name() {
        let repo = InMemoryRepository::new();
        let resolver = CompanyResolver::new(&repo);

        let first = resolver
            .resolve_company("Baltic Freight", " lv40003000000 ", "Latvia")
            .await
            .unwrap();
        let second = resolver
            .resolve_company("Renamed Carrier", "LV40003000000", "Estonia")
            .await
            .unwrap();
        assert_eq!(first, second);

        let stored = repo.get_company(&first).await.unwrap().unwrap();
        assert_eq!(stored.name, "Baltic Freight");
        assert_eq!(stored.country, "Latvia");
        assert_eq!(stored.vat.as_str(), "LV40003000000");
    }

    #[tokio::test]
    async fn test_distinct_vats_create_distinct_companies() {
        let repo = InMemoryRepository::new();
        let resolver = CompanyResolver::new(&repo);
        let a = resolver.resolve_company("A", "LV1", "Latvia").await.unwrap();
        let b = resolver.resolve_company("A", "EE1", "Estonia").await.unwrap();
        assert_ne!(a, b);
    }
}
