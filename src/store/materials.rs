use super::RecordStore;
use crate::core::{Material, MaterialPatch, NewMaterial, RecordId, Result, StoreError};
use crate::query::{self, MaterialFilter};

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RecordStore {
    pub async fn add_material(&self, draft: NewMaterial) -> Result<Material> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::validation("material name must not be empty"));
        }
        let unit = non_blank(draft.unit).unwrap_or_else(|| self.config().default_unit.clone());
        let specifications = draft.specifications.map(|s| s.trim().to_string());

        self.insert_with(move |id, _| {
            Ok(Material {
                id,
                name,
                specifications,
                unit,
            })
        })
        .await
    }

    pub async fn update_material(
        &self,
        id: RecordId,
        mut patch: MaterialPatch,
    ) -> Result<Option<Material>> {
        if let Some(name) = patch.name.take() {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(StoreError::validation("material name must not be empty"));
            }
            patch.name = Some(name);
        }
        self.update_with(id, move |material: &mut Material, _| {
            patch.apply_to(material);
            Ok(())
        })
        .await
    }

    /// Existing requests keep their copy of the material name.
    pub async fn delete_material(&self, id: RecordId) -> Result<bool> {
        self.remove::<Material>(id).await
    }

    pub async fn material_by_id(&self, id: RecordId) -> Option<Material> {
        self.fetch_one(id).await
    }

    pub async fn all_materials(&self) -> Vec<Material> {
        self.fetch_all().await
    }

    pub async fn filter_materials(&self, filter: &MaterialFilter) -> Vec<Material> {
        self.ready().await;
        query::filter_materials(self.read_state().materials.records(), filter)
    }
}
