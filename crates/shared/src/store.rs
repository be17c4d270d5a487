use anyhow::Result;
use async_trait::async_trait;

use crate::{
    domain::{EntityKind, RecordId},
    record::{FieldValues, Record},
};

/// Persistence seam for the generic record workflow.
///
/// `search` is a case-sensitive substring matched against the entity's
/// searchable field; `None` means no filter. Results are ordered by id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn count(&self, kind: EntityKind, search: Option<&str>) -> Result<u64>;
    async fn list(
        &self,
        kind: EntityKind,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Record>>;
    async fn get(&self, kind: EntityKind, id: RecordId) -> Result<Option<Record>>;
    async fn insert(&self, kind: EntityKind, values: &FieldValues) -> Result<RecordId>;
    /// Overwrites every schema field of an existing record. Returns `false`
    /// when no record with that id exists.
    async fn update(&self, kind: EntityKind, id: RecordId, values: &FieldValues) -> Result<bool>;
}
