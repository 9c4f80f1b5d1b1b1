use super::ReportStore;
use crate::report::{FieldValue, TestReport};
use anyhow::Result;
use bson::oid::ObjectId;
use std::collections::BTreeMap;

/// In-process store. Natural order is insertion order.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: BTreeMap<String, Vec<TestReport>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }

    pub fn contains(&self, collection: &str, id: &ObjectId) -> bool {
        self.collections
            .get(collection)
            .is_some_and(|docs| docs.iter().any(|d| d.id.as_ref() == Some(id)))
    }
}

impl ReportStore for MemoryStore {
    fn insert_many(&mut self, collection: &str, reports: Vec<TestReport>) -> Result<Vec<ObjectId>> {
        let docs = self.collections.entry(collection.to_string()).or_default();
        let mut ids = Vec::with_capacity(reports.len());
        for mut r in reports {
            ids.push(*r.id.get_or_insert_with(ObjectId::new));
            docs.push(r);
        }
        Ok(ids)
    }

    fn find_all(&self, collection: &str) -> Result<Vec<TestReport>> {
        Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }

    fn find_by_owner(&self, collection: &str, owner: &str) -> Result<Vec<TestReport>> {
        Ok(self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| d.test_owner.as_ref().and_then(FieldValue::as_text) == Some(owner))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete_by_id(&mut self, collection: &str, id: &ObjectId) -> Result<u64> {
        let Some(docs) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|d| d.id.as_ref() == Some(id)) {
            Some(pos) => {
                docs.remove(pos);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
