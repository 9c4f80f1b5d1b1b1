use super::ReportStore;
use crate::{
    config,
    report::{ID_FIELD, TEST_OWNER, TestReport},
};
use anyhow::{Context, Result};
use bson::{Document, doc, oid::ObjectId};
use mongodb::sync::{Client, Collection, Database};
use tracing::{debug, info};

pub struct MongoStore {
    client: Option<Client>,
    db: Database,
}

impl MongoStore {
    /// Opens the client and pings the server so connectivity problems
    /// surface before any branch runs.
    pub fn connect(cfg: &config::Store) -> Result<Self> {
        let client = Client::with_uri_str(&cfg.uri)
            .with_context(|| format!("connecting to {}", cfg.uri))?;
        let db = client.database(&cfg.database);
        db.run_command(doc! { "ping": 1 }, None)
            .with_context(|| format!("ping {} ({})", cfg.uri, cfg.database))?;
        info!("connected uri={} database={}", cfg.uri, cfg.database);
        Ok(Self {
            client: Some(client),
            db,
        })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }

    fn collect(&self, collection: &str, filter: Option<Document>) -> Result<Vec<TestReport>> {
        let cursor = self
            .collection(collection)
            .find(filter, None)
            .with_context(|| format!("find in {collection}"))?;
        let mut out = Vec::new();
        for doc in cursor {
            let doc = doc.with_context(|| format!("reading cursor of {collection}"))?;
            out.push(TestReport::from_document(doc)?);
        }
        Ok(out)
    }
}

impl ReportStore for MongoStore {
    fn insert_many(&mut self, collection: &str, reports: Vec<TestReport>) -> Result<Vec<ObjectId>> {
        if reports.is_empty() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::with_capacity(reports.len());
        let docs: Vec<Document> = reports
            .into_iter()
            .map(|mut r| {
                let id = *r.id.get_or_insert_with(ObjectId::new);
                ids.push(id);
                r.to_document()
            })
            .collect();
        let res = self
            .collection(collection)
            .insert_many(docs, None)
            .with_context(|| format!("insert_many into {collection}"))?;
        debug!("inserted {} documents into {collection}", res.inserted_ids.len());
        Ok(ids)
    }

    fn find_all(&self, collection: &str) -> Result<Vec<TestReport>> {
        self.collect(collection, None)
    }

    fn find_by_owner(&self, collection: &str, owner: &str) -> Result<Vec<TestReport>> {
        self.collect(collection, Some(doc! { TEST_OWNER: owner }))
    }

    fn delete_by_id(&mut self, collection: &str, id: &ObjectId) -> Result<u64> {
        let res = self
            .collection(collection)
            .delete_one(doc! { ID_FIELD: *id }, None)
            .with_context(|| format!("delete {id} from {collection}"))?;
        Ok(res.deleted_count)
    }
}

impl Drop for MongoStore {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            debug!("closing client for database {}", self.db.name());
            client.shutdown();
        }
    }
}
