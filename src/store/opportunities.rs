use super::{allocate_id, write_json_file, DocKind, Store};
use crate::errors::StoreResult;
use crate::models::{NewOpportunity, Opportunity};
use chrono::Utc;

impl Store {
    pub fn create_opportunity(&self, input: NewOpportunity) -> StoreResult<Opportunity> {
        let _lock = self.lock_kind(DocKind::Opportunity)?;
        let id = allocate_id(&self.kind_dir(DocKind::Opportunity))?;
        let now = Utc::now();
        let opportunity = Opportunity {
            id,
            name: input.name,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };
        write_json_file(&self.document_path(DocKind::Opportunity, id), &opportunity)?;
        Ok(opportunity)
    }

    pub fn get_opportunity(&self, id: i64) -> StoreResult<Opportunity> {
        self.read_document(DocKind::Opportunity, id)
    }

    pub fn list_opportunities(&self) -> StoreResult<Vec<Opportunity>> {
        let mut opportunities: Vec<Opportunity> = self
            .load_all::<Opportunity>(DocKind::Opportunity)?
            .into_iter()
            .map(|(_, opportunity)| opportunity)
            .collect();
        opportunities.sort_by_key(|opportunity| opportunity.id);
        Ok(opportunities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_and_list_opportunities() {
        let root = tempfile::tempdir().expect("temp store root");
        let store = Store::open(root.path()).expect("store opens");

        let first = store
            .create_opportunity(NewOpportunity {
                name: "Plugin API".to_string(),
                notes: "ask around".to_string(),
            })
            .expect("first");
        let second = store
            .create_opportunity(NewOpportunity {
                name: "Docs site".to_string(),
                notes: String::new(),
            })
            .expect("second");

        assert_eq!(first.id, 1);
        assert_eq!(first.created_at, first.updated_at);
        assert_eq!(store.get_opportunity(2).expect("get"), second);
        assert!(store.get_opportunity(3).expect_err("missing").is_not_found());

        let listed = store.list_opportunities().expect("list");
        assert_eq!(listed, vec![first, second]);
    }
}
