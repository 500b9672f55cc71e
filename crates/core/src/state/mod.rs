pub mod customers;
pub mod db;
pub mod distribution;
pub mod drafts;
pub mod journalists;
pub mod releases;
pub mod votes;

pub use db::{PressroomDb, PromptUpdate, DEFAULT_DB_PATH};

pub use customers::{CreditEntry, CreditReason, Customer, CustomerManager, NewCustomer};
pub use distribution::{DistributionEntry, DistributionManager, DistributionStatus};
pub use drafts::{Draft, DraftAuthor, DraftEdit, DraftManager, PanelReview};
pub use journalists::{Journalist, JournalistManager, Subscription};
pub use releases::{
    ActionOptions, HistoryEntry, NewRelease, ReleaseManager, ReleaseRequest, Transition,
};
pub use votes::{HeadlineTally, Vote, VoteManager};

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Signed-up customer holding `credits`
    pub fn customer(db: &PressroomDb, credits: i64) -> String {
        CustomerManager::new(db)
            .signup(
                NewCustomer {
                    email: format!("{}@acme.com", uuid::Uuid::new_v4().simple()),
                    company_name: "Acme Corp".to_string(),
                    contact_name: Some("Wile E. Coyote".to_string()),
                },
                credits,
            )
            .unwrap()
            .id
    }

    pub fn order() -> NewRelease {
        NewRelease {
            title: "Rocket Skates launch".to_string(),
            company_name: "Acme Corp".to_string(),
            announcement: "Acme launches Rocket Skates for urban commuters.".to_string(),
            key_facts: "Cuts commute times by 40 percent in a six-week pilot.".to_string(),
            quote_sources: "Wile E. Coyote, Chief Engineer".to_string(),
            target_beats: vec!["Hardware".to_string(), "transport".to_string()],
            ..Default::default()
        }
    }

    /// In-memory database with one submitted release
    pub fn release_fixture() -> (PressroomDb, String) {
        let db = PressroomDb::open_in_memory().unwrap();
        let customer_id = customer(&db, 1);
        let release = ReleaseManager::new(&db).create(&customer_id, order()).unwrap();
        (db, release.id)
    }
}
