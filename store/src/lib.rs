pub mod memory;
pub mod store;
pub mod types;

pub use memory::MemoryStore;
pub use store::{Page, Store, StoreError};
pub use types::{
    Form, Integration, IntegrationKind, IntegrationLog, LogStatus, Owner, RequestMeta, Submission,
    current_month, new_id, new_slug,
};
