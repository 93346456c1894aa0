pub mod identity;
pub mod memory;
pub mod postgres;

pub use identity::{
    IdentityFilter, IdentityStore, IdentityUnitOfWork, StagedChange, StoreError, UniqueField,
};
pub use memory::InMemoryIdentityStore;
pub use postgres::PgIdentityStore;
