mod memory;
mod model;
mod repo;

pub use memory::InMemoryUserStore;
pub use model::{NewUser, Provider, PublicUser, Role, User};
pub use repo::{PgUserStore, StoreError, UserStore};
