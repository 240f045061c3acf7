//! Service layer for channel configuration.
//! - `storage`: the key-value contract, its drivers and the facade owning the active one.
//! - `config_repo`: typed per-scope records on top of compound store keys.
//! - `service_cache` / `project_client`: lazily built API handles per workspace/project.
//! - `scope_context`: joins the two for request handling.

pub mod errors;
pub mod storage;
pub mod config_repo;
pub mod service_cache;
pub mod project_client;
pub mod scope_context;

pub use config_repo::{Actor, ConfigRepository, ScopeConfig};
pub use errors::ServiceError;
pub use project_client::ProjectClient;
pub use scope_context::{ScopeContext, ScopeContextResolver};
pub use service_cache::ServiceCache;
pub use storage::{Backend, KvStore, StorageError, StorageFacade};
