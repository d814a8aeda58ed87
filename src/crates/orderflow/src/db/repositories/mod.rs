//! Repository pattern implementations for database access
//!
//! Repositories are stateless and take any sqlx executor, so the workflow
//! engine can run several of them inside one transaction.

pub mod entity_repo;
pub mod history_repo;
pub mod location_repo;
pub mod settings_repo;

pub use entity_repo::EntityRepository;
pub use history_repo::HistoryRepository;
pub use location_repo::LocationRepository;
pub use settings_repo::SettingsRepository;
