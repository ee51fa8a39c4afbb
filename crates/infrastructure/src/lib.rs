//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_access_event_repository;
mod in_memory_rule_repository;
mod postgres_access_event_repository;
mod postgres_rule_repository;

pub use in_memory_access_event_repository::InMemoryAccessEventRepository;
pub use in_memory_rule_repository::InMemoryRuleRepository;
pub use postgres_access_event_repository::PostgresAccessEventRepository;
pub use postgres_rule_repository::PostgresRuleRepository;
