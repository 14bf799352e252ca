//! PostgreSQL implementation of the work store.
//!
//! ## Database Tables
//!
//! - `works`, `instances` (`work_id`), `items` (`instance_id`),
//!   `access_reports` (`item_id`): the work hierarchy
//! - `agents`, `aliases` (`agent_id`), `subjects`, `identifiers`,
//!   `identifier_values` (`identifier_id`), `links`, `measurements`,
//!   `dates`, `alt_titles`: shared entity tables
//! - `<owner>_<entity>` join tables (`work_agents`, `item_links`,
//!   `access_report_measurements`, ...) keyed by `<owner>_id` and
//!   `<entity>_id`; agent join tables also carry `role`

mod work_store;

pub use work_store::PostgresWorkStore;
