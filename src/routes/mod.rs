pub mod activity_logs;
pub mod auth;
pub mod awards_recognitions;
pub mod bids_awards;
pub mod context;
pub mod files;
pub mod full_disclosures;
pub mod health;
pub mod listing;
pub mod news;
pub mod ordinance_resolutions;
pub mod resource;
pub mod sb_members;
pub mod tourism_packages;
pub mod trash;
pub mod users;
