pub mod activity_log;
pub mod awards_recognition;
pub mod bids_award;
pub mod full_disclosure;
pub mod news;
pub mod ordinance_resolution;
pub mod sb_member;
pub mod tourism_package;
pub mod user;
