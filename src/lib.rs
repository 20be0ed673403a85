pub mod config;
pub mod error;
pub mod feedback;
pub mod fetchers;
pub mod models;
pub mod parsers;
pub mod scrapers;
pub mod storage;
pub mod table;
