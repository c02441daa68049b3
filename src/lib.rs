pub mod config;
pub mod data;
pub mod db;
pub mod discover;
pub mod filter;
pub mod journal;
