pub mod app;
pub mod config;
pub mod container;
pub mod error;
pub mod library;
pub mod locale;
pub mod matching;
pub mod metadata;
pub mod tvdb;
