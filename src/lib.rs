pub mod auth;
pub mod config;
pub mod feed;
pub mod filters;
pub mod forms;
pub mod logger;
pub mod models;
pub mod normalize;
pub mod profile;
pub mod storage;
pub mod supabase;
pub mod web;
