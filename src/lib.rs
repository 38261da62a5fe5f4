pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod favorites;
pub mod matcher;
pub mod memory;
pub mod middleware;
pub mod models;
pub mod pantry;
pub mod recipes;
pub mod repository;
pub mod routes;
pub mod seed;
