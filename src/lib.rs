pub mod app;
pub mod favorites;
pub mod listing;
pub mod models;
pub mod render;
pub mod tmdb;
pub mod views;
