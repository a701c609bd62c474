pub mod app;
pub mod assets;
pub mod background;
pub mod broadcast;
pub mod bubble;
pub mod cli;
pub mod config;
pub mod coral;
pub mod entity;
pub mod fish;
pub mod input;
pub mod logging;
pub mod math;
pub mod render;
pub mod scene;
pub mod sprite;
pub mod upload;
