pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod library;
pub mod ordering;
pub mod remote;
pub mod render;
pub mod settings;
pub mod tasks {
    #[cfg(unix)]
    pub mod control;
    pub mod display;
    pub mod player;
}
