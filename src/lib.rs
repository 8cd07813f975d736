pub mod carousel;
pub mod config;
pub mod events;
pub mod renderer;
pub mod tasks {
    pub mod files;
    pub mod loader;
    pub mod viewer;
}
