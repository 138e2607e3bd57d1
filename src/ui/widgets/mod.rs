pub mod loading_bar;
pub mod thumbnail;
