pub mod removed_posts;
pub mod thread;
