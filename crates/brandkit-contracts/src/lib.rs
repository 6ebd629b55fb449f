pub mod archive;
pub mod assets;
pub mod chat;
pub mod events;
pub mod jobs;
pub mod runs;
