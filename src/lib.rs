#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod cover;
pub mod dom;
pub mod epub;
pub mod error;
pub mod fields;
pub mod http;
pub mod journal;
pub mod language;
pub mod logging;
pub mod metadata;
pub mod normalize;
pub mod resources;
pub mod sites;
pub mod story;
pub mod title_page;
pub mod walker;
pub mod xhtml;
