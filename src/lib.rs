pub mod cancel;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fs_util;
pub mod geo;
pub mod layout;
pub mod manifest;
pub mod oracle;
pub mod output;
pub mod stages;
pub mod table;
