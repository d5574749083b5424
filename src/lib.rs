pub mod app;
pub mod assemble;
pub mod catalog;
pub mod checksum;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod figshare;
pub mod hooks;
pub mod layout;
pub mod output;
pub mod relocate;
