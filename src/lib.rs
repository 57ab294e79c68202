pub mod app;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod extract;
pub mod inchikey;
pub mod merge;
pub mod model;
pub mod notation;
pub mod output;
pub mod source;
pub mod store;
pub mod unichem;
pub mod xref;
