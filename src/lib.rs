#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;

pub mod browser_controller;
pub mod capture;
pub mod dispatcher;
pub mod fetcher;
pub mod output;
pub mod reader;
pub mod report;
pub mod results;
pub mod runner;
pub mod types;
pub mod utils;
