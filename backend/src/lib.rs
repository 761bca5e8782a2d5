pub mod cache;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod inference;
pub mod preprocess;
pub mod routes;
pub mod selector;

#[cfg(test)]
mod test_fixtures;
