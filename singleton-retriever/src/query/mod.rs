//! Read path: query classification and ranked search

pub mod router;
pub mod search_engine;
