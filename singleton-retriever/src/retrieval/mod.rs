pub mod analyzer;
pub mod change_detector;
pub mod chunking_strategy;
pub mod directory_watcher;
pub mod file_kind;
pub mod indexing_engine;
pub mod path_filter;
