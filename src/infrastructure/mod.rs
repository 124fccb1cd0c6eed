// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod ea_repository;
pub mod http_response;
pub mod response_cache;
