// Application layer - Use cases over the readings repository
pub mod chart_service;
pub mod readings_repository;
pub mod station_service;

#[cfg(test)]
pub mod fake_repository;
