// Domain layer - Pure reading/window/chart logic, no I/O
pub mod aggregation;
pub mod chart;
pub mod partition;
pub mod reading;
pub mod units;
pub mod window;
