pub mod settlement;
pub mod stripe;
