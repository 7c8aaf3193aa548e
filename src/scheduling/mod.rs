pub mod availability;
pub mod slots;
