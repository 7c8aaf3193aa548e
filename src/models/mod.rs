pub mod dining;
pub mod reservation;
pub mod restaurant;
pub mod user;

pub use dining::DiningArea;
pub use reservation::{PaymentMethod, Reservation, ReservationStatus};
pub use restaurant::Restaurant;
pub use user::{User, UserRole};
