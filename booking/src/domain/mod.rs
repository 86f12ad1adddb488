//! Domain types shared by the workflow, activities and stores.

mod errors;
mod flight;
mod order;
mod seat;

pub use errors::DomainError;
pub use flight::{Flight, FlightWithSeats, SeatMap};
pub use order::{Order, OrderStatus};
pub use seat::{Seat, SeatStatus};
