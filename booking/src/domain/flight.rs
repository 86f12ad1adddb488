use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A flight in the catalog. `available_seats` is an advisory counter kept for
/// display; admission control always goes through the seat rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub id: String,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub total_seats: i32,
    pub available_seats: i32,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A flight together with its assembled seat map, as served to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightWithSeats {
    #[serde(flatten)]
    pub flight: Flight,
    pub seat_map: SeatMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMap {
    pub rows: i32,
    pub seats_per_row: i32,
    pub seats: Vec<super::Seat>,
}
