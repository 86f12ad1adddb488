use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatStatus {
    #[serde(rename = "available")]
    Available,
    #[serde(rename = "reserved")]
    Reserved,
    #[serde(rename = "booked")]
    Booked,
}

impl SeatStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(SeatStatus::Available),
            "reserved" => Some(SeatStatus::Reserved),
            "booked" => Some(SeatStatus::Booked),
            _ => None,
        }
    }
}

/// One seat on a flight. The id is the seat code (`12A`); (flight_id, id) is
/// the primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: String,
    pub flight_id: String,
    pub row_num: i32,
    pub col: String,
    pub status: SeatStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
