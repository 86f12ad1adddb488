//! Client facade: everything the HTTP layer needs to drive bookings.
//!
//! Starts workflow instances, sends the three booking signals, and serves the
//! `booking-status` projection. The projection reads the authoritative order
//! row rather than a workflow query: the activities keep the row current at
//! every observable transition, and closed workflows stay queryable that way
//! for free.

use chrono::{Duration as ChronoDuration, Utc};
use log::info;
use sqlx::PgPool;
use temporal_client::{Client, RetryClient, WorkflowClientTrait, WorkflowOptions};
use temporal_sdk_core_protos::coresdk::AsJsonPayloadExt;
use temporal_sdk_core_protos::temporal::api::common::v1::Payloads;
use uuid::Uuid;

use crate::activities::is_valid_payment_code;
use crate::config::Config;
use crate::domain::{DomainError, Flight, FlightWithSeats, OrderStatus, SeatMap, SeatStatus};
use crate::signals::{
    BookingStatusResponse, BookingWorkflowInput, PaymentSignal, SeatUpdateSignal,
    SIGNAL_CANCEL_BOOKING, SIGNAL_PROCEED_TO_PAYMENT, SIGNAL_UPDATE_SEATS,
};
use crate::store::{FlightRepo, OrderRepo, SeatLockRepo, StoreError};
use crate::workflow::{workflow_id, BOOKING_WORKFLOW_TYPE};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("workflow service error: {0}")]
    Workflow(#[from] anyhow::Error),
}

/// Result of starting a booking. `expires_at` is the optimistic deadline; the
/// workflow's `create_order` activity writes the authoritative value moments
/// later.
#[derive(Debug, Clone)]
pub struct CreateOrderOutput {
    pub order_id: String,
    pub workflow_id: String,
    pub status: OrderStatus,
    pub expires_at: chrono::DateTime<Utc>,
}

pub struct BookingClient {
    temporal: RetryClient<Client>,
    task_queue: String,
    hold_seconds: u64,
    orders: OrderRepo,
    flights: FlightRepo,
    seat_locks: SeatLockRepo,
}

impl BookingClient {
    pub fn new(
        temporal: RetryClient<Client>,
        cfg: &Config,
        pool: PgPool,
        redis: redis::Client,
    ) -> Self {
        Self {
            temporal,
            task_queue: cfg.temporal.task_queue.clone(),
            hold_seconds: cfg.booking.seat_hold.as_secs(),
            orders: OrderRepo::new(pool.clone()),
            flights: FlightRepo::new(pool),
            seat_locks: SeatLockRepo::new(redis),
        }
    }

    /// All flights in the catalog, soonest departure first.
    pub async fn list_flights(&self) -> Result<Vec<Flight>, ClientError> {
        Ok(self.flights.list_all().await?)
    }

    /// A flight with its seat map, overlaying live lock entries so seats that
    /// are locked but not yet reserved in the rows already show as taken.
    pub async fn flight_with_seats(&self, flight_id: &str) -> Result<FlightWithSeats, ClientError> {
        let flight = self.flights.find_by_id(flight_id).await?;
        let mut seats = self.flights.find_seats(flight_id).await?;
        let locked = self.seat_locks.locked_seats(flight_id).await?;

        for seat in &mut seats {
            if seat.status == SeatStatus::Available && locked.contains_key(&seat.id) {
                seat.status = SeatStatus::Reserved;
            }
        }

        let rows = seats.iter().map(|s| s.row_num).max().unwrap_or(0);
        let seats_per_row = seats.iter().filter(|s| s.row_num == 1).count() as i32;

        Ok(FlightWithSeats {
            flight,
            seat_map: SeatMap {
                rows,
                seats_per_row,
                seats,
            },
        })
    }

    /// Validate the request, mint the order id and start the booking
    /// workflow. The order row itself is created by the workflow's first
    /// activity.
    pub async fn create_order(
        &self,
        flight_id: &str,
        seats: Vec<String>,
    ) -> Result<CreateOrderOutput, ClientError> {
        if seats.is_empty() {
            return Err(DomainError::EmptySeatSelection.into());
        }
        self.flights.find_by_id(flight_id).await?;

        let order_id = Uuid::new_v4().to_string();
        let wf_id = workflow_id(&order_id);
        let input = BookingWorkflowInput {
            order_id: order_id.clone(),
            flight_id: flight_id.to_string(),
            seats,
            hold_seconds: self.hold_seconds,
        };

        self.temporal
            .start_workflow(
                vec![input.as_json_payload().map_err(ClientError::Workflow)?],
                self.task_queue.clone(),
                wf_id.clone(),
                BOOKING_WORKFLOW_TYPE.to_string(),
                None,
                WorkflowOptions::default(),
            )
            .await
            .map_err(|e| ClientError::Workflow(e.into()))?;

        info!("started booking workflow {wf_id} on flight {flight_id}");
        Ok(CreateOrderOutput {
            order_id,
            workflow_id: wf_id,
            status: OrderStatus::SeatsReserved,
            expires_at: Utc::now() + ChronoDuration::seconds(self.hold_seconds as i64),
        })
    }

    /// Signal a new seat selection. Empty selections are rejected here; the
    /// workflow itself would accept one as "release everything".
    pub async fn update_seats(
        &self,
        order_id: &str,
        seats: Vec<String>,
    ) -> Result<(), ClientError> {
        if seats.is_empty() {
            return Err(DomainError::EmptySeatSelection.into());
        }
        self.signal(
            order_id,
            SIGNAL_UPDATE_SEATS,
            Some(SeatUpdateSignal { seats }.as_json_payload().map_err(ClientError::Workflow)?),
        )
        .await
    }

    /// Submit a payment code. Format problems are caught here so an obviously
    /// bad code never burns one of the workflow's three attempts.
    pub async fn submit_payment(&self, order_id: &str, payment_code: &str) -> Result<(), ClientError> {
        if !is_valid_payment_code(payment_code) {
            return Err(DomainError::InvalidPaymentCode.into());
        }
        self.signal(
            order_id,
            SIGNAL_PROCEED_TO_PAYMENT,
            Some(
                PaymentSignal {
                    payment_code: payment_code.to_string(),
                }
                .as_json_payload()
                .map_err(ClientError::Workflow)?,
            ),
        )
        .await
    }

    /// Cancel the booking. The workflow fails the order and releases seats.
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), ClientError> {
        self.signal(order_id, SIGNAL_CANCEL_BOOKING, None).await
    }

    /// Serve the `booking-status` projection from the order row.
    pub async fn order_status(&self, order_id: &str) -> Result<BookingStatusResponse, ClientError> {
        let order = self.orders.find_by_id(order_id).await?;

        let timer_remaining = match (order.is_terminal(), order.expires_at) {
            (false, Some(expires_at)) => (expires_at - Utc::now()).num_seconds().max(0),
            _ => 0,
        };

        Ok(BookingStatusResponse {
            order_id: order.id,
            flight_id: order.flight_id,
            status: order.status,
            seats: order.seats,
            expires_at: order.expires_at,
            timer_remaining,
            payment_attempts: order.payment_attempts,
            last_error: order.failure_reason,
        })
    }

    async fn signal(
        &self,
        order_id: &str,
        signal_name: &str,
        payload: Option<temporal_sdk_core_protos::temporal::api::common::v1::Payload>,
    ) -> Result<(), ClientError> {
        let input = payload.map(|p| Payloads { payloads: vec![p] });
        self.temporal
            .signal_workflow_execution(
                workflow_id(order_id),
                String::new(),
                signal_name.to_string(),
                input,
                None,
            )
            .await
            .map_err(|e| ClientError::Workflow(e.into()))?;
        info!("sent {signal_name} to order {order_id}");
        Ok(())
    }
}
