//! Notification handlers: map a job to a rendered message and one call to
//! the messaging transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use notifyflow::jobs::{
    boxed, BookingLookup, BookingRecord, HandlerOptions, HandlerRegistry, Job, JobError,
    LookupError, Transport, TransportError,
};

/// Job type tags, as producers enqueue them.
pub mod job_types {
    pub const BOOKING_CONFIRMATION: &str = "booking-confirmation";
    pub const PAYMENT_CONFIRMATION: &str = "payment-confirmation";
    pub const PAYMENT_FAILED: &str = "payment-failed";
}

#[derive(Debug, Deserialize)]
struct BookingConfirmationPayload {
    booking_id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentConfirmationPayload {
    booking_id: String,
    amount_cents: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct PaymentFailedPayload {
    booking_id: String,
    amount_cents: i64,
    currency: String,
    failure_reason: Option<String>,
}

fn parse_payload<T: for<'de> Deserialize<'de>>(job: &Job) -> Result<T, JobError> {
    serde_json::from_value(job.payload.clone())
        .map_err(|e| JobError::new("BAD_PAYLOAD", e.to_string()))
}

fn lookup_error(e: LookupError) -> JobError {
    JobError::new("LOOKUP_FAILED", e.to_string())
}

fn transport_error(e: TransportError) -> JobError {
    match e {
        TransportError::Unavailable(_) => JobError::new("TRANSPORT", e.to_string()),
        TransportError::RateLimited => JobError::new("RATE_LIMIT", e.to_string()),
        // A message the provider refuses outright will not be fixed by
        // sending it again.
        TransportError::Rejected(_) => JobError::new("BAD_PAYLOAD", e.to_string()),
    }
}

fn format_amount(amount_cents: i64, currency: &str) -> String {
    format!("{}.{:02} {}", amount_cents / 100, amount_cents % 100, currency)
}

fn render_booking_confirmation(b: &BookingRecord) -> String {
    format!(
        "Hi {}, your booking {} at {} is confirmed for {}.",
        b.guest_name, b.booking_id, b.property_name, b.check_in
    )
}

fn render_payment_confirmation(b: &BookingRecord, amount: &str) -> String {
    format!(
        "Hi {}, we received your payment of {} for booking {}.",
        b.guest_name, amount, b.booking_id
    )
}

fn render_payment_failed(b: &BookingRecord, amount: &str, reason: Option<&str>) -> String {
    let reason = reason.unwrap_or("the charge was declined");
    format!(
        "Hi {}, your payment of {} for booking {} failed: {}. Please update your payment method.",
        b.guest_name, amount, b.booking_id, reason
    )
}

/// Register every notification handler. Handlers share one shape: parse the
/// payload, resolve the booking, render, send once.
pub fn build_registry() -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();

    registry.register_with_options(
        job_types::BOOKING_CONFIRMATION,
        |job, ctx| {
            boxed(async move {
                let payload: BookingConfirmationPayload = parse_payload(job)?;
                let booking = ctx
                    .bookings
                    .resolve(&payload.booking_id)
                    .await
                    .map_err(lookup_error)?;
                let message = render_booking_confirmation(&booking);
                ctx.transport
                    .send(&booking.guest_email, &message)
                    .await
                    .map_err(transport_error)
            })
        },
        HandlerOptions::new().timeout(Duration::from_secs(10)),
    );

    registry.register_with_options(
        job_types::PAYMENT_CONFIRMATION,
        |job, ctx| {
            boxed(async move {
                let payload: PaymentConfirmationPayload = parse_payload(job)?;
                let booking = ctx
                    .bookings
                    .resolve(&payload.booking_id)
                    .await
                    .map_err(lookup_error)?;
                let amount = format_amount(payload.amount_cents, &payload.currency);
                let message = render_payment_confirmation(&booking, &amount);
                ctx.transport
                    .send(&booking.guest_email, &message)
                    .await
                    .map_err(transport_error)
            })
        },
        HandlerOptions::new().timeout(Duration::from_secs(10)),
    );

    registry.register_with_options(
        job_types::PAYMENT_FAILED,
        |job, ctx| {
            boxed(async move {
                let payload: PaymentFailedPayload = parse_payload(job)?;
                let booking = ctx
                    .bookings
                    .resolve(&payload.booking_id)
                    .await
                    .map_err(lookup_error)?;
                let amount = format_amount(payload.amount_cents, &payload.currency);
                let message =
                    render_payment_failed(&booking, &amount, payload.failure_reason.as_deref());
                ctx.transport
                    .send(&booking.guest_email, &message)
                    .await
                    .map_err(transport_error)
            })
        },
        HandlerOptions::new()
            .max_concurrency(20)
            .timeout(Duration::from_secs(10)),
    );

    Arc::new(registry)
}

/// Transport stand-in that logs instead of calling a provider. Swap in a
/// real provider client behind the same trait in production.
#[derive(Debug, Default, Clone)]
pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&self, destination: &str, message: &str) -> Result<(), TransportError> {
        info!(destination, message, "delivering notification");
        Ok(())
    }
}

/// Fixed booking directory for demos and local runs.
#[derive(Debug, Default, Clone)]
pub struct StaticBookingDirectory {
    bookings: HashMap<String, BookingRecord>,
}

impl StaticBookingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_booking(mut self, record: BookingRecord) -> Self {
        self.bookings.insert(record.booking_id.clone(), record);
        self
    }

    pub fn with_demo_data() -> Self {
        Self::new()
            .with_booking(BookingRecord {
                booking_id: "B1".to_string(),
                guest_name: "Ada".to_string(),
                guest_email: "ada@example.com".to_string(),
                property_name: "Seaside Cottage".to_string(),
                check_in: "2026-09-01".to_string(),
            })
            .with_booking(BookingRecord {
                booking_id: "B2".to_string(),
                guest_name: "Grace".to_string(),
                guest_email: "grace@example.com".to_string(),
                property_name: "Harbor Loft".to_string(),
                check_in: "2026-09-14".to_string(),
            })
    }
}

#[async_trait]
impl BookingLookup for StaticBookingDirectory {
    async fn resolve(&self, booking_id: &str) -> Result<BookingRecord, LookupError> {
        self.bookings
            .get(booking_id)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(booking_id.to_string()))
    }
}
