//! Post-commit booking side effects.
//!
//! After a booking commits, the requester and the driveway owner each get an in-app
//! notification, and the requester gets a confirmation email. Both are best effort: failures
//! are logged and never surface to the caller, and nothing is retried.

use std::sync::Arc;

use crate::{
    db::models::{
        bookings::BookingDBResponse,
        driveways::DrivewayDBResponse,
        notifications::{NotificationCreateDBRequest, NotificationKind},
        users::UserDBResponse,
    },
    email::{BookingConfirmation, EmailService},
    storage::BookingStore,
};

#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn BookingStore>,
    email: Option<Arc<EmailService>>,
    currency: String,
}

impl Notifier {
    pub fn new(store: Arc<dyn BookingStore>, email: Option<Arc<EmailService>>, currency: impl Into<String>) -> Self {
        Self {
            store,
            email,
            currency: currency.into(),
        }
    }

    /// Dispatch the notifications and confirmation email for a freshly committed booking.
    #[tracing::instrument(skip_all, fields(booking_id = %booking.id))]
    pub async fn booking_created(&self, booking: &BookingDBResponse, driveway: &DrivewayDBResponse, requester: &UserDBResponse) {
        let requests = booking_notifications(booking, driveway);
        match self.store.create_notifications(&requests).await {
            Ok(created) => tracing::debug!("Created {} booking notifications", created.len()),
            Err(e) => tracing::warn!(error = %e, "Failed to create booking notifications"),
        }

        let Some(email) = &self.email else {
            return;
        };

        let confirmation = BookingConfirmation {
            booking_id: booking.id,
            driveway_title: &driveway.title,
            driveway_address: &driveway.address,
            start_time: booking.start_time,
            end_time: booking.end_time,
            total_price: booking.total_price,
            currency: &self.currency,
        };
        if let Err(e) = email
            .send_booking_confirmation(&requester.email, requester.name.as_deref(), &confirmation)
            .await
        {
            tracing::warn!(error = %e, "Failed to send booking confirmation email");
        }
    }
}

/// One notification for the requester and one for the driveway owner
pub fn booking_notifications(booking: &BookingDBResponse, driveway: &DrivewayDBResponse) -> Vec<NotificationCreateDBRequest> {
    let window = format!(
        "{} to {}",
        booking.start_time.format("%Y-%m-%d %H:%M UTC"),
        booking.end_time.format("%Y-%m-%d %H:%M UTC")
    );

    vec![
        NotificationCreateDBRequest {
            user_id: booking.user_id,
            kind: NotificationKind::BookingCreated,
            title: "Booking created".to_string(),
            message: format!("Your booking for {} from {} is pending confirmation.", driveway.title, window),
            booking_id: Some(booking.id),
        },
        NotificationCreateDBRequest {
            user_id: driveway.owner_id,
            kind: NotificationKind::BookingRequest,
            title: "New booking request".to_string(),
            message: format!("{} has a new booking request from {}.", driveway.title, window),
            booking_id: Some(booking.id),
        },
    ]
}
