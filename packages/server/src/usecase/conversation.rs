//! UseCase: 会話の解決
//!
//! Turns a (patient, doctor) pair into a room key and an access decision.
//! The decision is fetched from the appointment store on every call and
//! never cached, so a status change is honoured by the very next send.

use std::{sync::Arc, time::Duration};

use crate::domain::{AccessDecision, AppointmentStore, RoomKey, UserId};

use super::error::{ChatError, with_timeout};

pub struct ConversationResolver {
    appointments: Arc<dyn AppointmentStore>,
    timeout: Duration,
}

impl ConversationResolver {
    pub fn new(appointments: Arc<dyn AppointmentStore>, timeout: Duration) -> Self {
        Self {
            appointments,
            timeout,
        }
    }

    /// Deterministic room key for the pair. Pure, never fails.
    pub fn resolve_room(a: &UserId, b: &UserId) -> RoomKey {
        RoomKey::for_pair(a, b)
    }

    /// Current access decision for the conversation.
    ///
    /// # Errors
    ///
    /// * `NoAppointmentFound` - the pair never had an appointment
    /// * `PersistenceError` / `Timeout` - the appointment store failed or stalled
    pub async fn access_mode(
        &self,
        patient: &UserId,
        doctor: &UserId,
    ) -> Result<AccessDecision, ChatError> {
        let record = with_timeout(
            self.timeout,
            self.appointments.get_latest_appointment(patient, doctor),
        )
        .await?
        .ok_or(ChatError::NoAppointmentFound)?;

        let decision = AccessDecision::from_status(record.status());
        tracing::debug!(
            "Access for {} / {}: {:?} (status {})",
            patient,
            doctor,
            decision.mode,
            decision.appointment_status
        );
        Ok(decision)
    }
}
