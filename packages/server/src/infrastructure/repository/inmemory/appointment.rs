//! In-memory appointment store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{AppointmentRecord, AppointmentStore, RepositoryError, Timestamp, UserId};

/// Appointments keyed by (patient, doctor). Every record is kept; lookups
/// return the one with the latest `updated_at`.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<(UserId, UserId), Vec<AppointmentRecord>>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an appointment (or a status change) between the pair.
    pub async fn record_appointment(
        &self,
        patient: UserId,
        doctor: UserId,
        status: Option<String>,
        updated_at: Timestamp,
    ) {
        tracing::debug!(
            "Recording appointment {} -> {} with status {:?}",
            patient,
            doctor,
            status
        );
        let mut appointments = self.appointments.write().await;
        appointments
            .entry((patient, doctor))
            .or_default()
            .push(AppointmentRecord::new(status, updated_at));
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get_latest_appointment(
        &self,
        patient: &UserId,
        doctor: &UserId,
    ) -> Result<Option<AppointmentRecord>, RepositoryError> {
        let appointments = self.appointments.read().await;
        let latest = appointments
            .get(&(patient.clone(), doctor.clone()))
            .and_then(|records| records.iter().max_by_key(|r| r.updated_at))
            .cloned();
        Ok(latest)
    }
}
