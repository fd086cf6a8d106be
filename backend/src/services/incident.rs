//! Incident log for short or damaged deliveries

use std::sync::Arc;

use chrono::NaiveDate;
use shared::{count_per_day, BusinessClock, DailyCount, Incident, NewIncident};

use crate::cache::{keys, ReadThroughCache};
use crate::error::{AppError, AppResult};
use crate::store::{Store, UnitOfWork};

/// Register an incident. Incidents are never edited or removed.
pub async fn register(uow: &mut dyn UnitOfWork, incident: NewIncident) -> AppResult<Incident> {
    let incident = uow.insert_incident(incident).await?;
    tracing::info!(
        incident_id = incident.id,
        movement_id = incident.movement_id,
        order_id = ?incident.order_id,
        details = incident.details.len(),
        "incident registered"
    );
    Ok(incident)
}

/// Incident queries
#[derive(Clone)]
pub struct IncidentService {
    store: Arc<dyn Store>,
    cache: ReadThroughCache,
    clock: BusinessClock,
}

impl IncidentService {
    pub fn new(store: Arc<dyn Store>, cache: ReadThroughCache, clock: BusinessClock) -> Self {
        Self {
            store,
            cache,
            clock,
        }
    }

    pub async fn list_incidents(&self) -> AppResult<Vec<Incident>> {
        let store = self.store.clone();
        self.cache
            .get_or_set(keys::INCIDENTS_ALL, || async move { store.list_incidents().await })
            .await
    }

    pub async fn get(&self, id: i64) -> AppResult<Incident> {
        self.store
            .get_incident(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Incident".to_string()))
    }

    pub async fn by_order(&self, order_id: i64) -> AppResult<Vec<Incident>> {
        self.store.incidents_for_order(order_id).await
    }

    pub async fn by_movement(&self, movement_id: i64) -> AppResult<Vec<Incident>> {
        self.store.incidents_for_movement(movement_id).await
    }

    /// Incidents whose delivery happened on a business-local date
    pub async fn on_date(&self, date: NaiveDate) -> AppResult<Vec<Incident>> {
        let (start, end) = self.clock.day_bounds(date);
        self.store.incidents_between(start, end).await
    }

    /// Incidents per day over the last 30 business days
    pub async fn summary_30_days(&self) -> AppResult<Vec<DailyCount>> {
        let store = self.store.clone();
        let clock = self.clock;
        self.cache
            .get_or_set(keys::INCIDENTS_30_DAYS, || async move {
                let (start, end) = clock.range_bounds(clock.last_days(30));
                let incidents = store.incidents_between(start, end).await?;
                Ok::<_, AppError>(count_per_day(
                    &clock,
                    incidents.iter().map(|i| i.occurred_at),
                ))
            })
            .await
    }
}
