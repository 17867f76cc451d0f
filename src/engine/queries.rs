use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::warn;
use ulid::Ulid;

use crate::model::*;

use super::availability::{self, rank_slots, slot_for_table, SlotQuery};
use super::conflict::{earliest_start, validate_request};
use super::{Engine, EngineError};

impl Engine {
    /// Ranked tables that can seat `party_size` on `date`.
    ///
    /// With `desired_time` each candidate is checked at exactly that time;
    /// without it (a walk-in) each table offers its earliest free slot from
    /// now on. An empty list means nothing fits.
    pub async fn find_candidates(
        &self,
        party_size: u32,
        date: NaiveDate,
        desired_time: Option<NaiveTime>,
    ) -> Result<Vec<TableSlot>, EngineError> {
        let now = self.clock.now();
        let tables = self.bookable_tables().await?;
        validate_request(&tables, party_size, date, desired_time, now)?;
        let slots = self
            .candidates_from(&tables, party_size, date, desired_time, now, &HashSet::new())
            .await?;
        metrics::histogram!(crate::observability::CANDIDATES_FOUND).record(slots.len() as f64);
        Ok(slots)
    }

    /// The catalogue minus entries that fail [`Table::validate`]; those can
    /// never seat anyone.
    pub(super) async fn bookable_tables(&self) -> Result<Vec<Table>, EngineError> {
        let mut tables = self.tables.list_tables().await?;
        tables.retain(|t| match t.validate() {
            Ok(()) => true,
            Err(why) => {
                warn!("skipping table {}: {why}", t.id);
                false
            }
        });
        Ok(tables)
    }

    /// Ranked candidates among `tables`, skipping `excluded`. Inputs are
    /// assumed validated.
    pub(super) async fn candidates_from(
        &self,
        tables: &[Table],
        party_size: u32,
        date: NaiveDate,
        desired_time: Option<NaiveTime>,
        now: NaiveDateTime,
        excluded: &HashSet<Ulid>,
    ) -> Result<Vec<TableSlot>, EngineError> {
        let query = SlotQuery {
            party_size,
            date,
            desired: desired_time.map(minute_of_day),
            earliest: earliest_start(date, now),
            step: self.config.slot_step_minutes as Minute,
        };

        let mut slots = Vec::new();
        for table in tables {
            if excluded.contains(&table.id) || !table.seats(party_size) {
                continue;
            }
            let existing = self.reservations.find_by_table_and_date(table.id, date).await?;
            let occupied = occupied_windows(&existing, table);
            if let Some(slot) = slot_for_table(table, &occupied, &query) {
                slots.push(slot);
            }
        }
        rank_slots(&mut slots);
        Ok(slots)
    }

    pub async fn get_reservation(&self, id: Ulid) -> Result<Option<Reservation>, EngineError> {
        Ok(self.reservations.get(id).await?)
    }

    /// Occupied windows on one table for one date, sorted by start.
    pub async fn occupied_windows(&self, table_id: Ulid, date: NaiveDate) -> Result<Vec<OccupiedWindow>, EngineError> {
        let table = self
            .tables
            .get_table(table_id)
            .await?
            .ok_or(EngineError::NotFound(table_id))?;
        let existing = self.reservations.find_by_table_and_date(table_id, date).await?;
        Ok(occupied_windows(&existing, &table))
    }

    /// Free gaps within a table's opening hours on `date`.
    pub async fn free_windows(&self, table_id: Ulid, date: NaiveDate) -> Result<Vec<Span>, EngineError> {
        let table = self
            .tables
            .get_table(table_id)
            .await?
            .ok_or(EngineError::NotFound(table_id))?;
        let existing = self.reservations.find_by_table_and_date(table_id, date).await?;
        Ok(availability::free_windows(&table, &occupied_windows(&existing, &table)))
    }
}
