//! In-memory store dataset
//!
//! Owns the three per-store collections the engine reads: polling
//! observations, business-hour rules, and timezone names. Mirrors the
//! external data layer: the engine only reads from it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::calendar::{resolve_zone, StoreCalendar};
use crate::model::{BusinessHourRule, StatusObservation};

#[derive(Debug, Clone)]
pub struct Dataset {
    observations: HashMap<String, Vec<StatusObservation>>,
    business_hours: HashMap<String, Vec<BusinessHourRule>>,
    timezones: HashMap<String, String>,
    /// Distinct store ids from the observation feed, in first-seen order.
    /// Report rows follow this order.
    store_order: Vec<String>,
    default_zone: Tz,
}

impl Dataset {
    pub fn new(default_zone: Tz) -> Self {
        Self {
            observations: HashMap::new(),
            business_hours: HashMap::new(),
            timezones: HashMap::new(),
            store_order: Vec::new(),
            default_zone,
        }
    }

    pub fn default_zone(&self) -> Tz {
        self.default_zone
    }

    pub fn add_observation(&mut self, observation: StatusObservation) {
        let entry = self
            .observations
            .entry(observation.store_id.clone())
            .or_default();
        if entry.is_empty() {
            self.store_order.push(observation.store_id.clone());
        }
        entry.push(observation);
    }

    pub fn add_business_hours(&mut self, rule: BusinessHourRule) {
        self.business_hours
            .entry(rule.store_id.clone())
            .or_default()
            .push(rule);
    }

    pub fn set_timezone(&mut self, store_id: &str, zone_name: String) {
        self.timezones.insert(store_id.to_string(), zone_name);
    }

    /// Sort each store's observations by timestamp. Must be called once
    /// after bulk loading and before any window query.
    pub fn finalize(&mut self) {
        for observations in self.observations.values_mut() {
            observations.sort_by_key(|o| o.timestamp_utc);
        }
    }

    /// Distinct store ids seen in the observation feed, in load order.
    pub fn store_ids(&self) -> &[String] {
        &self.store_order
    }

    /// Observations for `store_id` with `start <= timestamp <= end`
    /// (inclusive on both ends, matching the upstream query), sorted.
    pub fn observations_between(
        &self,
        store_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> &[StatusObservation] {
        let Some(observations) = self.observations.get(store_id) else {
            return &[];
        };
        let lo = observations.partition_point(|o| o.timestamp_utc < start);
        let hi = observations.partition_point(|o| o.timestamp_utc <= end);
        &observations[lo..hi]
    }

    pub fn rules_for(&self, store_id: &str) -> &[BusinessHourRule] {
        self.business_hours
            .get(store_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The store's recorded zone name, or the default zone when absent.
    pub fn timezone_name_for(&self, store_id: &str) -> &str {
        match self.timezones.get(store_id) {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.default_zone.name(),
        }
    }

    /// Calendar evaluator for one store: rules plus resolved timezone,
    /// falling back to the default zone when the name is unresolvable.
    pub fn calendar_for(&self, store_id: &str) -> StoreCalendar<'_> {
        let tz = resolve_zone(self.timezone_name_for(store_id), self.default_zone);
        StoreCalendar::new(self.rules_for(store_id), tz)
    }

    /// Most recent observation timestamp across all stores; supplies the
    /// reference "now" for a report run.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.observations
            .values()
            .filter_map(|v| v.iter().map(|o| o.timestamp_utc).max())
            .max()
    }

    pub fn observation_count(&self) -> usize {
        self.observations.values().map(Vec::len).sum()
    }

    pub fn rule_count(&self) -> usize {
        self.business_hours.values().map(Vec::len).sum()
    }

    pub fn timezone_count(&self) -> usize {
        self.timezones.len()
    }
}
