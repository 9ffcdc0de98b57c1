use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, Utc, Weekday};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::services::credentials::CredentialResolver;
use crate::services::google::GoogleEvent;
use crate::AppState;

/// Business window applied to every weekday, in UTC.
const BUSINESS_DAY_START_HOUR: u32 = 9;
const BUSINESS_DAY_END_HOUR: u32 = 17;

/// A candidate bookable interval. Computed on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Compute the seller's open slots in `[range_start, range_end)`.
///
/// Fetches the seller's events once for the whole range, then filters the
/// candidate slots against them. Results are recomputed fresh on every call.
pub async fn compute_slots(
    state: &AppState,
    seller_email: &str,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    slot_minutes: i64,
) -> AppResult<Vec<TimeSlot>> {
    if range_start >= range_end {
        return Err(AppError::BadRequest(
            "startDate must be before endDate".to_string(),
        ));
    }

    let session = CredentialResolver::resolve(&state.db, &state.google, seller_email).await?;

    let events = state
        .google
        .list_events(
            &session.access_token,
            &range_start.to_rfc3339_opts(SecondsFormat::Secs, true),
            &range_end.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
        .await?;

    Ok(available_slots(&events, range_start, range_end, slot_minutes).collect())
}

/// Lazy sequence of open slots, chronological by start.
///
/// Weekends are skipped entirely. Candidate starts advance from 09:00 in
/// `slot_minutes` increments as long as the start falls before 17:00; the
/// slot end is allowed to run past 17:00 (start-boundary check only, matching
/// the behavior bookings have always relied on — see the test pinning it).
pub fn available_slots(
    events: &[GoogleEvent],
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    slot_minutes: i64,
) -> impl Iterator<Item = TimeSlot> {
    let busy = busy_intervals(events);
    let slot_len = Duration::minutes(slot_minutes.max(1));

    // Walk whole calendar days the way the booking UI pages through them:
    // anchored at range_start's time of day, one day per step, stopping once
    // the anchor passes range_end.
    std::iter::successors(Some(range_start), |cursor| Some(*cursor + Duration::days(1)))
        .take_while(move |cursor| *cursor < range_end)
        .map(|cursor| cursor.date_naive())
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .flat_map(move |day| day_slots(day, slot_len))
        .filter(move |slot| {
            !busy
                .iter()
                .any(|&(busy_start, busy_end)| slot.start < busy_end && slot.end > busy_start)
        })
}

/// Candidate slots for one weekday.
fn day_slots(day: NaiveDate, slot_len: Duration) -> impl Iterator<Item = TimeSlot> {
    let open = day
        .and_hms_opt(BUSINESS_DAY_START_HOUR, 0, 0)
        .expect("business day start is a valid time")
        .and_utc();
    let close = day
        .and_hms_opt(BUSINESS_DAY_END_HOUR, 0, 0)
        .expect("business day end is a valid time")
        .and_utc();

    std::iter::successors(Some(open), move |start| Some(*start + slot_len))
        .take_while(move |start| *start < close)
        .map(move |start| TimeSlot {
            start,
            end: start + slot_len,
        })
}

/// Busy intervals from non-cancelled events.
///
/// Only events with a concrete dateTime on both ends count; all-day events
/// (date without dateTime) never block a slot.
fn busy_intervals(events: &[GoogleEvent]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    events
        .iter()
        .filter(|e| e.status.as_deref() != Some("cancelled"))
        .filter_map(|e| {
            let start = e.start.as_ref()?.date_time.as_deref()?;
            let end = e.end.as_ref()?.date_time.as_deref()?;
            let start = DateTime::parse_from_rfc3339(start).ok()?.with_timezone(&Utc);
            let end = DateTime::parse_from_rfc3339(end).ok()?.with_timezone(&Utc);
            Some((start, end))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::google::EventDateTime;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn timed_event(start: &str, end: &str, status: Option<&str>) -> GoogleEvent {
        GoogleEvent {
            id: Some("evt".to_string()),
            status: status.map(str::to_string),
            start: Some(EventDateTime {
                date_time: Some(start.to_string()),
                ..Default::default()
            }),
            end: Some(EventDateTime {
                date_time: Some(end.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn busy_tuesday_scenario() {
        // 2024-01-02 is a Tuesday with one confirmed event 14:00-15:00.
        let events = vec![timed_event(
            "2024-01-02T14:00:00Z",
            "2024-01-02T15:00:00Z",
            Some("confirmed"),
        )];

        let slots: Vec<_> = available_slots(
            &events,
            utc("2024-01-02T00:00:00Z"),
            utc("2024-01-03T00:00:00Z"),
            60,
        )
        .collect();

        let starts: Vec<_> = slots.iter().map(|s| s.start.to_rfc3339()).collect();
        assert_eq!(
            starts,
            vec![
                "2024-01-02T09:00:00+00:00",
                "2024-01-02T10:00:00+00:00",
                "2024-01-02T11:00:00+00:00",
                "2024-01-02T12:00:00+00:00",
                "2024-01-02T13:00:00+00:00",
                "2024-01-02T15:00:00+00:00",
                "2024-01-02T16:00:00+00:00",
            ]
        );
    }

    #[test]
    fn weekends_produce_no_slots() {
        // 2024-01-06 is a Saturday, 2024-01-07 a Sunday.
        let slots: Vec<_> = available_slots(
            &[],
            utc("2024-01-06T00:00:00Z"),
            utc("2024-01-08T00:00:00Z"),
            60,
        )
        .collect();

        assert!(slots.is_empty());
    }

    #[test]
    fn slots_never_overlap_busy_events() {
        let events = vec![
            timed_event("2024-01-02T09:30:00Z", "2024-01-02T10:30:00Z", None),
            timed_event("2024-01-03T12:00:00Z", "2024-01-03T14:00:00Z", None),
        ];

        let range_start = utc("2024-01-01T00:00:00Z");
        let range_end = utc("2024-01-06T00:00:00Z");

        for slot in available_slots(&events, range_start, range_end, 60) {
            for e in &events {
                let busy_start = utc(e.start.as_ref().unwrap().date_time.as_deref().unwrap());
                let busy_end = utc(e.end.as_ref().unwrap().date_time.as_deref().unwrap());
                assert!(
                    !(slot.start < busy_end && slot.end > busy_start),
                    "slot {:?} overlaps event {:?}..{:?}",
                    slot,
                    busy_start,
                    busy_end
                );
            }
        }
    }

    #[test]
    fn cancelled_events_do_not_block() {
        let events = vec![timed_event(
            "2024-01-02T10:00:00Z",
            "2024-01-02T11:00:00Z",
            Some("cancelled"),
        )];

        let slots: Vec<_> = available_slots(
            &events,
            utc("2024-01-02T00:00:00Z"),
            utc("2024-01-03T00:00:00Z"),
            60,
        )
        .collect();

        assert!(slots.iter().any(|s| s.start == utc("2024-01-02T10:00:00Z")));
    }

    #[test]
    fn all_day_events_do_not_block() {
        let events = vec![GoogleEvent {
            id: Some("allday".to_string()),
            start: Some(EventDateTime {
                date: Some("2024-01-02".to_string()),
                ..Default::default()
            }),
            end: Some(EventDateTime {
                date: Some("2024-01-03".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }];

        let slots: Vec<_> = available_slots(
            &events,
            utc("2024-01-02T00:00:00Z"),
            utc("2024-01-03T00:00:00Z"),
            60,
        )
        .collect();

        assert_eq!(slots.len(), 8);
    }

    #[test]
    fn last_slot_may_run_past_close() {
        // Start-boundary check only: with 90-minute slots the 16:30 candidate
        // starts before 17:00 and is produced even though it ends at 18:00.
        let slots: Vec<_> = available_slots(
            &[],
            utc("2024-01-02T00:00:00Z"),
            utc("2024-01-03T00:00:00Z"),
            90,
        )
        .collect();

        let last = slots.last().unwrap();
        assert_eq!(last.start, utc("2024-01-02T16:30:00Z"));
        assert_eq!(last.end, utc("2024-01-02T18:00:00Z"));
    }

    #[test]
    fn results_are_chronological() {
        let slots: Vec<_> = available_slots(
            &[],
            utc("2024-01-01T00:00:00Z"),
            utc("2024-01-06T00:00:00Z"),
            60,
        )
        .collect();

        for pair in slots.windows(2) {
            assert!(pair[0].start < pair[1].start);
        }
    }
}
