use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::config::BookingPolicy;
use crate::models::{Appointment, AppointmentStatus, DayOption, Provider, Service};

/// Enumerates candidate start times for one day, stepping from `work_start`
/// by the slot granularity. A candidate survives if the service still fits
/// before `work_end`, it is at least the lead time away from `now`, and its
/// half-open interval does not overlap any busy interval.
pub fn generate_slots(
    day: NaiveDate,
    work_start: NaiveTime,
    work_end: NaiveTime,
    granularity_minutes: i64,
    duration_minutes: i64,
    now: NaiveDateTime,
    lead_time_minutes: i64,
    busy: &[(NaiveDateTime, NaiveDateTime)],
) -> Vec<NaiveDateTime> {
    if granularity_minutes <= 0 || duration_minutes <= 0 {
        return vec![];
    }

    let duration = Duration::minutes(duration_minutes);
    let step = Duration::minutes(granularity_minutes);
    let window_end = day.and_time(work_end);
    let earliest = now + Duration::minutes(lead_time_minutes);

    let mut slots = vec![];
    let mut cursor = day.and_time(work_start);

    while cursor + duration <= window_end {
        let slot_end = cursor + duration;
        let conflict = busy
            .iter()
            .any(|(busy_start, busy_end)| cursor < *busy_end && slot_end > *busy_start);

        if cursor >= earliest && !conflict {
            slots.push(cursor);
        }

        cursor += step;
    }

    slots
}

/// Walks calendar days forward from `now`, collecting days on which the
/// provider has at least one free slot for the service. Stops after
/// `horizon_days` days with availability or `scan_ceiling_days` days
/// scanned, whichever comes first. An empty result is a valid outcome.
pub fn plan_availability(
    provider: &Provider,
    service: &Service,
    existing: &[Appointment],
    now: NaiveDateTime,
    policy: &BookingPolicy,
) -> Vec<DayOption> {
    let mut days = vec![];

    for offset in 0..policy.scan_ceiling_days {
        if days.len() >= policy.horizon_days {
            break;
        }

        let Some(day) = now.date().checked_add_signed(Duration::days(offset as i64)) else {
            break;
        };
        if !provider.works_on(day) {
            continue;
        }

        let busy: Vec<(NaiveDateTime, NaiveDateTime)> = existing
            .iter()
            .filter(|a| {
                matches!(
                    a.status,
                    AppointmentStatus::Pending | AppointmentStatus::Confirmed
                ) && a.start_at.date() == day
            })
            .map(|a| (a.start_at, a.end_at))
            .collect();

        let slots = generate_slots(
            day,
            provider.work_start,
            provider.work_end,
            provider.slot_interval_minutes,
            service.duration_minutes,
            now,
            policy.lead_time_minutes,
            &busy,
        );

        if !slots.is_empty() {
            days.push(DayOption { day, slots });
        }
    }

    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn provider() -> Provider {
        Provider {
            id: "prov-1".to_string(),
            name: "Ana".to_string(),
            specialties: vec![],
            work_start: t(9, 0),
            work_end: t(18, 0),
            work_days: vec![1, 2, 3, 4, 5, 6], // Mon-Sat
            slot_interval_minutes: 15,
            active: true,
        }
    }

    fn service(duration: i64) -> Service {
        Service {
            id: "svc-1".to_string(),
            name: "Manicure".to_string(),
            duration_minutes: duration,
            price_cents: 4000,
            category: "Nails".to_string(),
            display_order: 1,
            active: true,
        }
    }

    fn appointment(start: &str, end: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: "a-1".to_string(),
            client_id: "c-1".to_string(),
            provider_id: "prov-1".to_string(),
            service_id: "svc-1".to_string(),
            start_at: dt(start),
            end_at: dt(end),
            status,
            cancel_reason: None,
            reminder_sent: false,
            confirmed_at: None,
            created_at: dt(start),
            updated_at: dt(start),
        }
    }

    #[test]
    fn test_lead_time_and_closing_bound() {
        // Monday 08:00, lead time 2h: first offered slot is 10:00, last one
        // ends exactly at closing (17:15 + 45min = 18:00).
        let slots = generate_slots(
            date("2025-06-16"),
            t(9, 0),
            t(18, 0),
            15,
            45,
            dt("2025-06-16 08:00"),
            120,
            &[],
        );

        assert_eq!(slots.first().unwrap(), &dt("2025-06-16 10:00"));
        assert_eq!(slots.get(1).unwrap(), &dt("2025-06-16 10:15"));
        assert_eq!(slots.last().unwrap(), &dt("2025-06-16 17:15"));
        for slot in &slots {
            assert!(*slot + Duration::minutes(45) <= dt("2025-06-16 18:00"));
            assert!(*slot >= dt("2025-06-16 10:00"));
        }
    }

    #[test]
    fn test_busy_interval_excluded_half_open() {
        let busy = vec![(dt("2025-06-16 10:00"), dt("2025-06-16 11:00"))];
        let slots = generate_slots(
            date("2025-06-16"),
            t(9, 0),
            t(18, 0),
            30,
            60,
            dt("2025-06-15 08:00"),
            120,
            &busy,
        );

        // Everything touching [10:00, 11:00) is gone; 09:00 and 11:00 survive.
        assert!(slots.contains(&dt("2025-06-16 09:00")));
        assert!(!slots.contains(&dt("2025-06-16 09:30")));
        assert!(!slots.contains(&dt("2025-06-16 10:00")));
        assert!(!slots.contains(&dt("2025-06-16 10:30")));
        assert!(slots.contains(&dt("2025-06-16 11:00")));
    }

    #[test]
    fn test_granularity_not_dividing_window() {
        // 09:00-10:00 window with 25-minute steps and a 30-minute service:
        // candidates 09:00, 09:25 fit; 09:50 would end at 10:20.
        let slots = generate_slots(
            date("2025-06-16"),
            t(9, 0),
            t(10, 0),
            25,
            30,
            dt("2025-06-15 08:00"),
            120,
            &[],
        );
        assert_eq!(slots, vec![dt("2025-06-16 09:00"), dt("2025-06-16 09:25")]);
    }

    #[test]
    fn test_zero_granularity_terminates() {
        let slots = generate_slots(
            date("2025-06-16"),
            t(9, 0),
            t(18, 0),
            0,
            30,
            dt("2025-06-15 08:00"),
            120,
            &[],
        );
        assert!(slots.is_empty());
    }

    #[test]
    fn test_slots_are_chronological() {
        let slots = generate_slots(
            date("2025-06-16"),
            t(9, 0),
            t(12, 0),
            15,
            30,
            dt("2025-06-15 08:00"),
            120,
            &[],
        );
        let mut sorted = slots.clone();
        sorted.sort();
        assert_eq!(slots, sorted);
    }

    #[test]
    fn test_plan_skips_inactive_weekdays() {
        // 2025-06-15 is a Sunday; the provider works Mon-Sat.
        let days = plan_availability(
            &provider(),
            &service(45),
            &[],
            dt("2025-06-15 08:00"),
            &BookingPolicy::default(),
        );

        assert!(!days.is_empty());
        for day in &days {
            use chrono::Datelike;
            assert_ne!(day.day.weekday(), chrono::Weekday::Sun);
        }
    }

    #[test]
    fn test_plan_respects_horizon() {
        let policy = BookingPolicy {
            horizon_days: 3,
            ..BookingPolicy::default()
        };
        let days = plan_availability(&provider(), &service(45), &[], dt("2025-06-15 08:00"), &policy);
        assert_eq!(days.len(), 3);
    }

    #[test]
    fn test_plan_empty_when_provider_never_works() {
        let mut p = provider();
        p.work_days = vec![];
        let days = plan_availability(
            &p,
            &service(45),
            &[],
            dt("2025-06-15 08:00"),
            &BookingPolicy::default(),
        );
        assert!(days.is_empty());
    }

    #[test]
    fn test_plan_partitions_bookings_by_day() {
        // A booking on Monday removes Monday slots but leaves Tuesday alone.
        let existing = vec![appointment(
            "2025-06-16 10:00",
            "2025-06-16 11:00",
            AppointmentStatus::Confirmed,
        )];
        let days = plan_availability(
            &provider(),
            &service(60),
            &existing,
            dt("2025-06-15 08:00"),
            &BookingPolicy::default(),
        );

        let monday = days.iter().find(|d| d.day == date("2025-06-16")).unwrap();
        assert!(!monday.slots.contains(&dt("2025-06-16 10:00")));

        let tuesday = days.iter().find(|d| d.day == date("2025-06-17")).unwrap();
        assert!(tuesday.slots.contains(&dt("2025-06-17 10:00")));
    }

    #[test]
    fn test_plan_ignores_canceled_bookings() {
        let existing = vec![appointment(
            "2025-06-16 10:00",
            "2025-06-16 11:00",
            AppointmentStatus::Canceled,
        )];
        let days = plan_availability(
            &provider(),
            &service(60),
            &existing,
            dt("2025-06-15 08:00"),
            &BookingPolicy::default(),
        );

        let monday = days.iter().find(|d| d.day == date("2025-06-16")).unwrap();
        assert!(monday.slots.contains(&dt("2025-06-16 10:00")));
    }
}
