use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// A staff member who performs services. Read-only to the booking core;
/// working hours are fixed for the duration of a dialog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub specialties: Vec<String>,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    /// Active weekdays, 0 = Sunday .. 6 = Saturday.
    pub work_days: Vec<u8>,
    pub slot_interval_minutes: i64,
    pub active: bool,
}

impl Provider {
    pub fn works_on(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        let weekday = date.weekday().num_days_from_sunday() as u8;
        self.work_days.contains(&weekday)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(work_days: Vec<u8>) -> Provider {
        Provider {
            id: "prov-1".to_string(),
            name: "Ana".to_string(),
            specialties: vec!["Manicure".to_string()],
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            work_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            work_days,
            slot_interval_minutes: 15,
            active: true,
        }
    }

    #[test]
    fn test_works_on_active_weekday() {
        let p = provider(vec![1, 2, 3, 4, 5, 6]); // Mon-Sat
        // 2025-06-16 is a Monday
        assert!(p.works_on(NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()));
        // 2025-06-21 is a Saturday
        assert!(p.works_on(NaiveDate::from_ymd_opt(2025, 6, 21).unwrap()));
    }

    #[test]
    fn test_does_not_work_on_sunday() {
        let p = provider(vec![1, 2, 3, 4, 5, 6]);
        // 2025-06-15 is a Sunday
        assert!(!p.works_on(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()));
    }
}
