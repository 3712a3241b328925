//! Calendar feed generation from pickup events.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Europe::Amsterdam;
use icalendar::{Alarm, Calendar, CalendarDateTime, Component, Event, EventLike, Trigger};
use sha2::{Digest, Sha256};

use crate::model::PickupEvent;

/// Media type of rendered feeds, for use in HTTP response headers.
pub const CALENDAR_MEDIA_TYPE: &str = "text/calendar";

/// Maximum number of reminder offsets honored per event.
pub const MAX_ALARMS: usize = 2;

#[derive(thiserror::Error, Debug)]
/// Errors raised while assembling a calendar feed.
pub enum CalendarError {
    /// The day window ends before it starts.
    #[error("Day window ends before it starts")]
    InvertedWindow,
}

#[derive(Debug, Clone)]
/// Options controlling calendar rendering.
pub struct CalendarOptions {
    /// Start of the event window within the pickup day, local time.
    pub day_start: NaiveTime,
    /// End of the event window within the pickup day, local time.
    pub day_end: NaiveTime,
    /// Reminder offsets relative to the event start. Negative offsets fire
    /// before the pickup window opens.
    pub alarm_offsets: Vec<Duration>,
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self {
            day_start: NaiveTime::from_hms_opt(7, 0, 0).expect("literal time"),
            day_end: NaiveTime::from_hms_opt(19, 0, 0).expect("literal time"),
            alarm_offsets: vec![Duration::hours(-12), Duration::zero()],
        }
    }
}

impl CalendarOptions {
    /// Validated copy with the reminder list truncated to [`MAX_ALARMS`]
    /// offsets.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvertedWindow`] when `day_end` is before
    /// `day_start`.
    pub fn normalized(&self) -> Result<Self, CalendarError> {
        if self.day_end < self.day_start {
            return Err(CalendarError::InvertedWindow);
        }
        let mut normalized = self.clone();
        normalized.alarm_offsets.truncate(MAX_ALARMS);
        Ok(normalized)
    }
}

/// Build an `iCalendar` document for the given pickup events.
///
/// Event identifiers are content-addressed, and DTSTAMP is pinned to the event
/// start rather than the wall clock. Both hold for the reminders too, whose
/// identifiers derive from the event identifier and the offset position, so
/// regenerating a feed for unchanged events yields byte-identical output.
/// Events are rendered in input order; ports already sort their output.
///
/// Times are interpreted as Europe/Amsterdam civil time and serialized in UTC.
///
/// # Errors
///
/// Returns [`CalendarError::InvertedWindow`] when `day_end` is before
/// `day_start`.
pub fn build_calendar(
    events: &[PickupEvent],
    label_prefix: &str,
    day_start: NaiveTime,
    day_end: NaiveTime,
    alarm_offsets: &[Duration],
) -> Result<Calendar, CalendarError> {
    if day_end < day_start {
        return Err(CalendarError::InvertedWindow);
    }

    let mut calendar = Calendar::new();

    for event in events.iter().copied() {
        let begin = local_instant(event.date, day_start);
        let end = local_instant(event.date, day_end);

        let uid = event_uid(label_prefix, event);
        let title = format!("{label_prefix}: {}", event.waste_type.label());

        let mut entry = Event::new();
        entry
            .uid(&uid)
            .summary(&title)
            .starts(begin)
            .ends(end)
            .timestamp(begin);

        for (position, offset) in alarm_offsets.iter().enumerate() {
            let trigger = Trigger::DateTime(CalendarDateTime::Utc(begin + *offset));
            let mut alarm = Alarm::display(&title, trigger);
            // The serializer invents a random UID and a wall-clock DTSTAMP for
            // any component missing them; pin both so feeds stay stable.
            alarm.uid(&format!("{uid}-{position}")).timestamp(begin);
            entry.alarm(alarm);
        }

        calendar.push(entry.done());
    }

    Ok(calendar)
}

/// Stable identifier derived from the event content.
///
/// The same label prefix, date, and waste type always hash to the same UID, so
/// calendar clients recognize regenerated events as updates rather than
/// duplicates.
#[must_use]
pub fn event_uid(label_prefix: &str, event: PickupEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(label_prefix.as_bytes());
    hasher.update(event.date.to_string().as_bytes());
    hasher.update(event.waste_type.slug().as_bytes());
    hex::encode(hasher.finalize())
}

// Pickup windows never land in the Amsterdam DST gap, but the zone lookup is
// still total: fall back to reading the civil time as UTC.
fn local_instant(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    Amsterdam
        .from_local_datetime(&naive)
        .earliest()
        .map_or_else(
            || Utc.from_utc_datetime(&naive),
            |local| local.with_timezone(&Utc),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WasteType;

    fn event(year: i32, month: u32, day: u32, waste_type: WasteType) -> PickupEvent {
        PickupEvent {
            date: NaiveDate::from_ymd_opt(year, month, day).expect("valid date"),
            waste_type,
        }
    }

    fn window() -> (NaiveTime, NaiveTime) {
        (
            NaiveTime::from_hms_opt(7, 0, 0).expect("literal time"),
            NaiveTime::from_hms_opt(19, 0, 0).expect("literal time"),
        )
    }

    mod identifier_tests {
        use super::*;

        #[test]
        fn identifiers_are_content_addressed() {
            let non_recyclable = event(2026, 1, 14, WasteType::NonRecyclable);
            let organic = event(2026, 3, 3, WasteType::Organic);

            assert_eq!(
                event_uid("Afval", non_recyclable),
                "5d9d98f6274dad07d7add46f402d995aaac832f7131930989d151144cbae3780"
            );
            assert_eq!(
                event_uid("Cleanprofs", organic),
                "2760529f67c1a5c37cba8c79e6f2e7e475a6e0ed7d3ab08a1cd487a48a1a3b6e"
            );
        }

        #[test]
        fn the_prefix_separates_providers() {
            let pickup = event(2026, 1, 14, WasteType::Organic);
            assert_ne!(
                event_uid("Afval", pickup),
                event_uid("Cleanprofs", pickup),
                "same pickup, different providers, different identifiers"
            );
        }
    }

    mod build_tests {
        use super::*;

        #[test]
        fn regenerated_feeds_are_byte_identical() {
            let events = [
                event(2026, 1, 14, WasteType::NonRecyclable),
                event(2026, 1, 21, WasteType::Organic),
            ];
            let (start, end) = window();
            let offsets = [Duration::hours(-12), Duration::zero()];

            let first = build_calendar(&events, "Afval", start, end, &offsets)
                .expect("builds")
                .to_string();
            let second = build_calendar(&events, "Afval", start, end, &offsets)
                .expect("builds")
                .to_string();

            assert_eq!(first, second);
        }

        #[test]
        fn timestamps_are_pinned_to_the_event_start() {
            let events = [event(2026, 1, 14, WasteType::NonRecyclable)];
            let (start, end) = window();

            let rendered = build_calendar(&events, "Afval", start, end, &[])
                .expect("builds")
                .to_string();

            // 07:00 Amsterdam in January is 06:00 UTC.
            assert!(
                rendered.contains("DTSTART:20260114T060000Z"),
                "start in UTC: {rendered}"
            );
            assert!(
                rendered.contains("DTEND:20260114T180000Z"),
                "end in UTC: {rendered}"
            );
            assert!(
                rendered.contains("DTSTAMP:20260114T060000Z"),
                "DTSTAMP pinned to start: {rendered}"
            );
        }

        #[test]
        fn summer_dates_shift_with_the_zone_offset() {
            let events = [event(2026, 7, 14, WasteType::Paper)];
            let (start, end) = window();

            let rendered = build_calendar(&events, "Afval", start, end, &[])
                .expect("builds")
                .to_string();

            // 07:00 Amsterdam in July is 05:00 UTC.
            assert!(
                rendered.contains("DTSTART:20260714T050000Z"),
                "summer start in UTC: {rendered}"
            );
        }

        #[test]
        fn each_offset_becomes_one_reminder() {
            let pickup = event(2026, 1, 14, WasteType::NonRecyclable);
            let (start, end) = window();
            let offsets = [Duration::hours(-12), Duration::zero()];

            let rendered = build_calendar(&[pickup], "Afval", start, end, &offsets)
                .expect("builds")
                .to_string();

            assert_eq!(
                rendered.matches("BEGIN:VALARM").count(),
                2,
                "one alarm per offset"
            );
            // Trigger instants: start minus twelve hours, and the start itself.
            assert!(
                rendered.contains("20260113T180000Z"),
                "early reminder: {rendered}"
            );
        }

        #[test]
        fn reminders_carry_derived_identifiers_and_pinned_stamps() {
            let pickup = event(2026, 1, 14, WasteType::NonRecyclable);
            let (start, end) = window();
            let offsets = [Duration::hours(-12), Duration::zero()];

            let rendered = build_calendar(&[pickup], "Afval", start, end, &offsets)
                .expect("builds")
                .to_string();

            let uid = event_uid("Afval", pickup);
            assert!(
                rendered.contains(&format!("UID:{uid}-0")),
                "first reminder identifier: {rendered}"
            );
            assert!(
                rendered.contains(&format!("UID:{uid}-1")),
                "second reminder identifier: {rendered}"
            );
            assert_eq!(
                rendered.matches("DTSTAMP:20260114T060000Z").count(),
                3,
                "event and reminder stamps all pin to the start: {rendered}"
            );
        }

        #[test]
        fn titles_join_prefix_and_label() {
            let events = [event(2026, 1, 14, WasteType::NonRecyclable)];
            let (start, end) = window();

            let rendered = build_calendar(&events, "Afval", start, end, &[])
                .expect("builds")
                .to_string();

            assert!(
                rendered.contains("SUMMARY:Afval: Non Recyclable"),
                "event title: {rendered}"
            );
        }

        #[test]
        fn inverted_windows_are_rejected() {
            let events = [event(2026, 1, 14, WasteType::NonRecyclable)];
            let (start, end) = window();

            let result = build_calendar(&events, "Afval", end, start, &[]);
            assert!(
                matches!(result, Err(CalendarError::InvertedWindow)),
                "end before start must not build"
            );
        }

        #[test]
        fn empty_event_lists_render_an_empty_feed() {
            let (start, end) = window();

            let rendered = build_calendar(&[], "Afval", start, end, &[])
                .expect("builds")
                .to_string();

            assert!(rendered.contains("BEGIN:VCALENDAR"), "feed envelope");
            assert!(!rendered.contains("BEGIN:VEVENT"), "no events");
        }
    }

    mod options_tests {
        use super::*;

        #[test]
        fn normalization_caps_the_reminder_list() {
            let options = CalendarOptions {
                alarm_offsets: vec![
                    Duration::hours(-12),
                    Duration::zero(),
                    Duration::hours(3),
                ],
                ..CalendarOptions::default()
            };

            let normalized = options.normalized().expect("window runs forward");
            assert_eq!(normalized.alarm_offsets.len(), MAX_ALARMS);
        }

        #[test]
        fn normalization_rejects_inverted_windows() {
            let options = CalendarOptions {
                day_start: NaiveTime::from_hms_opt(19, 0, 0).expect("literal time"),
                day_end: NaiveTime::from_hms_opt(7, 0, 0).expect("literal time"),
                ..CalendarOptions::default()
            };

            assert!(
                matches!(options.normalized(), Err(CalendarError::InvertedWindow)),
                "end before start must not normalize"
            );
        }

        #[test]
        fn defaults_cover_the_pickup_day() {
            let options = CalendarOptions::default();

            assert!(options.day_start < options.day_end, "window runs forward");
            assert_eq!(options.alarm_offsets.len(), 2, "two default reminders");
        }
    }
}
