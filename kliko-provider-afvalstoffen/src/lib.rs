//! Provider implementation for the Afvalstoffendienst 's-Hertogenbosch portal.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::{Client, Url, redirect};
use serde::Serialize;

use kliko_core::{
    model::{AddressQuery, PickupEvent, Provider, WasteType},
    ports::{PortError, SchedulePort, ScheduleOutcome},
};

const SESSION_URL: &str = "https://www.afvalstoffendienst.nl/bewoners/s-hertogenbosch";
const CALENDAR_URL: &str = "https://www.afvalstoffendienst.nl/afvalkalender";
const USER_AGENT: &str = "kliko/0.1";

/// Dutch month names in calendar order. The portal sometimes truncates them
/// ("jan"), so lookups match by prefix.
const MONTHS: [&str; 12] = [
    "januari",
    "februari",
    "maart",
    "april",
    "mei",
    "juni",
    "juli",
    "augustus",
    "september",
    "oktober",
    "november",
    "december",
];

// One pickup per line: a category marker in the CSS class, then a day-of-week
// token, a day number, and a month name.
static PICKUP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*<p class="([^"]+)">\S+\s+(\d+) ([^<]+)"#).expect("pickup pattern compiles")
});

// Escape all but unreserved characters and the path separator; the portal
// stores the login blob URL-quoted.
const COOKIE_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

#[derive(Serialize)]
struct LoginParam<'a> {
    username: Option<&'a str>,
    password: Option<&'a str>,
    #[serde(rename = "rememberMe")]
    remember_me: Option<&'a str>,
    postcode: &'a str,
    huisnummer: &'a str,
    toevoeging: &'a str,
    debtornumber: &'a str,
}

/// Pickup schedule port for the Afvalstoffendienst portal.
///
/// Each lookup runs on a fresh HTTP client: the portal scopes its session to
/// one address via cookies, so clients must not be shared between lookups.
pub struct AfvalstoffenPort;

impl AfvalstoffenPort {
    /// Create a new schedule port.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for AfvalstoffenPort {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulePort for AfvalstoffenPort {
    fn provider(&self) -> Provider {
        Provider::Afvalstoffen
    }

    async fn fetch(&self, query: &AddressQuery) -> Result<ScheduleOutcome, PortError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        // Step one scopes the session to the municipality and hands out the
        // cookies the calendar page checks for.
        let session = client.get(SESSION_URL).send().await?;
        if !session.status().is_success() {
            return Ok(ScheduleOutcome::Absent);
        }

        let origin = Url::parse(SESSION_URL)
            .map_err(|error| PortError::Internal(format!("session url: {error}")))?;
        jar.add_cookie_str(
            &format!("loginParam={}; Path=/", login_cookie(query)?),
            &origin,
        );

        // The portal answers with a redirect for addresses it does not know;
        // redirects are not followed, so that reads as a non-success status.
        let calendar = client.get(CALENDAR_URL).send().await?;
        if !calendar.status().is_success() {
            return Ok(ScheduleOutcome::Absent);
        }

        let body = calendar.text().await?;
        Ok(ScheduleOutcome::Found(parse_calendar(
            &body,
            Utc::now().year(),
        )))
    }
}

/// Extract pickup events from the calendar page markup.
///
/// Lines that do not match the expected shape, carry an unknown category
/// marker, or name an unknown month are skipped. The markup carries no year;
/// `year` fills the gap, so feeds generated around New Year can misplace a
/// January pickup.
#[must_use]
pub fn parse_calendar(body: &str, year: i32) -> Vec<PickupEvent> {
    let mut events = Vec::new();

    for line in body.lines() {
        let Some(found) = PICKUP_LINE.captures(line) else {
            continue;
        };
        let (Some(marker), Some(day), Some(month)) = (found.get(1), found.get(2), found.get(3))
        else {
            continue;
        };

        let Some(waste_type) = map_marker(&marker.as_str().to_lowercase()) else {
            continue;
        };
        let Some(day) = day.as_str().parse::<u32>().ok() else {
            continue;
        };
        let Some(month) = month_number(month.as_str()) else {
            continue;
        };
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            continue;
        };

        events.push(PickupEvent { date, waste_type });
    }

    events.sort_unstable();
    events
}

fn map_marker(marker: &str) -> Option<WasteType> {
    match marker {
        "restafval" | "rst" => Some(WasteType::NonRecyclable),
        "gft" => Some(WasteType::Organic),
        "papier" => Some(WasteType::Paper),
        "kerstbomen" => Some(WasteType::Tree),
        _ => None,
    }
}

// Prefix match, at least three characters so "jun"/"jul" stay unambiguous.
fn month_number(name: &str) -> Option<u32> {
    let needle = name.trim().to_lowercase();
    if needle.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .zip(1u32..)
        .find_map(|(month, number)| month.starts_with(&needle).then_some(number))
}

fn login_cookie(query: &AddressQuery) -> Result<String, PortError> {
    let login = LoginParam {
        username: None,
        password: None,
        remember_me: None,
        postcode: &query.postal_code,
        huisnummer: &query.number,
        toevoeging: query.addition_or_empty(),
        debtornumber: "",
    };

    let json = serde_json::to_string(&login)
        .map_err(|error| PortError::Internal(format!("login cookie: {error}")))?;
    Ok(utf8_percent_encode(&json, COOKIE_ESCAPE).to_string())
}
