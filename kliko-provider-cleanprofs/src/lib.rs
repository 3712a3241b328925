//! Provider implementation for the Cleanprofs planning service.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use reqwest::{Client, redirect};
use scraper::{Html, Selector};

use kliko_core::{
    model::{AddressQuery, PickupEvent, Provider, WasteType},
    ports::{PortError, SchedulePort, ScheduleOutcome},
};

const PLANNING_URL: &str = "https://crm.cleanprofs.nl/search/planning";
const USER_AGENT: &str = "kliko/0.1";

/// Abbreviated month names used in the planning rows, in calendar order.
const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

static PLANNING_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.nk-tb-item").expect("row selector parses"));
static ROW_TEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.tb-lead").expect("cell selector parses"));
static ROW_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+) ([a-z]{3})$").expect("date pattern compiles"));

/// Pickup schedule port for the Cleanprofs planning service.
///
/// The port builds its own HTTP client: the planning service answers unknown
/// addresses with a redirect, and leaving redirects unfollowed keeps that
/// visible as a non-success status instead of a followed-through landing page.
pub struct CleanprofsPort {
    client: Client,
}

impl CleanprofsPort {
    /// Create a new schedule port.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, PortError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SchedulePort for CleanprofsPort {
    fn provider(&self) -> Provider {
        Provider::Cleanprofs
    }

    async fn fetch(&self, query: &AddressQuery) -> Result<ScheduleOutcome, PortError> {
        // The planning search keys on zipcode and house number only; the
        // addition plays no role for this provider.
        let response = self
            .client
            .post(PLANNING_URL)
            .form(&[
                ("zipcode", query.postal_code.as_str()),
                ("street_number", query.number.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(ScheduleOutcome::Absent);
        }

        let body = response.text().await?;
        Ok(ScheduleOutcome::Found(parse_planning(
            &body,
            Utc::now().year(),
        )))
    }
}

/// Extract pickup events from the planning search results page.
///
/// Each result row carries its fields as text cells; a row is kept when one
/// cell holds a known category marker and another a day-and-month date. Rows
/// missing either are skipped. The rows carry no year; `year` fills the gap,
/// so feeds generated around New Year can misplace a January pickup.
#[must_use]
pub fn parse_planning(body: &str, year: i32) -> Vec<PickupEvent> {
    let document = Html::parse_document(body);
    let mut events = Vec::new();

    for row in document.select(&PLANNING_ROW) {
        let cells: Vec<String> = row
            .select(&ROW_TEXT)
            .map(|cell| cell.text().collect::<String>().trim().to_lowercase())
            .collect();

        let Some(waste_type) = cells.iter().find_map(|cell| map_marker(cell)) else {
            continue;
        };
        let Some(date) = cells.iter().find_map(|cell| parse_row_date(cell, year)) else {
            continue;
        };

        events.push(PickupEvent { date, waste_type });
    }

    events.sort_unstable();
    events
}

fn map_marker(cell: &str) -> Option<WasteType> {
    match cell {
        "rst" => Some(WasteType::NonRecyclable),
        "gft" => Some(WasteType::Organic),
        _ => None,
    }
}

fn parse_row_date(cell: &str, year: i32) -> Option<NaiveDate> {
    let found = ROW_DATE.captures(cell)?;
    let day = found.get(1)?.as_str().parse::<u32>().ok()?;
    let month = found.get(2)?.as_str();
    let month = MONTHS
        .iter()
        .zip(1u32..)
        .find_map(|(name, number)| (*name == month).then_some(number))?;

    NaiveDate::from_ymd_opt(year, month, day)
}
