use crate::types::Edition;
use chrono::NaiveDate;

mod close;
mod editions;
mod ledger;

pub(super) fn edition(title: &str, issue: &str, date: (i32, u32, u32)) -> Edition {
    Edition {
        title: title.to_string(),
        issue: issue.to_string(),
        publication_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        source_ref: format!("ref-{}", title.to_lowercase().replace(' ', "-")),
    }
}
