use crate::types::{Artifact, Edition};
use chrono::NaiveDate;
use std::sync::Arc;


pub(super) fn edition() -> Edition {
    Edition {
        title: "MF 10/2026".to_string(),
        issue: "Issue 10/2026".to_string(),
        publication_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
        source_ref: "https://source.example/mf/2026-10".to_string(),
    }
}

pub(super) fn artifact() -> Arc<Artifact> {
    Arc::new(Artifact {
        file_name: "mf-2026-10.pdf".to_string(),
        content_type: Some("application/pdf".to_string()),
        data: b"%PDF-1.7 edition".to_vec(),
    })
}
