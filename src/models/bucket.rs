use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::lead::LeadRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    Today,
    Yesterday,
    PastWeek,
    Older,
}

impl TimeBucket {
    /// Display order of the sections.
    pub const ALL: [TimeBucket; 4] = [
        TimeBucket::Today,
        TimeBucket::Yesterday,
        TimeBucket::PastWeek,
        TimeBucket::Older,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            TimeBucket::Today => "Today's Leads",
            TimeBucket::Yesterday => "Yesterday's Leads",
            TimeBucket::PastWeek => "Past 7 Days' Leads",
            TimeBucket::Older => "Older Leads",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupedLeads {
    pub today: Vec<LeadRecord>,
    pub yesterday: Vec<LeadRecord>,
    pub past_week: Vec<LeadRecord>,
    pub older: Vec<LeadRecord>,
}

impl GroupedLeads {
    pub fn bucket(&self, bucket: TimeBucket) -> &[LeadRecord] {
        match bucket {
            TimeBucket::Today => &self.today,
            TimeBucket::Yesterday => &self.yesterday,
            TimeBucket::PastWeek => &self.past_week,
            TimeBucket::Older => &self.older,
        }
    }

    pub fn push(&mut self, bucket: TimeBucket, record: LeadRecord) {
        match bucket {
            TimeBucket::Today => self.today.push(record),
            TimeBucket::Yesterday => self.yesterday.push(record),
            TimeBucket::PastWeek => self.past_week.push(record),
            TimeBucket::Older => self.older.push(record),
        }
    }

    pub fn len(&self) -> usize {
        TimeBucket::ALL.iter().map(|b| self.bucket(*b).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub const LEAD_TABLE_COLUMNS: [&str; 6] = ["Name", "Phone Number", "Date", "Course", "Place", "College"];

/// One rendered table section of the admin leads page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeadSection {
    pub bucket: TimeBucket,
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}
