use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use std::fmt::Display;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::external::LeadStore;
use crate::models::*;
use crate::utils::CallPolicy;

/// Calendar boundaries derived from "now", in now's time zone.
#[derive(Debug, Clone, Copy)]
struct DayBoundaries {
    today: NaiveDate,
    yesterday: NaiveDate,
    week_start: NaiveDate,
}

impl DayBoundaries {
    fn at<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let today = now.date_naive();
        Self {
            today,
            yesterday: today - Duration::days(1),
            week_start: today - Duration::days(7),
        }
    }

    fn bucket(&self, day: NaiveDate) -> TimeBucket {
        if day == self.today {
            TimeBucket::Today
        } else if day == self.yesterday {
            TimeBucket::Yesterday
        } else if day >= self.week_start && day < self.yesterday {
            TimeBucket::PastWeek
        } else {
            TimeBucket::Older
        }
    }
}

/// Bucket of a single timestamp. Dates after today fall through to `Older`.
pub fn bucket_for<Tz: TimeZone>(created_at: &DateTime<Utc>, now: &DateTime<Tz>) -> TimeBucket {
    let day = created_at.with_timezone(&now.timezone()).date_naive();
    DayBoundaries::at(now).bucket(day)
}

/// Splits records into the four time buckets, keeping their input order inside each bucket.
pub fn classify<Tz: TimeZone>(records: Vec<LeadRecord>, now: &DateTime<Tz>) -> GroupedLeads {
    let boundaries = DayBoundaries::at(now);
    let tz = now.timezone();

    records.into_iter().fold(GroupedLeads::default(), |mut acc, record| {
        let day = record.created_at.with_timezone(&tz).date_naive();
        acc.push(boundaries.bucket(day), record);
        acc
    })
}

/// Non-empty buckets as table sections, in display order.
pub fn render_sections<Tz>(grouped: &GroupedLeads, tz: &Tz) -> Vec<LeadSection>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    TimeBucket::ALL
        .iter()
        .filter(|bucket| !grouped.bucket(**bucket).is_empty())
        .map(|bucket| LeadSection {
            bucket: *bucket,
            title: bucket.title().to_string(),
            columns: LEAD_TABLE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: grouped
                .bucket(*bucket)
                .iter()
                .map(|lead| {
                    vec![
                        lead.name.clone(),
                        lead.phone_number.clone(),
                        lead.created_at.with_timezone(tz).format("%d/%m/%Y").to_string(),
                        lead.course.clone(),
                        lead.place.clone(),
                        lead.college.clone(),
                    ]
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadsViewState {
    Loading,
    Error(String),
    Loaded(Vec<LeadRecord>),
}

/// Admin leads page. Fetches once per view and keeps the outcome.
pub struct LeadsView {
    store: Arc<dyn LeadStore>,
    policy: CallPolicy,
    state: LeadsViewState,
    requested: bool,
}

impl LeadsView {
    pub fn new(store: Arc<dyn LeadStore>, policy: CallPolicy) -> Self {
        Self {
            store,
            policy,
            state: LeadsViewState::Loading,
            requested: false,
        }
    }

    pub fn state(&self) -> &LeadsViewState {
        &self.state
    }

    pub async fn load_leads(&mut self) -> &LeadsViewState {
        if self.requested {
            return &self.state;
        }
        self.requested = true;
        self.state = LeadsViewState::Loading;

        let store = self.store.clone();
        let result = self
            .policy
            .run_read("list leads", || {
                let store = store.clone();
                async move { store.list_all().await }
            })
            .await;

        self.state = match result {
            Ok(records) => {
                log::info!("Loaded {} leads", records.len());
                LeadsViewState::Loaded(records)
            }
            Err(e) => {
                log::error!("Failed to load leads: {}", e);
                LeadsViewState::Error(e.user_message())
            }
        };
        &self.state
    }

    pub fn grouped<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<GroupedLeads> {
        match &self.state {
            LeadsViewState::Loaded(records) => Some(classify(records.clone(), now)),
            _ => None,
        }
    }
}

/// Builds a leads page per request, bucketed against the server's local clock.
#[derive(Clone)]
pub struct LeadsService {
    store: Arc<dyn LeadStore>,
    policy: CallPolicy,
}

impl LeadsService {
    pub fn new(store: Arc<dyn LeadStore>, policy: CallPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn leads_page(&self) -> AppResult<LeadsPage> {
        self.leads_page_at(&Local::now()).await
    }

    pub async fn leads_page_at<Tz>(&self, now: &DateTime<Tz>) -> AppResult<LeadsPage>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let mut view = LeadsView::new(self.store.clone(), self.policy);
        match view.load_leads().await {
            LeadsViewState::Loaded(_) => {}
            LeadsViewState::Error(message) => return Err(AppError::LoadError(message.clone())),
            LeadsViewState::Loading => {
                return Err(AppError::InternalError("Lead list never resolved".to_string()));
            }
        }

        let grouped = view.grouped(now).unwrap_or_default();
        Ok(LeadsPage {
            total: grouped.len(),
            sections: render_sections(&grouped, &now.timezone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::intake_service::tests::FakeStore;
    use chrono::FixedOffset;
    use std::time::Duration as StdDuration;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    fn lead(name: &str, created_at: &str) -> LeadRecord {
        LeadRecord {
            name: name.to_string(),
            phone_number: "9876543210".to_string(),
            course: "MBBS".to_string(),
            place: "Kerala".to_string(),
            college: "Govt Medical College".to_string(),
            created_at: at(created_at),
        }
    }

    fn names(records: &[LeadRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    fn policy() -> CallPolicy {
        CallPolicy {
            timeout: StdDuration::from_millis(100),
            read_retries: 0,
            backoff: StdDuration::from_millis(1),
        }
    }

    #[test]
    fn test_classify_reference_dates() {
        let now = at("2024-06-10T12:00:00Z");
        let grouped = classify(
            vec![
                lead("today", "2024-06-10T23:00:00Z"),
                lead("yesterday", "2024-06-09T01:00:00Z"),
                lead("week", "2024-06-05T12:00:00Z"),
                lead("older", "2024-05-01T00:00:00Z"),
            ],
            &now,
        );
        assert_eq!(names(&grouped.today), vec!["today"]);
        assert_eq!(names(&grouped.yesterday), vec!["yesterday"]);
        assert_eq!(names(&grouped.past_week), vec!["week"]);
        assert_eq!(names(&grouped.older), vec!["older"]);
    }

    #[test]
    fn test_week_start_is_inclusive() {
        let now = at("2024-06-10T08:00:00Z");
        assert_eq!(bucket_for(&at("2024-06-03T00:00:00Z"), &now), TimeBucket::PastWeek);
        assert_eq!(bucket_for(&at("2024-06-03T23:59:59Z"), &now), TimeBucket::PastWeek);
        assert_eq!(bucket_for(&at("2024-06-02T23:59:59Z"), &now), TimeBucket::Older);
    }

    #[test]
    fn test_day_boundaries_not_elapsed_hours() {
        let now = at("2024-06-10T00:05:00Z");
        assert_eq!(bucket_for(&at("2024-06-10T00:01:00Z"), &now), TimeBucket::Today);
        assert_eq!(bucket_for(&at("2024-06-10T23:59:00Z"), &now), TimeBucket::Today);
        // ten minutes ago, but on the previous calendar day
        assert_eq!(bucket_for(&at("2024-06-09T23:55:00Z"), &now), TimeBucket::Yesterday);
    }

    #[test]
    fn test_future_dates_are_older() {
        let now = at("2024-06-10T12:00:00Z");
        assert_eq!(bucket_for(&at("2024-06-11T09:00:00Z"), &now), TimeBucket::Older);
    }

    #[test]
    fn test_classify_uses_local_midnight() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let now = ist.with_ymd_and_hms(2024, 6, 10, 0, 30, 0).unwrap();
        // 01:00 IST on the 10th
        assert_eq!(bucket_for(&at("2024-06-09T19:30:00Z"), &now), TimeBucket::Today);
        // 23:00 IST on the 9th
        assert_eq!(bucket_for(&at("2024-06-09T17:30:00Z"), &now), TimeBucket::Yesterday);
    }

    #[test]
    fn test_classify_is_an_exact_partition() {
        let now = at("2024-06-10T12:00:00Z");
        let start = at("2024-04-01T00:00:00Z");
        let records: Vec<LeadRecord> = (0..24 * 90)
            .step_by(7)
            .map(|h| LeadRecord {
                name: format!("lead-{h}"),
                created_at: start + Duration::hours(h),
                ..lead("x", "2024-01-01T00:00:00Z")
            })
            .collect();

        let grouped = classify(records.clone(), &now);
        assert_eq!(grouped.len(), records.len());

        let mut all: Vec<String> = TimeBucket::ALL
            .iter()
            .flat_map(|b| grouped.bucket(*b).iter().map(|r| r.name.clone()))
            .collect();
        let mut expected: Vec<String> = records.iter().map(|r| r.name.clone()).collect();
        all.sort();
        expected.sort();
        assert_eq!(all, expected);

        for bucket in TimeBucket::ALL {
            for record in grouped.bucket(bucket) {
                assert_eq!(bucket_for(&record.created_at, &now), bucket);
            }
        }
    }

    #[test]
    fn test_classify_empty_input() {
        let grouped = classify(Vec::new(), &Utc::now());
        assert!(grouped.is_empty());
        assert!(render_sections(&grouped, &Utc).is_empty());
    }

    #[test]
    fn test_render_skips_empty_sections_in_fixed_order() {
        let now = at("2024-06-10T12:00:00Z");
        let grouped = classify(
            vec![
                lead("older", "2024-01-15T10:00:00Z"),
                lead("today", "2024-06-10T09:00:00Z"),
            ],
            &now,
        );
        let sections = render_sections(&grouped, &Utc);

        let buckets: Vec<TimeBucket> = sections.iter().map(|s| s.bucket).collect();
        assert_eq!(buckets, vec![TimeBucket::Today, TimeBucket::Older]);
        assert_eq!(sections[0].title, "Today's Leads");
        assert_eq!(
            sections[0].columns,
            vec!["Name", "Phone Number", "Date", "Course", "Place", "College"]
        );
        assert_eq!(
            sections[1].rows[0],
            vec!["older", "9876543210", "15/01/2024", "MBBS", "Kerala", "Govt Medical College"]
        );
    }

    #[tokio::test]
    async fn test_load_leads_success() {
        let store = Arc::new(FakeStore {
            records: vec![lead("a", "2024-06-10T09:00:00Z")],
            ..FakeStore::default()
        });
        let mut view = LeadsView::new(store, policy());
        assert_eq!(*view.state(), LeadsViewState::Loading);

        let state = view.load_leads().await.clone();
        assert!(matches!(state, LeadsViewState::Loaded(ref r) if r.len() == 1));
        assert!(view.grouped(&at("2024-06-10T12:00:00Z")).is_some());
    }

    #[tokio::test]
    async fn test_load_leads_failure() {
        let store = Arc::new(FakeStore {
            fail_list: true,
            ..FakeStore::default()
        });
        let mut view = LeadsView::new(store, policy());
        assert_eq!(*view.state(), LeadsViewState::Loading);

        let state = view.load_leads().await.clone();
        assert_eq!(state, LeadsViewState::Error("Not authorised".to_string()));
        assert!(view.grouped(&Utc::now()).is_none());
    }

    #[tokio::test]
    async fn test_leads_page_at() {
        let store = Arc::new(FakeStore {
            records: vec![
                lead("a", "2024-06-10T09:00:00Z"),
                lead("b", "2024-06-09T09:00:00Z"),
                lead("c", "2024-06-09T10:00:00Z"),
            ],
            ..FakeStore::default()
        });
        let service = LeadsService::new(store, policy());
        let page = service.leads_page_at(&at("2024-06-10T12:00:00Z")).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.sections.len(), 2);
        assert_eq!(page.sections[1].rows.len(), 2);
    }

    #[tokio::test]
    async fn test_leads_page_surfaces_load_error() {
        let store = Arc::new(FakeStore {
            fail_list: true,
            ..FakeStore::default()
        });
        let service = LeadsService::new(store, policy());
        let err = service.leads_page().await.unwrap_err();
        assert!(matches!(err, AppError::LoadError(ref m) if m == "Not authorised"));
    }
}
