use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use common::notice::Notice;
use identity::session::Identity;
use store::{
    client::RecordStore,
    dtos::verification::VerificationDraft,
    models::{
        profile::Profile,
        verification::{Outcome, VerificationRecord},
    },
};
use uuid::Uuid;

use crate::export::{ExportDocument, build_export};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveView {
    Dashboard,
    NewCheck,
    History,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalOp {
    Refresh,
    SaveProfile,
    AddRecord,
    RemoveRecord,
}

/// Per-outcome tallies over the in-memory record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutcomeCounts {
    pub total: usize,
    pub verified: usize,
    pub review: usize,
    pub flagged: usize,
}

/// Synchronizes profile and verification state for one authenticated
/// identity and computes the read-side aggregates.
///
/// Mutations resynchronize with a full refresh rather than reconciling
/// locally, trading an extra read per write for consistency with the store.
pub struct PortalController {
    store: Arc<dyn RecordStore>,
    identity: Identity,
    profile: Profile,
    records: Vec<VerificationRecord>,
    draft: VerificationDraft,
    view: ActiveView,
    busy: HashSet<PortalOp>,
    notice: Option<Notice>,
}

impl PortalController {
    pub fn new(store: Arc<dyn RecordStore>, identity: Identity) -> Self {
        let profile = Profile::default_for(identity.id);
        PortalController {
            store,
            identity,
            profile,
            records: Vec::new(),
            draft: VerificationDraft::default(),
            view: ActiveView::Dashboard,
            busy: HashSet::new(),
            notice: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn profile_mut(&mut self) -> &mut Profile {
        &mut self.profile
    }

    pub fn records(&self) -> &[VerificationRecord] {
        &self.records
    }

    pub fn draft(&self) -> &VerificationDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut VerificationDraft {
        &mut self.draft
    }

    pub fn view(&self) -> ActiveView {
        self.view
    }

    pub fn set_view(&mut self, view: ActiveView) {
        self.view = view;
    }

    pub fn is_busy(&self, op: PortalOp) -> bool {
        self.busy.contains(&op)
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Fetches profile and record list concurrently. Either failing leaves
    /// the prior in-memory state untouched; on success both collections are
    /// replaced together before any derived read.
    pub async fn refresh_all(&mut self) {
        if !self.begin(PortalOp::Refresh) {
            return;
        }
        let (profile, records) = futures::join!(
            self.store.fetch_profile(self.identity.id),
            self.store.list_records(self.identity.id),
        );
        match (profile, records) {
            (Ok(profile), Ok(records)) => {
                self.profile =
                    profile.unwrap_or_else(|| Profile::default_for(self.identity.id));
                self.records = records;
            }
            (Err(err), _) | (_, Err(err)) => {
                self.notice = Some(err.to_notice("Couldn't load data"));
            }
        }
        self.finish(PortalOp::Refresh);
    }

    /// Upserts the whole profile keyed by user id, stamping the update time
    /// at call time. Local state is refreshed on the next `refresh_all`,
    /// not merged optimistically.
    pub async fn save_profile(&mut self) {
        if !self.begin(PortalOp::SaveProfile) {
            return;
        }
        let mut profile = self.profile.clone();
        profile.user_id = self.identity.id;
        profile.updated_at = Some(Utc::now().to_rfc3339());
        match self.store.upsert_profile(&profile).await {
            Ok(()) => self.notice = Some(Notice::success("Profile saved")),
            Err(err) => self.notice = Some(err.to_notice("Couldn't save profile")),
        }
        self.finish(PortalOp::SaveProfile);
    }

    /// Validates the draft locally, inserts it for the current user, then
    /// resynchronizes and lands on the history view. A failed insert keeps
    /// the draft intact for retry.
    pub async fn add_record(&mut self) {
        if !self.begin(PortalOp::AddRecord) {
            return;
        }
        if let Err(err) = self.draft.validate() {
            self.notice = Some(err.to_notice("Missing contractor name"));
            self.finish(PortalOp::AddRecord);
            return;
        }
        match self.store.insert_record(self.identity.id, &self.draft).await {
            Ok(()) => {
                self.notice = Some(Notice::success("Verification saved"));
                self.draft = VerificationDraft::default();
                self.finish(PortalOp::AddRecord);
                self.refresh_all().await;
                self.view = ActiveView::History;
            }
            Err(err) => {
                self.notice = Some(err.to_notice("Couldn't save verification"));
                self.finish(PortalOp::AddRecord);
            }
        }
    }

    /// Deletes by record id scoped to the current user id, then
    /// resynchronizes. No partial local removal on failure.
    pub async fn remove_record(&mut self, record_id: Uuid) {
        if !self.begin(PortalOp::RemoveRecord) {
            return;
        }
        match self.store.delete_record(self.identity.id, record_id).await {
            Ok(()) => {
                self.notice = Some(Notice::success("Deleted"));
                self.finish(PortalOp::RemoveRecord);
                self.refresh_all().await;
            }
            Err(err) => {
                self.notice = Some(err.to_notice("Couldn't delete"));
                self.finish(PortalOp::RemoveRecord);
            }
        }
    }

    /// Case-insensitive substring filter over every text field and the
    /// outcome. An empty query returns the full list; source order is
    /// preserved either way.
    pub fn filtered_records(&self, query: &str) -> Vec<&VerificationRecord> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.records.iter().collect();
        }
        self.records
            .iter()
            .filter(|record| record_haystack(record).contains(&needle))
            .collect()
    }

    /// Full-scan tallies; total always equals the sum of the three
    /// per-outcome counts.
    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts {
            total: self.records.len(),
            ..OutcomeCounts::default()
        };
        for record in &self.records {
            match record.outcome {
                Outcome::Verified => counts.verified += 1,
                Outcome::Review => counts.review += 1,
                Outcome::Flagged => counts.flagged += 1,
            }
        }
        counts
    }

    /// Snapshot of everything the export artifact carries.
    pub fn export_document(&self) -> ExportDocument<'_> {
        build_export(&self.identity, &self.profile, &self.records)
    }

    fn begin(&mut self, op: PortalOp) -> bool {
        if self.busy.contains(&op) {
            self.notice =
                Some(Notice::error("Hold on").with_body("That request is already in progress."));
            return false;
        }
        self.busy.insert(op);
        true
    }

    fn finish(&mut self, op: PortalOp) {
        self.busy.remove(&op);
    }
}

fn record_haystack(record: &VerificationRecord) -> String {
    [
        record.contractor_name.as_str(),
        record.trade.as_str(),
        record.abn.as_str(),
        record.licence.as_str(),
        record.insurance.as_str(),
        record.notes.as_str(),
        record.outcome.as_str(),
    ]
    .iter()
    .filter(|field| !field.is_empty())
    .cloned()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::error::{AppError, Res};
    use common::notice::NoticeKind;
    use std::sync::Mutex;

    fn record(name: &str, trade: &str, outcome: Outcome) -> VerificationRecord {
        VerificationRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            created_at: "2026-08-07T09:30:00+00:00".to_string(),
            contractor_name: name.to_string(),
            trade: trade.to_string(),
            abn: String::new(),
            licence: String::new(),
            insurance: String::new(),
            notes: String::new(),
            outcome,
        }
    }

    #[derive(Default)]
    struct CountingStore {
        inserts: Mutex<usize>,
        fail_lists: bool,
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn fetch_profile(&self, _user_id: Uuid) -> Res<Option<Profile>> {
            Ok(None)
        }

        async fn upsert_profile(&self, _profile: &Profile) -> Res<()> {
            Ok(())
        }

        async fn list_records(&self, _user_id: Uuid) -> Res<Vec<VerificationRecord>> {
            if self.fail_lists {
                return Err(AppError::Provider("permission denied".to_string()));
            }
            Ok(Vec::new())
        }

        async fn insert_record(&self, _user_id: Uuid, _draft: &VerificationDraft) -> Res<()> {
            *self.inserts.lock().unwrap() += 1;
            Ok(())
        }

        async fn delete_record(&self, _user_id: Uuid, _record_id: Uuid) -> Res<()> {
            Ok(())
        }
    }

    fn controller(store: Arc<dyn RecordStore>) -> PortalController {
        PortalController::new(
            store,
            Identity {
                id: Uuid::new_v4(),
                email: "user@example.com".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn blank_contractor_name_is_rejected_before_any_store_call() {
        let store = Arc::new(CountingStore::default());
        let mut portal = controller(store.clone());
        portal.draft_mut().contractor_name = "   ".to_string();

        portal.add_record().await;

        assert_eq!(*store.inserts.lock().unwrap(), 0);
        let notice = portal.take_notice().unwrap();
        assert_eq!(notice.title, "Missing contractor name");
        assert_eq!(notice.kind, NoticeKind::Error);
        // Draft kept for correction.
        assert_eq!(portal.draft().contractor_name, "   ");
    }

    #[test]
    fn empty_query_returns_every_record_in_source_order() {
        let store = Arc::new(CountingStore::default());
        let mut portal = controller(store);
        portal.records = vec![
            record("Acme Electrical", "Electrical", Outcome::Verified),
            record("North Shore Plumbing Co.", "Plumbing", Outcome::Review),
            record("Budget Roofing", "Roofing", Outcome::Flagged),
        ];

        let all = portal.filtered_records("");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].contractor_name, "Acme Electrical");
        assert_eq!(all[2].contractor_name, "Budget Roofing");

        let padded = portal.filtered_records("   ");
        assert_eq!(padded.len(), 3);
    }

    #[test]
    fn filter_is_case_insensitive_across_all_fields() {
        let store = Arc::new(CountingStore::default());
        let mut portal = controller(store);
        let mut with_abn = record("Acme Electrical", "Electrical", Outcome::Verified);
        with_abn.abn = "12 345 678 901".to_string();
        let mut with_notes = record("Budget Roofing", "Roofing", Outcome::Flagged);
        with_notes.notes = "Lapsed insurance certificate".to_string();
        portal.records = vec![
            with_abn,
            record("North Shore Plumbing Co.", "Plumbing", Outcome::Review),
            with_notes,
        ];

        assert_eq!(portal.filtered_records("PLUMBING").len(), 1);
        assert_eq!(portal.filtered_records("345 678").len(), 1);
        assert_eq!(portal.filtered_records("lapsed").len(), 1);
        // Matches the outcome's wire value too.
        assert_eq!(portal.filtered_records("flagged").len(), 1);
        assert!(portal.filtered_records("concrete").is_empty());
    }

    #[test]
    fn counts_total_is_the_sum_of_the_three_outcomes() {
        let store = Arc::new(CountingStore::default());
        let mut portal = controller(store);
        portal.records = vec![
            record("a", "", Outcome::Verified),
            record("b", "", Outcome::Verified),
            record("c", "", Outcome::Review),
            record("d", "", Outcome::Flagged),
            record("e", "", Outcome::Flagged),
        ];

        let counts = portal.counts();
        assert_eq!(counts.total, 5);
        assert_eq!(counts.verified, 2);
        assert_eq!(counts.review, 1);
        assert_eq!(counts.flagged, 2);
        assert_eq!(
            counts.total,
            counts.verified + counts.review + counts.flagged
        );
    }

    #[tokio::test]
    async fn failed_refresh_leaves_prior_state_untouched() {
        let store = Arc::new(CountingStore {
            fail_lists: true,
            ..CountingStore::default()
        });
        let mut portal = controller(store);
        portal.records = vec![record("Acme Electrical", "", Outcome::Verified)];
        portal.profile.org_name = "Acme Facilities".to_string();

        portal.refresh_all().await;

        assert_eq!(portal.records().len(), 1);
        assert_eq!(portal.profile().org_name, "Acme Facilities");
        let notice = portal.take_notice().unwrap();
        assert_eq!(notice.title, "Couldn't load data");
        assert!(notice.body.unwrap().contains("permission denied"));
    }

    #[tokio::test]
    async fn duplicate_in_flight_submission_is_rejected() {
        let store = Arc::new(CountingStore::default());
        let mut portal = controller(store.clone());
        portal.draft_mut().contractor_name = "Acme Electrical".to_string();

        portal.busy.insert(PortalOp::AddRecord);
        portal.add_record().await;

        assert_eq!(*store.inserts.lock().unwrap(), 0);
        assert_eq!(portal.take_notice().unwrap().title, "Hold on");
    }
}
