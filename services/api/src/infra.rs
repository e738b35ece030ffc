use metrics_exporter_prometheus::PrometheusHandle;
use placify::error::AppError;
use placify::placement::domain::normalize_email;
use placify::placement::{
    violates_uniqueness, Identity, IdentityError, IdentityEvent, IdentityId, IdentityProvider,
    NewSubmission, Session, SessionToken, SignInRequest, StoreError, Submission, SubmissionFilter,
    SubmissionId, SubmissionOrder, SubmissionPatch, SubmissionStore,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Submissions collection held in process memory, keyed by document id.
#[derive(Default, Clone)]
pub(crate) struct InMemorySubmissionStore {
    records: Arc<Mutex<HashMap<SubmissionId, Submission>>>,
}

impl InMemorySubmissionStore {
    /// Build a store from previously exported documents. Duplicate ids,
    /// owners or emails are rejected.
    pub(crate) fn seeded(submissions: Vec<Submission>) -> Result<Self, StoreError> {
        let store = Self::default();
        {
            let mut guard = store.records.lock().expect("store mutex poisoned");
            for submission in submissions {
                let email_key = submission.details.email_key();
                let duplicate = guard.contains_key(&submission.id)
                    || guard.values().any(|existing| {
                        violates_uniqueness(existing, &submission.owner, &email_key)
                    });
                if duplicate {
                    return Err(StoreError::Conflict);
                }
                guard.insert(submission.id.clone(), submission);
            }
        }
        Ok(store)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.lock().expect("store mutex poisoned").len()
    }
}

impl SubmissionStore for InMemorySubmissionStore {
    fn query(
        &self,
        filter: &SubmissionFilter,
        order: SubmissionOrder,
    ) -> Result<Vec<Submission>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        let mut matches: Vec<Submission> = guard
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        order.apply(&mut matches);
        Ok(matches)
    }

    fn get_all(&self) -> Result<Vec<Submission>, StoreError> {
        self.query(&SubmissionFilter::All, SubmissionOrder::Unordered)
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn insert(&self, submission: NewSubmission) -> Result<Submission, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let email_key = submission.details.email_key();
        if guard
            .values()
            .any(|existing| violates_uniqueness(existing, &submission.owner, &email_key))
        {
            return Err(StoreError::Conflict);
        }

        let record = Submission {
            id: SubmissionId(Uuid::new_v4().simple().to_string()),
            owner: submission.owner,
            details: submission.details,
            timestamp: submission.timestamp,
            eligibility: BTreeMap::new(),
        };
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, id: &SubmissionId, patch: SubmissionPatch) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if let SubmissionPatch::Details { details, .. } = &patch {
            let email_key = details.email_key();
            if guard
                .values()
                .any(|existing| existing.id != *id && existing.details.email_key() == email_key)
            {
                return Err(StoreError::Conflict);
            }
        }

        match guard.get_mut(id) {
            Some(record) => {
                patch.apply(record);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn delete(&self, id: &SubmissionId) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

/// Read a JSON array of submission documents.
pub(crate) fn load_submissions(path: &Path) -> Result<Vec<Submission>, AppError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| AppError::seed(path, source))
}

/// Local stand-in for a hosted sign-in provider. Every email maps to the
/// same uid on each sign-in; tokens are random per session.
#[derive(Clone)]
pub(crate) struct InMemoryIdentityProvider {
    sessions: Arc<Mutex<HashMap<SessionToken, Identity>>>,
    events: broadcast::Sender<IdentityEvent>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }
}

fn stable_uid(email: &str) -> IdentityId {
    let key = normalize_email(email);
    IdentityId(Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string())
}

impl IdentityProvider for InMemoryIdentityProvider {
    fn sign_in(&self, request: SignInRequest) -> Result<Session, IdentityError> {
        let email = request.email.trim();
        if !email.contains('@') {
            return Err(IdentityError::Rejected(format!(
                "'{email}' is not an email address"
            )));
        }

        let identity = Identity {
            uid: stable_uid(email),
            email: email.to_string(),
            display_name: request.display_name,
        };
        let token = SessionToken(Uuid::new_v4().simple().to_string());

        self.sessions
            .lock()
            .expect("identity mutex poisoned")
            .insert(token.clone(), identity.clone());
        // No receivers is fine; nobody may be listening yet.
        self.events.send(IdentityEvent::SignedIn(identity.clone())).ok();

        Ok(Session { token, identity })
    }

    fn current_user(&self, token: &SessionToken) -> Result<Option<Identity>, IdentityError> {
        let guard = self.sessions.lock().expect("identity mutex poisoned");
        Ok(guard.get(token).cloned())
    }

    fn sign_out(&self, token: &SessionToken) -> Result<(), IdentityError> {
        let removed = self
            .sessions
            .lock()
            .expect("identity mutex poisoned")
            .remove(token);
        if let Some(identity) = removed {
            self.events.send(IdentityEvent::SignedOut(identity.uid)).ok();
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.events.subscribe()
    }
}
