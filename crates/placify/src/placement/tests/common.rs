use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::placement::domain::{
    normalize_email, NewSubmission, Stream, StudentDetails, Submission, SubmissionForm,
    SubmissionId,
};
use crate::placement::identity::{
    Identity, IdentityError, IdentityEvent, IdentityId, IdentityProvider, Session, SessionToken,
    SignInRequest,
};
use crate::placement::store::{
    violates_uniqueness, StoreError, SubmissionFilter, SubmissionOrder, SubmissionPatch,
    SubmissionStore,
};
use crate::placement::{placement_router, PlacementService};

pub(super) fn form(name: &str, email: &str, cgpa: &str, stream: &str) -> SubmissionForm {
    SubmissionForm {
        name: name.to_string(),
        email: email.to_string(),
        sr_number: "SR-1042".to_string(),
        university_number: "U-77881".to_string(),
        cgpa: cgpa.to_string(),
        stream: stream.to_string(),
    }
}

pub(super) fn identity(email: &str) -> Identity {
    Identity {
        uid: IdentityId(format!("uid-{}", normalize_email(email))),
        email: email.to_string(),
        display_name: None,
    }
}

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn stored(
    id: &str,
    name: &str,
    cgpa: f64,
    stream: Stream,
    timestamp: DateTime<Utc>,
) -> Submission {
    let email = format!("{}@example.edu", name.to_lowercase().replace(' ', "."));
    Submission {
        id: SubmissionId(id.to_string()),
        owner: identity(&email).uid,
        details: StudentDetails {
            name: name.to_string(),
            email,
            sr_number: format!("SR-{id}"),
            university_number: format!("U-{id}"),
            cgpa,
            stream,
        },
        timestamp,
        eligibility: BTreeMap::new(),
    }
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    records: Vec<Submission>,
}

#[derive(Default)]
pub(super) struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub(super) fn with_records(records: Vec<Submission>) -> Self {
        let store = Self::default();
        store.state.lock().expect("store mutex poisoned").records = records;
        store
    }

    pub(super) fn len(&self) -> usize {
        self.state.lock().expect("store mutex poisoned").records.len()
    }
}

impl SubmissionStore for MemoryStore {
    fn query(
        &self,
        filter: &SubmissionFilter,
        order: SubmissionOrder,
    ) -> Result<Vec<Submission>, StoreError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        let mut matches: Vec<Submission> = guard
            .records
            .iter()
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
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.records.iter().find(|record| record.id == *id).cloned())
    }

    fn insert(&self, submission: NewSubmission) -> Result<Submission, StoreError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        let email_key = submission.details.email_key();
        if guard
            .records
            .iter()
            .any(|existing| violates_uniqueness(existing, &submission.owner, &email_key))
        {
            return Err(StoreError::Conflict);
        }

        guard.next_id += 1;
        let record = Submission {
            id: SubmissionId(format!("sub-{:03}", guard.next_id)),
            owner: submission.owner,
            details: submission.details,
            timestamp: submission.timestamp,
            eligibility: BTreeMap::new(),
        };
        guard.records.push(record.clone());
        Ok(record)
    }

    fn update(&self, id: &SubmissionId, patch: SubmissionPatch) -> Result<(), StoreError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        if let SubmissionPatch::Details { details, .. } = &patch {
            let email_key = details.email_key();
            if guard
                .records
                .iter()
                .any(|existing| existing.id != *id && existing.details.email_key() == email_key)
            {
                return Err(StoreError::Conflict);
            }
        }

        let record = guard
            .records
            .iter_mut()
            .find(|record| record.id == *id)
            .ok_or(StoreError::NotFound)?;
        patch.apply(record);
        Ok(())
    }

    fn delete(&self, id: &SubmissionId) -> Result<(), StoreError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        let index = guard
            .records
            .iter()
            .position(|record| record.id == *id)
            .ok_or(StoreError::NotFound)?;
        guard.records.remove(index);
        Ok(())
    }
}

pub(super) struct UnavailableStore;

impl SubmissionStore for UnavailableStore {
    fn query(
        &self,
        _filter: &SubmissionFilter,
        _order: SubmissionOrder,
    ) -> Result<Vec<Submission>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn get_all(&self) -> Result<Vec<Submission>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn insert(&self, _submission: NewSubmission) -> Result<Submission, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _id: &SubmissionId, _patch: SubmissionPatch) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &SubmissionId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Store whose queries always return the same documents, ignoring the filter.
pub(super) struct DuplicateStore(pub(super) Vec<Submission>);

impl SubmissionStore for DuplicateStore {
    fn query(
        &self,
        _filter: &SubmissionFilter,
        _order: SubmissionOrder,
    ) -> Result<Vec<Submission>, StoreError> {
        Ok(self.0.clone())
    }

    fn get_all(&self) -> Result<Vec<Submission>, StoreError> {
        Ok(self.0.clone())
    }

    fn fetch(&self, _id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        Ok(None)
    }

    fn insert(&self, _submission: NewSubmission) -> Result<Submission, StoreError> {
        Err(StoreError::Unavailable("read only".to_string()))
    }

    fn update(&self, _id: &SubmissionId, _patch: SubmissionPatch) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read only".to_string()))
    }

    fn delete(&self, _id: &SubmissionId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read only".to_string()))
    }
}

pub(super) struct MemoryIdentity {
    sessions: Mutex<HashMap<SessionToken, Identity>>,
    issued: Mutex<u64>,
    events: broadcast::Sender<IdentityEvent>,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            sessions: Mutex::new(HashMap::new()),
            issued: Mutex::new(0),
            events,
        }
    }
}

impl IdentityProvider for MemoryIdentity {
    fn sign_in(&self, request: SignInRequest) -> Result<Session, IdentityError> {
        let mut issued = self.issued.lock().expect("identity mutex poisoned");
        *issued += 1;
        let token = SessionToken(format!("token-{}", *issued));
        let mut identity = identity(request.email.trim());
        identity.display_name = request.display_name;

        self.sessions
            .lock()
            .expect("identity mutex poisoned")
            .insert(token.clone(), identity.clone());
        let _ = self.events.send(IdentityEvent::SignedIn(identity.clone()));
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
            let _ = self.events.send(IdentityEvent::SignedOut(identity.uid));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.events.subscribe()
    }
}

pub(super) fn build_service() -> (
    PlacementService<MemoryStore, MemoryIdentity>,
    Arc<MemoryStore>,
    Arc<MemoryIdentity>,
) {
    build_service_with(MemoryStore::default())
}

pub(super) fn build_service_with(
    store: MemoryStore,
) -> (
    PlacementService<MemoryStore, MemoryIdentity>,
    Arc<MemoryStore>,
    Arc<MemoryIdentity>,
) {
    let store = Arc::new(store);
    let identity = Arc::new(MemoryIdentity::default());
    let service = PlacementService::new(store.clone(), identity.clone());
    (service, store, identity)
}

pub(super) fn router_for<S, I>(service: PlacementService<S, I>) -> axum::Router
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    placement_router(Arc::new(service))
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("json body")))
        .expect("request builds")
}

pub(super) fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

pub(super) async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body")
        .to_vec()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = read_body(response).await;
    serde_json::from_slice(&body).expect("json payload")
}
