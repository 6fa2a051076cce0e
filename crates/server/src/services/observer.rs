//! Client-side observation of subscription request decisions.
//!
//! A client waiting on an administrator has no push channel. The
//! [`SubscriptionObserver`] polls the account's most recent request on a
//! fixed interval and reports each decision once.
//!
//! Observation state lives in [`SharedObservation`], owned by the client and
//! handed to every observer it spawns. Tearing an observer down and spawning
//! a new one (leaving and re-entering a page) keeps the record of what was
//! already surfaced, so a decision is never shown twice.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use listing_portal_core::stores::SubscriptionRequestStore;
use listing_portal_core::{AccountId, RequestStatus, SubscriptionRequest, SubscriptionRequestId};

const TRANSITION_BUFFER: usize = 8;

/// Plan selection and receipt entered by the user but not yet submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeDraft {
    pub plan_id: Option<String>,
    pub receipt_reference: Option<String>,
}

impl UpgradeDraft {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.plan_id.is_none() && self.receipt_reference.is_none()
    }
}

/// A decision on a request this client saw pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTransition {
    Approved(SubscriptionRequest),
    Rejected(SubscriptionRequest),
}

impl RequestTransition {
    #[must_use]
    pub const fn request(&self) -> &SubscriptionRequest {
        match self {
            Self::Approved(request) | Self::Rejected(request) => request,
        }
    }
}

/// What one client has observed so far.
#[derive(Debug, Default)]
pub struct ObservationState {
    seen_pending: HashSet<SubscriptionRequestId>,
    surfaced: HashSet<SubscriptionRequestId>,
    pub draft: UpgradeDraft,
}

impl ObservationState {
    /// Fold in the latest poll result.
    ///
    /// Returns a transition only for a request previously seen `pending`
    /// and not surfaced before. A rejection clears the draft.
    pub fn observe(&mut self, latest: Option<&SubscriptionRequest>) -> Option<RequestTransition> {
        let request = latest?;

        if request.status == RequestStatus::Pending {
            self.seen_pending.insert(request.id);
            return None;
        }
        if !self.seen_pending.contains(&request.id) || !self.surfaced.insert(request.id) {
            return None;
        }

        match request.status {
            RequestStatus::Approved => Some(RequestTransition::Approved(request.clone())),
            RequestStatus::Rejected => {
                self.draft.clear();
                Some(RequestTransition::Rejected(request.clone()))
            }
            RequestStatus::Pending => None,
        }
    }

    #[must_use]
    pub fn was_surfaced(&self, id: SubscriptionRequestId) -> bool {
        self.surfaced.contains(&id)
    }
}

/// Observation state shared by every observer a client spawns.
#[derive(Debug, Clone, Default)]
pub struct SharedObservation(Arc<Mutex<ObservationState>>);

impl SharedObservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_draft(&self, draft: UpgradeDraft) {
        self.0.lock().await.draft = draft;
    }

    pub async fn draft(&self) -> UpgradeDraft {
        self.0.lock().await.draft.clone()
    }

    pub async fn was_surfaced(&self, id: SubscriptionRequestId) -> bool {
        self.0.lock().await.was_surfaced(id)
    }

    async fn observe(&self, latest: Option<&SubscriptionRequest>) -> Option<RequestTransition> {
        self.0.lock().await.observe(latest)
    }
}

/// Spawns polling tasks for accounts.
#[derive(Clone)]
pub struct SubscriptionObserver {
    requests: Arc<dyn SubscriptionRequestStore>,
    interval: Duration,
}

impl SubscriptionObserver {
    #[must_use]
    pub fn new(requests: Arc<dyn SubscriptionRequestStore>, interval: Duration) -> Self {
        Self { requests, interval }
    }

    /// Start polling the account's latest request.
    ///
    /// The first poll happens immediately. Must be called inside a tokio runtime.
    #[must_use]
    pub fn watch(&self, account_id: AccountId, state: SharedObservation) -> ObserverHandle {
        let (transition_tx, transitions) = mpsc::channel(TRANSITION_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.requests),
            account_id,
            self.interval,
            state,
            transition_tx,
            shutdown_rx,
        ));

        ObserverHandle {
            transitions,
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

async fn poll_loop(
    requests: Arc<dyn SubscriptionRequestStore>,
    account_id: AccountId,
    interval: Duration,
    state: SharedObservation,
    transitions: mpsc::Sender<RequestTransition>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let latest = match requests.latest_for_account(account_id).await {
                    Ok(latest) => latest,
                    Err(e) => {
                        warn!(%account_id, error = %e, "Subscription poll failed");
                        continue;
                    }
                };

                if let Some(transition) = state.observe(latest.as_ref()).await {
                    info!(
                        %account_id,
                        request_id = %transition.request().id,
                        status = %transition.request().status,
                        "Subscription request decided"
                    );
                    if transitions.send(transition).await.is_err() {
                        break;
                    }
                }
            }
            _ = &mut shutdown => {
                debug!(%account_id, "Subscription observer cancelled");
                break;
            }
        }
    }
}

/// A running observer. Dropping it stops the polling task.
#[derive(Debug)]
pub struct ObserverHandle {
    transitions: mpsc::Receiver<RequestTransition>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ObserverHandle {
    /// Wait for the next decision. `None` once the observer has stopped.
    pub async fn next_transition(&mut self) -> Option<RequestTransition> {
        self.transitions.recv().await
    }

    /// Stop polling and wait for the task to wind down.
    pub async fn cancel(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.task).await;
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use listing_portal_core::NewSubscriptionRequest;
    use rust_decimal::Decimal;

    use super::*;

    fn request(status: RequestStatus) -> SubscriptionRequest {
        let mut request = NewSubscriptionRequest {
            account_id: AccountId::generate(),
            plan_id: "pro".into(),
            receipt_reference: "receipt".into(),
            amount: Decimal::new(10, 0),
            duration: "1 month".into(),
            listings_per_month: 20,
        }
        .into_request(SubscriptionRequestId::generate(), Utc::now());
        request.status = status;
        request
    }

    #[test]
    fn test_surfaces_once_after_pending() {
        let mut state = ObservationState::default();
        let mut req = request(RequestStatus::Pending);

        assert_eq!(state.observe(Some(&req)), None);
        req.status = RequestStatus::Approved;
        assert!(matches!(state.observe(Some(&req)), Some(RequestTransition::Approved(_))));
        assert_eq!(state.observe(Some(&req)), None);
        assert!(state.was_surfaced(req.id));
    }

    #[test]
    fn test_never_seen_pending_is_not_surfaced() {
        let mut state = ObservationState::default();
        let req = request(RequestStatus::Approved);
        assert_eq!(state.observe(Some(&req)), None);
        assert_eq!(state.observe(None), None);
    }

    #[test]
    fn test_rejection_clears_draft() {
        let mut state = ObservationState {
            draft: UpgradeDraft {
                plan_id: Some("pro".into()),
                receipt_reference: Some("receipt".into()),
            },
            ..ObservationState::default()
        };
        let mut req = request(RequestStatus::Pending);
        state.observe(Some(&req));
        req.status = RequestStatus::Rejected;

        assert!(matches!(state.observe(Some(&req)), Some(RequestTransition::Rejected(_))));
        assert!(state.draft.is_empty());
    }

    #[test]
    fn test_approval_keeps_draft() {
        let mut state = ObservationState::default();
        state.draft.plan_id = Some("pro".into());
        let mut req = request(RequestStatus::Pending);
        state.observe(Some(&req));
        req.status = RequestStatus::Approved;
        state.observe(Some(&req));
        assert!(!state.draft.is_empty());
    }
}
