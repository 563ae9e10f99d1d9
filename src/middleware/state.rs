use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;

use super::config::WebSettings;
use super::session::CookieSession;
use crate::gate::RequestGate;

/// Shared state for gate route handlers.
pub(super) struct GateState<I, P, C, V> {
    pub(super) gate: RequestGate<I, P, C>,
    pub(super) views: Arc<V>,
    pub(super) settings: WebSettings,
}

// Manual Clone: avoid derive adding `I: Clone, P: Clone, C: Clone, V: Clone` bounds.
impl<I, P, C, V> Clone for GateState<I, P, C, V> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            views: self.views.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<I, P, C, V> GateState<I, P, C, V> {
    pub(super) fn session(&self, jar: PrivateCookieJar) -> CookieSession {
        CookieSession::new(jar, &self.settings)
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<I, P, C, V> FromRef<GateState<I, P, C, V>> for Key {
    fn from_ref(state: &GateState<I, P, C, V>) -> Self {
        state.settings.cookie_key.clone()
    }
}
