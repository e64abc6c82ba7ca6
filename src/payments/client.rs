use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::PaymentError;

/// Ceiling on one provider round trip.
pub const PAYMENT_TIMEOUT_SECS: u64 = 30;

/// What the storefront hands to the provider to open a hosted checkout page.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub customer_email: String,
    /// Our correlation id, echoed back by the provider.
    pub client_reference: String,
    pub item_name: String,
    pub item_description: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A hosted checkout session. The id rides back on the return URL's
/// `session_id` query parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// The provider's answer when a session is looked up after the redirect
/// back. Only `verified == true` settles anything.
#[derive(Debug, Clone)]
pub struct SessionVerification {
    pub verified: bool,
    pub amount_cents: Option<i64>,
    pub customer_email: Option<String>,
}

/// Hosted-checkout backend. Implemented by the HTTP client in production
/// and by a configurable mock in tests.
pub trait PaymentClient: Send + Sync {
    fn create_checkout(&self, request: &CheckoutRequest)
        -> Result<CheckoutSession, PaymentError>;

    fn verify_session(&self, session_id: &str) -> Result<SessionVerification, PaymentError>;
}

/// HTTP client for a hosted-checkout payment provider.
pub struct HttpPaymentClient {
    base_url: String,
    secret_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpPaymentClient {
    pub fn new(base_url: &str, secret_key: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            client,
            timeout_secs,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> PaymentError {
        if e.is_timeout() {
            PaymentError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            PaymentError::Unreachable(self.base_url.clone())
        } else {
            PaymentError::Http(e.to_string())
        }
    }
}

/// Response body from GET {base_url}/checkout/sessions/{id}
#[derive(Deserialize)]
struct SessionStatusResponse {
    payment_status: String,
    amount_cents: Option<i64>,
    customer_email: Option<String>,
}

impl PaymentClient for HttpPaymentClient {
    fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/checkout/sessions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(request)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(PaymentError::AuthFailed);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PaymentError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| PaymentError::MalformedReply(e.to_string()))
    }

    fn verify_session(&self, session_id: &str) -> Result<SessionVerification, PaymentError> {
        let url = format!("{}/checkout/sessions/{session_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::SessionUnknown(session_id.to_string()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(PaymentError::AuthFailed);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PaymentError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SessionStatusResponse = response
            .json()
            .map_err(|e| PaymentError::MalformedReply(e.to_string()))?;

        Ok(SessionVerification {
            verified: parsed.payment_status == "paid",
            amount_cents: parsed.amount_cents,
            customer_email: parsed.customer_email,
        })
    }
}

/// Configurable provider double for tests: hands out one fixed session and
/// answers verification from a verdict table.
pub struct MockPaymentClient {
    next_session: Option<CheckoutSession>,
    verdicts: Mutex<HashMap<String, bool>>,
}

impl MockPaymentClient {
    /// Checkout succeeds with the given session id; no verdicts yet.
    pub fn with_session(id: &str) -> Self {
        Self {
            next_session: Some(CheckoutSession {
                id: id.to_string(),
                url: format!("https://checkout.example.test/{id}"),
            }),
            verdicts: Mutex::new(HashMap::new()),
        }
    }

    /// Checkout creation fails as if the provider were down.
    pub fn unreachable() -> Self {
        Self {
            next_session: None,
            verdicts: Mutex::new(HashMap::new()),
        }
    }

    pub fn mark_paid(&self, session_id: &str) {
        self.verdicts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), true);
    }

    pub fn mark_unpaid(&self, session_id: &str) {
        self.verdicts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), false);
    }
}

impl PaymentClient for MockPaymentClient {
    fn create_checkout(
        &self,
        _request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.next_session
            .clone()
            .ok_or_else(|| PaymentError::Unreachable("https://pay.example.test".to_string()))
    }

    fn verify_session(&self, session_id: &str) -> Result<SessionVerification, PaymentError> {
        match self
            .verdicts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
        {
            Some(&verified) => Ok(SessionVerification {
                verified,
                amount_cents: None,
                customer_email: None,
            }),
            None => Err(PaymentError::SessionUnknown(session_id.to_string())),
        }
    }
}
