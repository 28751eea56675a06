//! Payment widget abstraction
//!
//! The gateway's checkout widget is a black box opened with a
//! [`PaymentRequest`]. Whatever the widget does, it resolves exactly once to
//! a [`PaymentOutcome`].

use crate::config::PaymentConfig;
use crate::types::{CheckoutHandle, Session};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Everything the widget is opened with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Merchant key
    pub key: String,
    /// Amount in the smallest currency subunit
    pub amount_minor: u64,
    /// ISO currency code
    pub currency: String,
    /// Merchant name
    pub merchant_name: String,
    /// Purchase description
    pub description: String,
    /// Gateway order id from "create checkout"
    pub order_id: String,
    /// Theme colour
    pub theme_color: String,
    /// Prefilled payer name
    pub prefill_name: String,
    /// Prefilled payer phone
    pub prefill_contact: String,
}

impl PaymentRequest {
    /// Assemble a request for a checkout
    #[must_use]
    pub fn new(
        config: &PaymentConfig,
        handle: &CheckoutHandle,
        amount_minor: u64,
        payer: &Session,
    ) -> Self {
        Self {
            key: config.key.clone(),
            amount_minor,
            currency: config.currency.clone(),
            merchant_name: config.merchant_name.clone(),
            description: config.description.clone(),
            order_id: handle.gateway_order_id.clone(),
            theme_color: config.theme_color.clone(),
            prefill_name: payer.prefill_name(),
            prefill_contact: payer.phone.clone(),
        }
    }
}

/// How the widget was closed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The gateway took the payment
    Completed {
        /// Gateway transaction id
        transaction_id: String,
    },
    /// The user closed the widget
    Dismissed,
}

/// Future resolved when the widget closes
pub type PaymentFuture = Pin<Box<dyn Future<Output = PaymentOutcome> + Send>>;

/// A payment widget
pub trait PaymentWidget: Send + Sync {
    /// Open the widget
    fn open(&self, request: PaymentRequest) -> PaymentFuture;
}

/// Completion handle given to a callback-style widget
///
/// Consumed by whichever callback fires first. Dropping it unresolved
/// counts as a dismissal.
#[derive(Debug)]
pub struct PaymentCallbacks {
    tx: oneshot::Sender<PaymentOutcome>,
}

impl PaymentCallbacks {
    /// Success callback
    pub fn success(self, transaction_id: impl Into<String>) {
        let _ = self.tx.send(PaymentOutcome::Completed {
            transaction_id: transaction_id.into(),
        });
    }

    /// Dismissal callback
    pub fn dismiss(self) {
        let _ = self.tx.send(PaymentOutcome::Dismissed);
    }
}

type Launcher = dyn Fn(PaymentRequest, PaymentCallbacks) + Send + Sync;

/// Adapts a callback-style gateway SDK to [`PaymentWidget`]
#[derive(Clone)]
pub struct CallbackPaymentWidget {
    launcher: Arc<Launcher>,
}

impl CallbackPaymentWidget {
    /// Wrap a launcher that opens the gateway UI and later fires a callback
    #[must_use]
    pub fn new<F>(launcher: F) -> Self
    where
        F: Fn(PaymentRequest, PaymentCallbacks) + Send + Sync + 'static,
    {
        Self {
            launcher: Arc::new(launcher),
        }
    }
}

impl std::fmt::Debug for CallbackPaymentWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackPaymentWidget").finish_non_exhaustive()
    }
}

impl PaymentWidget for CallbackPaymentWidget {
    fn open(&self, request: PaymentRequest) -> PaymentFuture {
        let (tx, rx) = oneshot::channel();
        tracing::info!(
            order_id = %request.order_id,
            amount_minor = request.amount_minor,
            currency = %request.currency,
            "Opening payment widget"
        );
        (self.launcher)(request, PaymentCallbacks { tx });

        Box::pin(async move { rx.await.unwrap_or(PaymentOutcome::Dismissed) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn request() -> PaymentRequest {
        let session = Session {
            user_id: "u1".into(),
            phone: "9876543210".into(),
            country_code: "91".into(),
            display_name: None,
            auth_token: "t".into(),
            email: None,
            image: None,
            dob: None,
        };
        let handle = CheckoutHandle {
            id: "chk_1".into(),
            amount: 1056.0,
            gateway_order_id: "order_1".into(),
        };
        PaymentRequest::new(&crate::config::Config::default().payment, &handle, 105_600, &session)
    }

    #[test]
    fn test_request_prefill_falls_back_to_phone() {
        let request = request();
        assert_eq!(request.prefill_name, "9876543210");
        assert_eq!(request.prefill_contact, "9876543210");
        assert_eq!(request.order_id, "order_1");
        assert_eq!(request.theme_color, "#ff0f37");
    }

    #[tokio::test]
    async fn test_success_callback_resolves_completed() {
        let widget = CallbackPaymentWidget::new(|_, callbacks| callbacks.success("pay_123"));
        let outcome = widget.open(request()).await;
        assert_eq!(
            outcome,
            PaymentOutcome::Completed {
                transaction_id: "pay_123".into()
            }
        );
    }

    #[tokio::test]
    async fn test_later_callback_from_another_task() {
        let pending: Arc<Mutex<Option<PaymentCallbacks>>> = Arc::default();
        let slot = Arc::clone(&pending);
        let widget = CallbackPaymentWidget::new(move |_, callbacks| {
            if let Ok(mut slot) = slot.lock() {
                *slot = Some(callbacks);
            }
        });

        let outcome = widget.open(request());
        let callbacks = pending.lock().ok().and_then(|mut slot| slot.take());
        tokio::spawn(async move {
            if let Some(callbacks) = callbacks {
                callbacks.dismiss();
            }
        });

        assert_eq!(outcome.await, PaymentOutcome::Dismissed);
    }

    #[tokio::test]
    async fn test_dropped_callbacks_count_as_dismissal() {
        let widget = CallbackPaymentWidget::new(|_, callbacks| drop(callbacks));
        assert_eq!(widget.open(request()).await, PaymentOutcome::Dismissed);
    }
}
