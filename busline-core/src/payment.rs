use serde::{Deserialize, Serialize};

/// Outcome reported by the payment gateway for a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentSignal {
    pub payment_reference_id: String,
    pub success: bool,
}

impl PaymentSignal {
    pub fn succeeded(reference: impl Into<String>) -> Self {
        Self { payment_reference_id: reference.into(), success: true }
    }

    pub fn failed(reference: impl Into<String>) -> Self {
        Self { payment_reference_id: reference.into(), success: false }
    }
}
