// # SMS Sender Trait
//
// Interface for sending templated text messages.
//
// ## Implementations
//
// - Tencent Cloud SMS: `svckit-tencentcloud` crate

use async_trait::async_trait;

/// Largest number of recipients a single send accepts
pub const MAX_PHONE_NUMBERS: usize = 200;

/// A templated text message
///
/// The provider renders the message from `template_id` and
/// `template_params`; the caller never supplies the final text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmsMessage {
    /// SMS application id
    pub sdk_app_id: String,
    /// Approved signature name
    pub sign_name: String,
    /// Approved template id
    pub template_id: String,
    /// Template parameters, in template order
    pub template_params: Vec<String>,
    /// Recipients in E.164 form (e.g. "+8613711112222")
    pub phone_numbers: Vec<String>,
    /// Opaque context echoed back by the provider
    pub session_context: String,
}

impl SmsMessage {
    /// Validate the message before it is sent
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.phone_numbers.is_empty() {
            return Err(crate::Error::invalid_input("at least one phone number is required"));
        }
        if self.phone_numbers.len() > MAX_PHONE_NUMBERS {
            return Err(crate::Error::invalid_input(format!(
                "at most {} phone numbers per send, got {}",
                MAX_PHONE_NUMBERS,
                self.phone_numbers.len()
            )));
        }
        if self.sdk_app_id.is_empty() || self.template_id.is_empty() {
            return Err(crate::Error::invalid_input(
                "sdk app id and template id are required",
            ));
        }
        Ok(())
    }
}

/// Delivery status for one recipient
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendStatus {
    /// Provider serial number
    pub serial_no: String,
    /// Recipient
    pub phone_number: String,
    /// Billed message count
    pub fee: u64,
    /// Status code ("Ok" on success)
    pub code: String,
    /// Status message
    pub message: String,
    /// Recipient country code
    pub iso_code: String,
}

impl SendStatus {
    /// Whether the provider accepted the message for this recipient
    pub fn is_ok(&self) -> bool {
        self.code.eq_ignore_ascii_case("ok")
    }
}

/// Result of a send call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// Provider request id
    pub request_id: String,
    /// Per-recipient statuses
    pub statuses: Vec<SendStatus>,
}

impl SendReceipt {
    /// Recipients the provider rejected
    pub fn failed(&self) -> impl Iterator<Item = &SendStatus> {
        self.statuses.iter().filter(|status| !status.is_ok())
    }
}

/// Trait for SMS sender implementations
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Send a templated message
    async fn send(&self, message: &SmsMessage) -> Result<SendReceipt, crate::Error>;

    /// Get the sender name (for logging/debugging)
    fn sender_name(&self) -> &'static str;
}
