//! Outbound notifications. Currently only OTP delivery email.

mod email;

pub use email::{OtpDelivery, SmtpOtpMailer};
