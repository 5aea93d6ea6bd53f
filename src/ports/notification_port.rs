//! Notification sink port.

/// Fire-and-forget text notifications. Implementations log delivery
/// failures and never return them.
pub trait NotificationPort {
    fn notify(&self, message: &str);
}
