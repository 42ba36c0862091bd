use tracing::debug;

/// Push-messaging sink for recipients without a live connection. The real
/// transport (FCM or similar) is an external collaborator; delivery is
/// fire-and-forget and never blocks a transition.
pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: i64, title: &str, body: &str);
}

/// Default sink when no push transport is wired up.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, user_id: i64, title: &str, body: &str) {
        debug!(user_id, title, body, "no push transport configured, notification dropped");
    }
}
