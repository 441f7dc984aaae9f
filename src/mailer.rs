use async_trait::async_trait;
use tracing::info;

/// Out-of-band delivery channel for verification codes. A delivery failure
/// must never roll back the code's creation: the code is already persisted
/// by the time `deliver` is called.
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Stand-in delivery that logs instead of sending mail. Real SMTP wiring
/// lives outside this service; swap the trait object in `AppState` to
/// integrate one.
pub struct LogDelivery;

#[async_trait]
impl CodeDelivery for LogDelivery {
    async fn deliver(&self, email: &str, _code: &str) -> anyhow::Result<()> {
        info!(email = %email, "verification code issued (delivery stubbed)");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records deliveries for assertions.
    #[derive(Default)]
    pub struct RecordingDelivery {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CodeDelivery for RecordingDelivery {
        async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), code.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn recording_delivery_captures_messages() {
        let delivery = RecordingDelivery::default();
        delivery
            .deliver("alice@uni-bayreuth.de", "123456")
            .await
            .unwrap();
        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "alice@uni-bayreuth.de");
        assert_eq!(sent[0].1, "123456");
    }
}
