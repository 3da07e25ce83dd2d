//! Placeholder publishers for platforms without automation yet

use async_trait::async_trait;
use std::path::Path;

use super::Publisher;
use crate::error::PlatformError;
use crate::types::PlatformId;

#[derive(Debug, Clone, Copy)]
pub struct StubPublisher {
    platform: PlatformId,
}

impl StubPublisher {
    pub fn new(platform: PlatformId) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Publisher for StubPublisher {
    fn platform(&self) -> PlatformId {
        self.platform
    }

    fn is_implemented(&self) -> bool {
        false
    }

    async fn publish(&self, _text: &str, _media: Option<&Path>) -> Result<String, PlatformError> {
        Err(PlatformError::NotImplemented(format!(
            "{} posting not implemented yet.",
            self.platform
        )))
    }
}
