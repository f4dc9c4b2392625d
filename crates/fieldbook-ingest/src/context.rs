//! Who sent an upload and through which channel

use fieldbook_core::Requester;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadContext {
    pub requester: Requester,

    /// Server-to-server import: skips the membership check and records
    /// the entry as anonymous
    pub private_import: bool,
}

impl UploadContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: u64) -> Self {
        Self {
            requester: Requester::user(user_id),
            private_import: false,
        }
    }

    pub fn private_import() -> Self {
        Self {
            requester: Requester::anonymous(),
            private_import: true,
        }
    }

    /// The requester recorded on the entry
    pub fn recorded_requester(&self) -> Requester {
        if self.private_import {
            Requester::anonymous()
        } else {
            self.requester
        }
    }
}
