//! Terminal confirmation step

use tracing::info;

use crate::store::{StateStore, StoreError};
use crate::submission::NavigationState;

/// What the confirmation step shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationScreen {
    pub submission_id: Option<String>,
}

impl ConfirmationScreen {
    /// Mount the confirmation step.
    ///
    /// Reached without a submission id (reload, deep link, short-audio exit),
    /// no further answers are meaningful, so the store is cleared.
    pub fn enter<S: StateStore>(
        store: &mut S,
        navigation: Option<NavigationState>,
    ) -> Result<Self, StoreError> {
        let submission_id = navigation.map(|n| n.submission_id);
        if submission_id.is_none() {
            info!("Confirmation reached without submission id, clearing stale answers");
            store.reset()?;
        }
        Ok(Self { submission_id })
    }
}
