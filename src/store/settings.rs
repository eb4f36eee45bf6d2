use super::{read_json_file, write_json_file, Store};
use crate::errors::{StoreError, StoreResult};
use crate::models::Settings;

impl Store {
    /// A missing settings document reads as defaults.
    pub fn settings(&self) -> StoreResult<Settings> {
        match read_json_file::<Settings>(&self.settings_path()) {
            Ok(settings) => Ok(settings),
            Err(StoreError::NotFound(_)) => Ok(Settings::default()),
            Err(StoreError::Parse(error)) => Err(StoreError::Parse(format!("settings document is corrupt: {}", error))),
            Err(error) => Err(error),
        }
    }

    pub fn milestone_order(&self) -> StoreResult<Vec<String>> {
        Ok(self.settings()?.milestone_order.unwrap_or_default())
    }

    pub fn set_milestone_order(&self, order: Vec<String>) -> StoreResult<()> {
        let _lock = self.lock_settings()?;
        let mut settings = self.settings()?;
        settings.milestone_order = Some(order);
        write_json_file(&self.settings_path(), &settings)
    }
}
