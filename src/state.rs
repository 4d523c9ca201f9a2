use std::sync::Arc;

use crate::config::SessionConfig;
use crate::manager::ManagerHandle;
use crate::otp::OtpStore;

#[derive(Clone)]
pub struct AppState {
    pub manager: ManagerHandle,
    pub otps: OtpStore,
    pub session: Arc<SessionConfig>,
}
