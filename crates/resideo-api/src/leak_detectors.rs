// Water leak detector endpoint (read-only).

use crate::client::ResideoClient;
use crate::error::Error;
use crate::models::LeakDetector;

impl ResideoClient {
    /// `GET /devices/waterLeakDetectors/{id}`
    pub async fn get_leak_detector(
        &self,
        device_id: &str,
        location_id: u64,
    ) -> Result<LeakDetector, Error> {
        let url = self.url(
            &format!("devices/waterLeakDetectors/{device_id}"),
            Some(location_id),
        )?;
        self.get(url).await
    }
}
