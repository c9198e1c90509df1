// Shutoff valve endpoints.

use crate::client::ResideoClient;
use crate::error::Error;
use crate::models::{ShutoffValve, ValveChangeRequest};

impl ResideoClient {
    /// `GET /devices/shutoffvalve/{id}`
    pub async fn get_valve(&self, device_id: &str, location_id: u64) -> Result<ShutoffValve, Error> {
        let url = self.url(&format!("devices/shutoffvalve/{device_id}"), Some(location_id))?;
        self.get(url).await
    }

    /// Open or close the valve.
    ///
    /// `POST /devices/shutoffvalve/{id}`
    pub async fn set_valve(
        &self,
        device_id: &str,
        location_id: u64,
        request: &ValveChangeRequest,
    ) -> Result<(), Error> {
        let url = self.url(&format!("devices/shutoffvalve/{device_id}"), Some(location_id))?;
        self.post(url, request).await
    }
}
