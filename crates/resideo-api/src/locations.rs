// Location discovery endpoint.

use crate::client::ResideoClient;
use crate::error::Error;
use crate::models::Location;

impl ResideoClient {
    /// List every location on the account with its devices.
    ///
    /// `GET /locations`
    pub async fn list_locations(&self) -> Result<Vec<Location>, Error> {
        let url = self.url("locations", None)?;
        self.get(url).await
    }
}
