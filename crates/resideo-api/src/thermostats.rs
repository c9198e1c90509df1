// Thermostat endpoints: system state, fan, room priority and T9 room sensors.

use crate::client::ResideoClient;
use crate::error::Error;
use crate::models::{
    FanChangeRequest, FanState, Priority, PriorityChangeRequest, RoomsResponse, Thermostat,
    ThermostatChangeRequest,
};

impl ResideoClient {
    /// `GET /devices/thermostats/{id}`
    pub async fn get_thermostat(&self, device_id: &str, location_id: u64) -> Result<Thermostat, Error> {
        let url = self.url(&format!("devices/thermostats/{device_id}"), Some(location_id))?;
        self.get(url).await
    }

    /// Change mode and setpoints.
    ///
    /// `POST /devices/thermostats/{id}`
    pub async fn set_thermostat(
        &self,
        device_id: &str,
        location_id: u64,
        request: &ThermostatChangeRequest,
    ) -> Result<(), Error> {
        let url = self.url(&format!("devices/thermostats/{device_id}"), Some(location_id))?;
        self.post(url, request).await
    }

    /// `GET /devices/thermostats/{id}/fan`
    pub async fn get_fan(&self, device_id: &str, location_id: u64) -> Result<FanState, Error> {
        let url = self.url(&format!("devices/thermostats/{device_id}/fan"), Some(location_id))?;
        self.get(url).await
    }

    /// `POST /devices/thermostats/{id}/fan`
    pub async fn set_fan(
        &self,
        device_id: &str,
        location_id: u64,
        request: &FanChangeRequest,
    ) -> Result<(), Error> {
        let url = self.url(&format!("devices/thermostats/{device_id}/fan"), Some(location_id))?;
        self.post(url, request).await
    }

    /// `GET /devices/thermostats/{id}/priority`
    pub async fn get_priority(&self, device_id: &str, location_id: u64) -> Result<Priority, Error> {
        let url = self.url(
            &format!("devices/thermostats/{device_id}/priority"),
            Some(location_id),
        )?;
        self.get(url).await
    }

    /// `PUT /devices/thermostats/{id}/priority`
    pub async fn set_priority(
        &self,
        device_id: &str,
        location_id: u64,
        request: &PriorityChangeRequest,
    ) -> Result<(), Error> {
        let url = self.url(
            &format!("devices/thermostats/{device_id}/priority"),
            Some(location_id),
        )?;
        self.put(url, request).await
    }

    /// Sensor readings for every room in a T9 group.
    ///
    /// `GET /devices/thermostats/{id}/group/{group}/rooms`
    pub async fn list_rooms(
        &self,
        device_id: &str,
        group_id: u32,
        location_id: u64,
    ) -> Result<RoomsResponse, Error> {
        let url = self.url(
            &format!("devices/thermostats/{device_id}/group/{group_id}/rooms"),
            Some(location_id),
        )?;
        self.get(url).await
    }
}
