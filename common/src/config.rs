use serde::{Deserialize, Serialize};

/// Timing and conversion settings for the relay runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Current sensor sampling period.
    pub sample_period_ms: u64,
    /// Local display refresh period.
    pub display_refresh_ms: u64,
    /// Interval for pushing the current reading to the remote channel.
    pub current_publish_ms: u64,
    /// Millivolt-to-milliamp ratio of the sense circuit.
    pub current_coeff_numerator: u32,
    pub current_coeff_denominator: u32,
    /// Nominal ADC reference used by the uncalibrated fallback.
    pub adc_vref_mv: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 100,
            display_refresh_ms: 50,
            current_publish_ms: 1_000,
            current_coeff_numerator: 1,
            current_coeff_denominator: 1,
            adc_vref_mv: 1_100,
        }
    }
}

impl RelayConfig {
    /// Clamps persisted values into usable ranges; a hand-edited config
    /// file must not be able to stall a loop or divide by zero.
    pub fn sanitize(&mut self) {
        self.sample_period_ms = self.sample_period_ms.clamp(10, 60_000);
        self.display_refresh_ms = self.display_refresh_ms.clamp(10, 10_000);
        self.current_publish_ms = self.current_publish_ms.clamp(100, 3_600_000);
        if self.current_coeff_denominator == 0 {
            self.current_coeff_denominator = 1;
        }
        if self.adc_vref_mv == 0 {
            self.adc_vref_mv = 1_100;
        }
    }
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub client_id: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            client_id: "smart-relay".to_string(),
        }
    }
}

/// Aggregate persisted configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.relay.sanitize();
        if self.network.mqtt_port == 0 {
            self.network.mqtt_port = 1883;
        }
        if self.network.client_id.is_empty() {
            self.network.client_id = "smart-relay".to_string();
        }
    }
}
