use std::fmt;

/// ONVIF operations the proxy knows how to treat. Anything else passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtzOperation {
    GetCapabilities,
    GetProfiles,
    GetConfiguration,
    GetConfigurationOptions,
    GetStatus,
    GetPresets,
    GetServiceCapabilities,
    RelativeMove,
    GoToPreset,
    ContinuousMove,
    AbsoluteMove,
    Stop,
    Other(String),
}

impl PtzOperation {
    /// Map the local name of the first SOAP Body child to an operation
    pub fn from_action(action: &str) -> Self {
        match action {
            "GetCapabilities" => Self::GetCapabilities,
            "GetProfiles" => Self::GetProfiles,
            "GetConfiguration" => Self::GetConfiguration,
            "GetConfigurationOptions" => Self::GetConfigurationOptions,
            "GetStatus" => Self::GetStatus,
            "GetPresets" => Self::GetPresets,
            "GetServiceCapabilities" => Self::GetServiceCapabilities,
            "RelativeMove" => Self::RelativeMove,
            "GotoPreset" | "GoToPreset" => Self::GoToPreset,
            "ContinuousMove" => Self::ContinuousMove,
            "AbsoluteMove" => Self::AbsoluteMove,
            "Stop" => Self::Stop,
            other => Self::Other(other.to_string()),
        }
    }

    /// Operation carried by a SOAP request body; "Unknown" when none is found
    pub fn from_request(xml: &str) -> Self {
        match crate::soap::extract_soap_action(xml) {
            Some(action) => Self::from_action(&action),
            None => Self::Other("Unknown".to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::GetCapabilities => "GetCapabilities",
            Self::GetProfiles => "GetProfiles",
            Self::GetConfiguration => "GetConfiguration",
            Self::GetConfigurationOptions => "GetConfigurationOptions",
            Self::GetStatus => "GetStatus",
            Self::GetPresets => "GetPresets",
            Self::GetServiceCapabilities => "GetServiceCapabilities",
            Self::RelativeMove => "RelativeMove",
            Self::GoToPreset => "GotoPreset",
            Self::ContinuousMove => "ContinuousMove",
            Self::AbsoluteMove => "AbsoluteMove",
            Self::Stop => "Stop",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for PtzOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
