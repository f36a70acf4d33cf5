use serde::{Deserialize, Serialize};

const MOBILE_UA_MARKERS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
    "mobile",
    "crios",
];

const MOBILE_MAX_WINDOW_WIDTH: u32 = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
        }
    }
}

/// Browser/device facts reported by the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub window_width: u32,
    pub window_height: u32,
    pub touch_capable: bool,
    pub has_orientation: bool,
}

impl DeviceInfo {
    pub fn is_mobile(&self) -> bool {
        let ua = self.user_agent.to_ascii_lowercase();
        let mobile_ua = MOBILE_UA_MARKERS.iter().any(|marker| ua.contains(marker));
        let narrow_touch = self.touch_capable && self.window_width < MOBILE_MAX_WINDOW_WIDTH;

        mobile_ua || narrow_touch || self.has_orientation
    }

    pub fn device_type(&self) -> DeviceType {
        if !self.is_mobile() {
            return DeviceType::Desktop;
        }
        if self.user_agent.to_ascii_lowercase().contains("ipad") {
            DeviceType::Tablet
        } else {
            DeviceType::Mobile
        }
    }

    pub fn screen_size(&self) -> String {
        format!("{}x{}", self.screen_width, self.screen_height)
    }
}
