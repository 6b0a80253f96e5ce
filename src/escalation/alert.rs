//! Emergency alert texts

use serde::Serialize;

/// Total device-critical indicators a reading can raise.
const INDICATOR_TOTAL: u8 = 4;

/// What raised the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Consecutive qualifying readings
    Automatic,
    /// Operator request
    Manual,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Automatic => write!(f, "automatic"),
            AlertKind::Manual => write!(f, "manual"),
        }
    }
}

/// One emergency alert, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    pub critical_indicators: u8,
}

impl Alert {
    pub fn automatic(consecutive: usize, critical_indicators: u8) -> Self {
        Self {
            kind: AlertKind::Automatic,
            message: format!(
                "AUTOMATIC EMERGENCY ALERT: {consecutive} consecutive critical readings detected \
                 with {critical_indicators} critical indicators and confirmed anomaly detection."
            ),
            critical_indicators,
        }
    }

    pub fn manual(critical_indicators: u8) -> Self {
        Self {
            kind: AlertKind::Manual,
            message: format!(
                "CRITICAL ALERT: Smart Factory Dashboard detected critical anomalies with \
                 {critical_indicators} critical indicators. Please check the system immediately."
            ),
            critical_indicators,
        }
    }

    /// Script read out on the voice call.
    pub fn voice_script(&self) -> String {
        format!(
            "CRITICAL FACTORY ALERT! This is an automated emergency call from your Smart Factory \
             Dashboard. We have detected {} out of {INDICATOR_TOTAL} critical sensor failures with \
             confirmed anomaly detection. {} Please respond immediately to prevent equipment \
             damage. Check your dashboard at your earliest convenience.",
            self.critical_indicators, self.message
        )
    }

    /// Short text for SMS.
    pub fn sms_text(&self) -> String {
        format!(
            "FACTORY ALERT: {}/{INDICATOR_TOTAL} critical sensors failed. Anomaly detected. \
             Check dashboard immediately!",
            self.critical_indicators
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_automatic_message_embeds_counts() {
        let alert = Alert::automatic(2, 3);
        assert_eq!(
            alert.message,
            "AUTOMATIC EMERGENCY ALERT: 2 consecutive critical readings detected with 3 critical \
             indicators and confirmed anomaly detection."
        );
        assert_eq!(alert.kind, AlertKind::Automatic);
    }

    #[test]
    fn test_manual_message() {
        let alert = Alert::manual(4);
        assert!(alert.message.starts_with("CRITICAL ALERT:"));
        assert!(alert.message.contains("with 4 critical indicators"));
    }

    #[test]
    fn test_voice_script_wraps_message() {
        let alert = Alert::automatic(4, 2);
        let script = alert.voice_script();
        assert!(script.starts_with("CRITICAL FACTORY ALERT!"));
        assert!(script.contains("2 out of 4 critical sensor failures"));
        assert!(script.contains(&alert.message));
    }

    #[test]
    fn test_sms_text() {
        assert_eq!(
            Alert::manual(3).sms_text(),
            "FACTORY ALERT: 3/4 critical sensors failed. Anomaly detected. Check dashboard immediately!"
        );
    }
}
