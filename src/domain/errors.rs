// Error taxonomy for the dashboard core
use super::field::FieldKey;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// Malformed widget definition or layout payload; the operation was rejected as a whole.
    #[error("Invalid widget definition: {message}")]
    Validation { message: String },

    /// Network or HTTP failure while refreshing a field. Never reaches callers.
    #[error("Fetch failed for {key}: {message}")]
    TransientFetch { key: FieldKey, message: String },

    /// Durable store read/write failure. Logged, in-memory state keeps going.
    #[error("Persistence failure on {blob}: {message}")]
    Persistence { blob: &'static str, message: String },

    /// Layout geometry that points at a widget the registry does not hold.
    #[error("Layout entry references unknown widget {widget_id}")]
    StateInconsistency { widget_id: String },

    #[error("Widget {id} not found")]
    UnknownWidget { id: String },
}

impl DashboardError {
    pub fn validation(message: impl Into<String>) -> Self {
        DashboardError::Validation {
            message: message.into(),
        }
    }

    pub fn persistence(blob: &'static str, message: impl std::fmt::Display) -> Self {
        DashboardError::Persistence {
            blob,
            message: message.to_string(),
        }
    }

    /// Whether the error is meant for the caller rather than the log.
    pub fn is_caller_visible(&self) -> bool {
        match self {
            DashboardError::Validation { .. }
            | DashboardError::StateInconsistency { .. }
            | DashboardError::UnknownWidget { .. } => true,

            DashboardError::TransientFetch { .. } | DashboardError::Persistence { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_visibility() {
        assert!(DashboardError::validation("title is required").is_caller_visible());
        assert!(
            DashboardError::StateInconsistency {
                widget_id: "w1".to_string()
            }
            .is_caller_visible()
        );
        assert!(!DashboardError::persistence("layout", "disk full").is_caller_visible());
        assert!(
            !DashboardError::TransientFetch {
                key: FieldKey::new("lobby", "cam-1", "person_in"),
                message: "503".to_string(),
            }
            .is_caller_visible()
        );
    }

    #[test]
    fn test_display() {
        let err = DashboardError::TransientFetch {
            key: FieldKey::new("lobby", "cam-1", "person_in"),
            message: "timed out".to_string(),
        };
        assert_eq!(err.to_string(), "Fetch failed for lobby/cam-1/person_in: timed out");
    }
}
