use radiowave_frame::FrameConfig;

/// Configuration shared by every resource kind.
#[derive(Debug, Clone, Default)]
pub struct ResourceConfig {
    /// Frame size limit and socket deadlines.
    pub frame: FrameConfig,
    /// Name used in log fields and pump thread names.
    pub label: Option<String>,
}

impl ResourceConfig {
    /// Set the label used in logs and thread names.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Replace the frame configuration.
    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub(crate) fn label_or(&self, fallback: &str) -> std::sync::Arc<str> {
        match &self.label {
            Some(label) => std::sync::Arc::from(label.as_str()),
            None => std::sync::Arc::from(fallback),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults() {
        let config = ResourceConfig::default();
        assert_eq!(config.frame.max_payload_size, radiowave_frame::DEFAULT_MAX_PAYLOAD);
        assert!(config.frame.read_timeout.is_none());
        assert!(config.label.is_none());
        assert_eq!(&*config.label_or("conn"), "conn");
    }

    #[test]
    fn builders() {
        let config = ResourceConfig::default()
            .with_label("worker")
            .with_frame_config(
                FrameConfig::default()
                    .with_max_payload_size(1024)
                    .with_read_timeout(Duration::from_secs(2)),
            );

        assert_eq!(&*config.label_or("conn"), "worker");
        assert_eq!(config.frame.max_payload_size, 1024);
        assert_eq!(config.frame.read_timeout, Some(Duration::from_secs(2)));
        assert!(config.frame.write_timeout.is_none());
    }
}
