use aggregator::config::Config as ServiceConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(flatten)]
    pub service: ServiceConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator::config::ManualStoreConfig;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            listener:
                host: 0.0.0.0
                port: 3000
            admin_listener:
                host: 127.0.0.1
                port: 3001
            manual_store:
                type: filesystem
                path: /var/lib/sportswire/data.json
            upstream:
                timeout_secs: 8
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://public@sentry.example.com/1
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(
            config.common.metrics,
            Some(MetricsConfig {
                statsd_host: "127.0.0.1".into(),
                statsd_port: 8125,
            })
        );
        assert!(config.common.logging.is_some());
        assert_eq!(config.service.listener.port, 3000);
        assert_eq!(config.service.upstream.timeout_secs, 8);
        assert_eq!(
            config.service.manual_store,
            ManualStoreConfig::Filesystem {
                path: "/var/lib/sportswire/data.json".into()
            }
        );
        assert!(config.service.validate().is_ok());
    }

    #[test]
    fn minimal_config() {
        let yaml = r#"
            listener: {host: 0.0.0.0, port: 3000}
            admin_listener: {host: 127.0.0.1, port: 3001}
            manual_store: {type: memory}
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.common.metrics, None);
        assert_eq!(config.common.logging, None);
        assert_eq!(config.service.upstream.timeout_secs, 10);
    }

    #[test]
    fn missing_file() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/sportswire.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }
}
