//! Kafka client settings shared by the consumer and the producer.

use rdkafka::config::ClientConfig;

/// Enable SASL/SSL on `config` when credentials are provided.
///
/// Without credentials the client connects in plaintext (local development).
pub fn apply_credentials(config: &mut ClientConfig, credentials: Option<(&str, &str)>) {
    if let Some((username, password)) = credentials {
        config
            .set("security.protocol", "SASL_SSL")
            .set("sasl.mechanisms", "PLAIN")
            .set("sasl.username", username)
            .set("sasl.password", password);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_enable_sasl_ssl() {
        let mut config = ClientConfig::new();
        apply_credentials(&mut config, Some(("indexer", "secret")));

        assert_eq!(config.get("security.protocol"), Some("SASL_SSL"));
        assert_eq!(config.get("sasl.mechanisms"), Some("PLAIN"));
        assert_eq!(config.get("sasl.username"), Some("indexer"));
    }

    #[test]
    fn test_no_credentials_stays_plaintext() {
        let mut config = ClientConfig::new();
        apply_credentials(&mut config, None);

        assert_eq!(config.get("security.protocol"), None);
    }
}
