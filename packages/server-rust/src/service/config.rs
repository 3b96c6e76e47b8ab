//! Settings shared by every service module at registration time.

/// Emulator-wide settings shared by every service module.
///
/// Region and account id only shape generated identifiers such as ARNs and
/// endpoints; no request is ever scoped by them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Region reported in ARNs and endpoints.
    pub region: String,
    /// Twelve-digit account id reported in ARNs.
    pub account_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
        }
    }
}

impl ServerConfig {
    /// Builds an ARN of the form `arn:aws:{service}:{region}:{account}:{resource}`.
    #[must_use]
    pub fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:aws:{service}:{}:{}:{resource}",
            self.region, self.account_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.account_id, "000000000000");
    }

    #[test]
    fn arn_uses_region_and_account() {
        let config = ServerConfig {
            region: "eu-west-2".to_string(),
            account_id: "123456789012".to_string(),
        };
        assert_eq!(
            config.arn("dynamodb", "table/Music"),
            "arn:aws:dynamodb:eu-west-2:123456789012:table/Music"
        );
    }
}
