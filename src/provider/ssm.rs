use super::{Capabilities, EncryptionType, Guards, Provider, ProviderContext, ProviderKv};
use crate::error::{ErrorCode, Result, ZenfigError};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_ssm::config::Region;
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ssm::types::ParameterType;
use serde::{Deserialize, Serialize};
use std::env;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

/// Environment variables consulted for the account guard before asking STS.
const ACCOUNT_ENV_VARS: &[&str] = &["ZENFIG_AWS_ACCOUNT_ID", "AWS_ACCOUNT_ID"];
const REGION_ENV_VARS: &[&str] = &["AWS_REGION", "AWS_DEFAULT_REGION"];

/// Error codes the SDK reports for missing, invalid or expired credentials.
const CREDENTIAL_ERROR_CODES: &[&str] = &[
    "UnrecognizedClientException",
    "InvalidClientTokenId",
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidSignatureException",
    "SignatureDoesNotMatch",
    "MissingAuthenticationToken",
    "IncompleteSignature",
];

/// Configuration for the Parameter Store provider.
///
/// ```text
/// ssm://                                  region from the environment
/// ssm://us-east-1                         explicit region
/// ssm://eu-west-1?profile=prod            named credentials profile
/// ssm://us-east-1?endpoint=http://localhost:4566
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SsmConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint: Option<String>,
}

impl TryFrom<&Url> for SsmConfig {
    type Error = ZenfigError;

    fn try_from(url: &Url) -> std::result::Result<Self, Self::Error> {
        if url.scheme() != "ssm" {
            return Err(ZenfigError::new(
                ErrorCode::ProviderNotFound,
                format!("Invalid scheme '{}' for ssm provider", url.scheme()),
            ));
        }

        let mut config = SsmConfig {
            region: url.host_str().filter(|h| !h.is_empty()).map(str::to_string),
            ..Default::default()
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "profile" => config.profile = Some(value.into_owned()),
                "endpoint" => config.endpoint = Some(value.into_owned()),
                "region" => config.region = Some(value.into_owned()),
                other => {
                    return Err(ZenfigError::new(
                        ErrorCode::InvalidArgument,
                        format!("Unknown ssm provider option '{}'", other),
                    )
                    .with_available_keys(vec![
                        "profile".to_string(),
                        "endpoint".to_string(),
                        "region".to_string(),
                    ]));
                }
            }
        }
        Ok(config)
    }
}

/// AWS Systems Manager Parameter Store.
///
/// Values are written as `SecureString` with overwrite enabled and read back
/// with decryption. The SDK configuration is loaded lazily on first use so
/// constructing the provider never touches the network.
pub struct SsmProvider {
    config: SsmConfig,
    sdk: OnceCell<SdkConfig>,
}

crate::register_provider! {
    struct: SsmProvider,
    config: SsmConfig,
    name: "ssm",
    description: "AWS Systems Manager Parameter Store",
    capabilities: { secure_write: true, encryption_verification: true, transactions: false },
    schemes: ["ssm"],
    examples: ["ssm://us-east-1", "ssm://eu-west-1?profile=prod"],
}

/// Direction of a store call; access-denied means different things for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Read,
    Write,
}

impl SsmProvider {
    pub fn new(config: SsmConfig) -> Self {
        Self {
            config,
            sdk: OnceCell::new(),
        }
    }

    async fn sdk_config(&self) -> &SdkConfig {
        self.sdk
            .get_or_init(|| async {
                let mut loader = aws_config::defaults(BehaviorVersion::latest());
                if let Some(region) = &self.config.region {
                    loader = loader.region(Region::new(region.clone()));
                }
                if let Some(profile) = &self.config.profile {
                    loader = loader.profile_name(profile);
                }
                if let Some(endpoint) = &self.config.endpoint {
                    loader = loader.endpoint_url(endpoint);
                }
                loader.load().await
            })
            .await
    }

    async fn client(&self) -> aws_sdk_ssm::Client {
        aws_sdk_ssm::Client::new(self.sdk_config().await)
    }

    /// Account the credentials belong to: environment first, STS second.
    async fn resolve_account(&self) -> Result<String> {
        if let Some(account) = account_from_env(env_var) {
            debug!(source = "env", "resolved AWS account");
            return Ok(account);
        }
        let sts = aws_sdk_sts::Client::new(self.sdk_config().await);
        let identity = sts.get_caller_identity().send().await.map_err(|err| {
            let message = DisplayErrorContext(&err).to_string();
            ZenfigError::new(
                ErrorCode::ProviderAuth,
                format!("Cannot determine AWS account: {}", message),
            )
            .with_remediation("Configure AWS credentials or set ZENFIG_AWS_ACCOUNT_ID")
        })?;
        debug!(source = "sts", "resolved AWS account");
        identity.account().map(str::to_string).ok_or_else(|| {
            ZenfigError::new(
                ErrorCode::ProviderAuth,
                "Identity service returned no account id",
            )
        })
    }

    /// Region calls go to: the URI first, then the environment, then the SDK
    /// configuration chain.
    async fn resolve_region(&self) -> Option<String> {
        if let Some(region) = region_override(self.config.region.as_deref(), env_var) {
            return Some(region);
        }
        self.sdk_config()
            .await
            .region()
            .map(|r| r.as_ref().to_string())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn first_env(names: &[&str], lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    names
        .iter()
        .filter_map(|name| lookup(*name))
        .find(|value| !value.is_empty())
}

/// Account set in the environment; STS is only asked when this is `None`.
fn account_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    first_env(ACCOUNT_ENV_VARS, lookup)
}

/// Region from the URI, else from the environment; `None` defers to the SDK
/// configuration chain.
fn region_override(
    uri_region: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    uri_region
        .map(str::to_string)
        .or_else(|| first_env(REGION_ENV_VARS, lookup))
}

/// Map a store failure onto the `PROV` codes.
pub(crate) fn classify_error(code: Option<&str>, message: &str, operation: Operation) -> ErrorCode {
    match code {
        Some(code) if CREDENTIAL_ERROR_CODES.contains(&code) => ErrorCode::ProviderAuth,
        Some("AccessDeniedException" | "AccessDenied") => match operation {
            Operation::Write => ErrorCode::WriteDenied,
            Operation::Read => ErrorCode::ProviderAuth,
        },
        Some("ParameterNotFound") => ErrorCode::ParameterNotFound,
        Some(_) => ErrorCode::ProviderUnavailable,
        None => {
            let lower = message.to_lowercase();
            if lower.contains("no credentials") || lower.contains("credentials provider") {
                ErrorCode::ProviderAuth
            } else {
                ErrorCode::ProviderUnavailable
            }
        }
    }
}

fn store_error<E>(err: E, operation: Operation, what: String) -> ZenfigError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    let code = classify_error(err.code(), &message, operation);
    let remediation = match code {
        ErrorCode::ProviderAuth => Some("Check your AWS credentials (aws sts get-caller-identity)"),
        ErrorCode::WriteDenied => Some("The current identity needs ssm:PutParameter and ssm:DeleteParameter"),
        ErrorCode::ProviderUnavailable => Some("Retry later or check network access to SSM"),
        _ => None,
    };
    let mut error = ZenfigError::new(code, format!("{}: {}", what, message));
    if let Some(remediation) = remediation {
        error = error.with_remediation(remediation);
    }
    error.with_source(err)
}

/// Compare resolved identity against configured guards.
pub(crate) fn compare_guards(
    guards: &Guards,
    account: Option<&str>,
    region: Option<&str>,
) -> Result<()> {
    if let Some(expected) = &guards.account {
        if account != Some(expected.as_str()) {
            return Err(guard_mismatch("account", expected, account));
        }
    }
    if let Some(expected) = &guards.region {
        if region != Some(expected.as_str()) {
            return Err(guard_mismatch("region", expected, region));
        }
    }
    Ok(())
}

fn guard_mismatch(what: &str, expected: &str, actual: Option<&str>) -> ZenfigError {
    ZenfigError::new(
        ErrorCode::GuardMismatch,
        format!("AWS {} does not match the configured guard", what),
    )
    .with_expected(expected)
    .with_received(actual.unwrap_or("<unknown>"))
    .with_problem(format!(
        "Refusing to touch a store in an unexpected {}",
        what
    ))
    .with_remediation("Switch credentials/region or update [provider.guards] in zenfig.toml")
}

#[async_trait]
impl Provider for SsmProvider {
    fn name(&self) -> &'static str {
        Self::PROVIDER_NAME
    }

    fn capabilities(&self) -> Capabilities {
        Self::CAPABILITIES
    }

    async fn fetch(&self, ctx: &ProviderContext) -> Result<ProviderKv> {
        let client = self.client().await;
        let base = ctx.base_path();
        let mut kv = ProviderKv::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = client
                .get_parameters_by_path()
                .path(base.trim_end_matches('/'))
                .recursive(true)
                .with_decryption(true)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| {
                    store_error(err, Operation::Read, format!("Failed to fetch {}", base))
                })?;
            pages += 1;

            for parameter in page.parameters() {
                let (Some(name), Some(value)) = (parameter.name(), parameter.value()) else {
                    continue;
                };
                match ctx.key_for(name) {
                    Some(key) => {
                        kv.insert(key, value.to_string());
                    }
                    None => debug!(name, "ignoring parameter outside base path"),
                }
            }

            match page.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(path = %base, pages, keys = kv.len(), "fetched parameters");
        Ok(kv)
    }

    async fn upsert(&self, ctx: &ProviderContext, key: &str, value: &str) -> Result<()> {
        let name = ctx.parameter_name(key);
        self.client()
            .await
            .put_parameter()
            .name(&name)
            .value(value)
            .r#type(ParameterType::SecureString)
            .overwrite(true)
            .send()
            .await
            .map_err(|err| store_error(err, Operation::Write, format!("Failed to write {}", name)))?;
        debug!(name = %name, "wrote parameter");
        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext, key: &str) -> Result<()> {
        let name = ctx.parameter_name(key);
        self.client()
            .await
            .delete_parameter()
            .name(&name)
            .send()
            .await
            .map_err(|err| store_error(err, Operation::Write, format!("Failed to delete {}", name)))?;
        debug!(name = %name, "deleted parameter");
        Ok(())
    }

    async fn verify_encryption(&self, ctx: &ProviderContext, key: &str) -> Result<EncryptionType> {
        let name = ctx.parameter_name(key);
        let output = self
            .client()
            .await
            .get_parameter()
            .name(&name)
            .with_decryption(false)
            .send()
            .await
            .map_err(|err| store_error(err, Operation::Read, format!("Failed to read {}", name)))?;
        Ok(match output.parameter().and_then(|p| p.r#type()) {
            Some(ParameterType::SecureString) => EncryptionType::SecureString,
            Some(ParameterType::String) | Some(ParameterType::StringList) => EncryptionType::String,
            _ => EncryptionType::Unknown,
        })
    }

    async fn check_guards(&self, guards: Option<&Guards>) -> Result<()> {
        let Some(guards) = guards.filter(|g| !g.is_empty()) else {
            return Ok(());
        };
        let account = match guards.account {
            Some(_) => Some(self.resolve_account().await?),
            None => None,
        };
        let region = match guards.region {
            Some(_) => self.resolve_region().await,
            None => None,
        };
        compare_guards(guards, account.as_deref(), region.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_uri() {
        let url = Url::parse("ssm://us-east-1?profile=prod").unwrap();
        let config = SsmConfig::try_from(&url).unwrap();
        assert_eq!(config.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.profile.as_deref(), Some("prod"));
        assert_eq!(config.endpoint, None);

        let url = Url::parse("ssm://?endpoint=http://localhost:4566").unwrap();
        let config = SsmConfig::try_from(&url).unwrap();
        assert_eq!(config.region, None);
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:4566"));

        let url = Url::parse("ssm://us-east-1?colour=blue").unwrap();
        assert_eq!(
            SsmConfig::try_from(&url).unwrap_err().code(),
            ErrorCode::InvalidArgument
        );
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_account_env_precedence() {
        assert_eq!(account_from_env(vars(&[])), None);
        assert_eq!(
            account_from_env(vars(&[("AWS_ACCOUNT_ID", "222222222222")])).as_deref(),
            Some("222222222222")
        );
        assert_eq!(
            account_from_env(vars(&[
                ("AWS_ACCOUNT_ID", "222222222222"),
                ("ZENFIG_AWS_ACCOUNT_ID", "111111111111"),
            ]))
            .as_deref(),
            Some("111111111111")
        );
        // Empty values fall through to the next variable, then to STS.
        assert_eq!(
            account_from_env(vars(&[
                ("ZENFIG_AWS_ACCOUNT_ID", ""),
                ("AWS_ACCOUNT_ID", "222222222222"),
            ]))
            .as_deref(),
            Some("222222222222")
        );
        assert_eq!(account_from_env(vars(&[("ZENFIG_AWS_ACCOUNT_ID", "")])), None);
    }

    #[test]
    fn test_region_precedence() {
        let env = vars(&[("AWS_REGION", "eu-west-1"), ("AWS_DEFAULT_REGION", "us-west-2")]);
        assert_eq!(region_override(Some("us-east-1"), &env).as_deref(), Some("us-east-1"));
        assert_eq!(region_override(None, &env).as_deref(), Some("eu-west-1"));
        assert_eq!(
            region_override(None, vars(&[("AWS_DEFAULT_REGION", "us-west-2")])).as_deref(),
            Some("us-west-2")
        );
        assert_eq!(region_override(None, vars(&[])), None);
    }

    #[test]
    fn test_provider_from_string() {
        let provider = Box::<dyn Provider>::try_from("ssm://us-east-1").unwrap();
        assert_eq!(provider.name(), "ssm");
        assert!(provider.capabilities().secure_write);

        let provider = Box::<dyn Provider>::try_from("ssm").unwrap();
        assert_eq!(provider.name(), "ssm");
    }

    #[test]
    fn test_classify_error() {
        let read = Operation::Read;
        let write = Operation::Write;
        assert_eq!(
            classify_error(Some("ExpiredTokenException"), "", read),
            ErrorCode::ProviderAuth
        );
        assert_eq!(
            classify_error(Some("UnrecognizedClientException"), "", write),
            ErrorCode::ProviderAuth
        );
        assert_eq!(
            classify_error(Some("AccessDeniedException"), "", write),
            ErrorCode::WriteDenied
        );
        assert_eq!(
            classify_error(Some("AccessDeniedException"), "", read),
            ErrorCode::ProviderAuth
        );
        assert_eq!(
            classify_error(Some("ParameterNotFound"), "", read),
            ErrorCode::ParameterNotFound
        );
        assert_eq!(
            classify_error(Some("ThrottlingException"), "", read),
            ErrorCode::ProviderUnavailable
        );
        assert_eq!(
            classify_error(None, "dispatch failure: no credentials in the chain", read),
            ErrorCode::ProviderAuth
        );
        assert_eq!(
            classify_error(None, "timeout", read),
            ErrorCode::ProviderUnavailable
        );
    }

    #[test]
    fn test_compare_guards() {
        let guards = Guards {
            account: Some("123456789012".to_string()),
            region: Some("us-east-1".to_string()),
        };
        assert!(compare_guards(&guards, Some("123456789012"), Some("us-east-1")).is_ok());

        let err = compare_guards(&guards, Some("999999999999"), Some("us-east-1")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::GuardMismatch);
        assert_eq!(err.diagnostic().received.as_deref(), Some("999999999999"));

        let err = compare_guards(&guards, Some("123456789012"), None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::GuardMismatch);

        let region_only = Guards {
            account: None,
            region: Some("eu-west-1".to_string()),
        };
        assert!(compare_guards(&region_only, None, Some("eu-west-1")).is_ok());
    }

    #[tokio::test]
    async fn test_empty_guards_are_a_no_op() {
        let provider = SsmProvider::new(SsmConfig::default());
        assert!(provider.check_guards(None).await.is_ok());
        assert!(provider.check_guards(Some(&Guards::default())).await.is_ok());
    }
}
