use super::{Capabilities, Provider, ProviderInfo};
use crate::error::Result;

/// Internal registration structure used by the macro.
#[doc(hidden)]
pub struct ProviderRegistration {
    pub info: ProviderInfo,
    pub capabilities: Capabilities,
    pub schemes: &'static [&'static str],
    pub factory: fn(&url::Url) -> Result<Box<dyn Provider>>,
}

/// Every backend linked into the binary.
#[doc(hidden)]
#[linkme::distributed_slice]
pub static PROVIDER_REGISTRY: [ProviderRegistration];

/// Registers a backend with the global registry.
///
/// Besides the registration this defines `PROVIDER_NAME` and `CAPABILITIES`
/// constants on the struct, which its [`Provider`] impl returns.
///
/// ```ignore
/// register_provider! {
///     struct: SsmProvider,
///     config: SsmConfig,
///     name: "ssm",
///     description: "AWS Systems Manager Parameter Store",
///     capabilities: { secure_write: true, encryption_verification: true, transactions: false },
///     schemes: ["ssm"],
///     examples: ["ssm://us-east-1"],
/// }
/// ```
#[doc(hidden)]
#[macro_export]
macro_rules! register_provider {
    (
        struct: $struct_name:ident,
        config: $config_type:ty,
        name: $name:expr,
        description: $description:expr,
        capabilities: {
            secure_write: $secure_write:expr,
            encryption_verification: $encryption_verification:expr,
            transactions: $transactions:expr $(,)?
        },
        schemes: [$($scheme:expr),* $(,)?],
        examples: [$($example:expr),* $(,)?] $(,)?
    ) => {
        impl $struct_name {
            const PROVIDER_NAME: &'static str = $name;
            const CAPABILITIES: $crate::provider::Capabilities = $crate::provider::Capabilities {
                secure_write: $secure_write,
                encryption_verification: $encryption_verification,
                transactions: $transactions,
            };
        }

        const _: () = {
            #[linkme::distributed_slice($crate::provider::PROVIDER_REGISTRY)]
            #[doc(hidden)]
            static PROVIDER_REGISTRATION: $crate::provider::ProviderRegistration = $crate::provider::ProviderRegistration {
                info: $crate::provider::ProviderInfo {
                    name: $name,
                    description: $description,
                    examples: &[$($example,)*],
                },
                capabilities: <$struct_name>::CAPABILITIES,
                schemes: &[$($scheme,)*],
                factory: |url| {
                    let config = <$config_type>::try_from(url)?;
                    Ok(Box::new(<$struct_name>::new(config)))
                },
            };
        };
    };
}
