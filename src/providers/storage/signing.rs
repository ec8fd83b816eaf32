//! SigV4 request signing for the storage API

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use std::time::SystemTime;

use super::StorageError;

const SERVICE_NAME: &str = "s3";
const CREDENTIAL_PROVIDER_NAME: &str = "usage-collector";

/// Credentials and scope used to sign one request
pub struct SigningScope<'a> {
    pub access_key_id: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
}

/// Sign a body-less request and return the headers to attach to it
pub fn sign_request(
    method: &str,
    url: &str,
    scope: &SigningScope<'_>,
    time: SystemTime,
) -> Result<Vec<(String, String)>, StorageError> {
    let credentials = Credentials::new(
        scope.access_key_id,
        scope.secret_key,
        None,
        None,
        CREDENTIAL_PROVIDER_NAME,
    );
    let identity = Identity::new(credentials, None);

    let mut settings = SigningSettings::default();
    settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;

    let signing_params = v4::SigningParams::builder()
        .identity(&identity)
        .region(scope.region)
        .name(SERVICE_NAME)
        .time(time)
        .settings(settings)
        .build()
        .map_err(|e| StorageError::Signing(e.to_string()))?
        .into();

    let signable_request = SignableRequest::new(
        method,
        url,
        std::iter::empty::<(&str, &str)>(),
        SignableBody::Bytes(&[]),
    )
    .map_err(|e| StorageError::Signing(e.to_string()))?;

    let (instructions, _signature) = sign(signable_request, &signing_params)
        .map_err(|e| StorageError::Signing(e.to_string()))?
        .into_parts();

    Ok(instructions
        .headers()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}
