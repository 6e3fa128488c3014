//! Retry classification for transient terraform failures.
//!
//! A failed terraform command is retried only when its output contains one
//! of the known transient error markers. Matching is a case-sensitive
//! substring search; everything else fails immediately.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TerraformError, TerraformResult};

/// Error markers for AWS, networking and KMS failures worth retrying.
const AWS_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    ("RequestError: send request failed", "Intermittent AWS API error"),
    ("NoCredentialProviders: no valid providers in chain", "AWS credentials issue"),
    ("dial tcp: lookup", "DNS resolution issue"),
    ("timeout while waiting for plugin to start", "Plugin timeout"),
    ("connection reset by peer", "Network connectivity issue"),
    ("TooManyRequestsException", "AWS throttling"),
    ("ThrottlingException", "AWS throttling"),
    ("RequestLimitExceeded", "AWS throttling"),
    ("ServiceUnavailableException", "AWS service temporarily unavailable"),
    ("InternalServerError", "AWS internal error"),
    ("InvalidParameterException", "AWS parameter validation error"),
    ("ValidationException", "AWS validation error"),
    ("UnauthorizedOperation", "AWS authorization error"),
    ("InvalidUserID.NotFound", "AWS user/role not found"),
    ("AccessDenied", "AWS access denied"),
    ("Throttling", "AWS throttling"),
    ("RequestTimeout", "AWS request timeout"),
    ("PendingVerification", "AWS account verification pending"),
    ("OptInRequired", "AWS service opt-in required"),
    ("InsufficientInstanceCapacity", "AWS capacity issue"),
    ("InvalidAvailabilityZone", "AWS AZ issue"),
    ("InvalidSubnetID.NotFound", "AWS subnet not found"),
    ("InvalidVpcID.NotFound", "AWS VPC not found"),
    ("InvalidGroupId.NotFound", "AWS security group not found"),
    ("DryRunOperation", "AWS dry run operation"),
    ("RequestExpired", "AWS request expired"),
    ("SignatureDoesNotMatch", "AWS signature mismatch"),
    ("NetworkInterfaceInUse", "AWS network interface in use"),
    ("InvalidNetworkInterfaceID.NotFound", "AWS network interface not found"),
    ("InvalidInstanceID.NotFound", "AWS instance not found"),
    ("IncorrectInstanceState", "AWS instance state issue"),
    ("InvalidSnapshot.NotFound", "AWS snapshot not found"),
    ("InvalidVolume.NotFound", "AWS volume not found"),
    ("VolumeInUse", "AWS volume in use"),
    ("IncorrectState", "AWS resource state issue"),
    ("InvalidKeyPair.NotFound", "AWS key pair not found"),
    ("InvalidAMIID.NotFound", "AWS AMI not found"),
    ("InvalidAMIID.Malformed", "AWS AMI ID malformed"),
    ("InvalidLaunchTemplateName.NotFound", "AWS launch template not found"),
    ("InvalidAutoScalingGroupName", "AWS ASG name invalid"),
    ("ValidationError", "AWS validation error"),
    ("AlreadyExistsException", "AWS resource already exists"),
    ("ResourceNotFoundException", "AWS resource not found"),
    ("ResourceInUseException", "AWS resource in use"),
    ("InvalidRequestException", "AWS invalid request"),
    ("MalformedPolicyDocumentException", "AWS policy document malformed"),
    ("EntityAlreadyExistsException", "AWS IAM entity already exists"),
    ("NoSuchEntityException", "AWS IAM entity not found"),
    ("DeleteConflictException", "AWS delete conflict"),
    ("LimitExceededException", "AWS limit exceeded"),
    ("PolicyVersionLimitExceededException", "AWS policy version limit exceeded"),
    ("UnmodifiableEntityException", "AWS entity unmodifiable"),
    ("ServiceFailureException", "AWS service failure"),
    ("ConcurrentModificationException", "AWS concurrent modification"),
    ("InvalidInputException", "AWS invalid input"),
    ("KeyUsageNotPermittedException", "AWS KMS key usage not permitted"),
    ("KMSInvalidStateException", "AWS KMS invalid state"),
    ("NotFoundException", "AWS KMS key not found"),
    ("UnsupportedOperationException", "AWS KMS unsupported operation"),
    ("DisabledException", "AWS KMS key disabled"),
    ("InvalidAliasNameException", "AWS KMS alias name invalid"),
];

/// A matched table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryMatch {
    pub pattern: String,
    pub reason: String,
}

/// Immutable mapping from error-message substring to a readable reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetryableErrors {
    entries: BTreeMap<String, String>,
}

impl RetryableErrors {
    /// An empty table; nothing is retried.
    pub fn none() -> Self {
        Self::default()
    }

    /// The fixed table used by every KMS module scenario.
    pub fn aws_defaults() -> Self {
        AWS_RETRYABLE_ERRORS
            .iter()
            .map(|(pattern, reason)| (pattern.to_string(), reason.to_string()))
            .collect()
    }

    /// Copy of this table with one more entry.
    pub fn with(mut self, pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        self.entries.insert(pattern.into(), reason.into());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reason(&self, pattern: &str) -> Option<&str> {
        self.entries.get(pattern).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Find the first entry (in key order) whose pattern occurs in `output`.
    pub fn classify(&self, output: &str) -> Option<RetryMatch> {
        self.entries
            .iter()
            .find(|(pattern, _)| output.contains(pattern.as_str()))
            .map(|(pattern, reason)| RetryMatch {
                pattern: pattern.clone(),
                reason: reason.clone(),
            })
    }
}

impl FromIterator<(String, String)> for RetryableErrors {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Run `action`, retrying failures the table classifies as transient.
///
/// At most `max_retries + 1` attempts are made. Unclassified errors are
/// returned as they are; a classified error that survives every attempt
/// becomes [`TerraformError::RetriesExhausted`] carrying the matched reason.
pub async fn do_with_retryable_errors<T, F, Fut>(
    description: &str,
    retryable: &RetryableErrors,
    max_retries: u32,
    time_between_retries: Duration,
    mut action: F,
) -> TerraformResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TerraformResult<T>>,
{
    let mut attempt: u32 = 1;
    loop {
        let err = match action().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let text = err.retry_text();
        let Some(matched) = retryable.classify(&text) else {
            debug!("{} failed with an unclassified error", description);
            return Err(err);
        };

        if attempt > max_retries {
            return Err(TerraformError::RetriesExhausted {
                command: description.to_string(),
                attempts: attempt,
                reason: matched.reason,
                output: text,
            });
        }

        warn!(
            "{} failed ({}: matched '{}'), retry {}/{} in {:?}",
            description, matched.reason, matched.pattern, attempt, max_retries, time_between_retries
        );
        if !time_between_retries.is_zero() {
            tokio::time::sleep(time_between_retries).await;
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failed(output: &str) -> TerraformError {
        TerraformError::CommandFailed {
            command: "plan".to_string(),
            exit_code: 1,
            output: output.to_string(),
        }
    }

    #[test]
    fn test_default_table_has_unique_keys() {
        let table = RetryableErrors::aws_defaults();
        assert_eq!(table.len(), AWS_RETRYABLE_ERRORS.len());
        assert_eq!(table.reason("ThrottlingException"), Some("AWS throttling"));
        assert_eq!(
            table.reason("InvalidAliasNameException"),
            Some("AWS KMS alias name invalid")
        );
    }

    #[test]
    fn test_classify_is_case_sensitive_substring() {
        let table = RetryableErrors::aws_defaults();

        let hit = table
            .classify("Error: creating KMS Key: KMSInvalidStateException: key is pending deletion")
            .unwrap();
        assert_eq!(hit.reason, "AWS KMS invalid state");

        assert!(table.classify("error: accessdenied").is_none());
        assert!(table.classify("Error: Unsupported argument").is_none());
    }

    #[test]
    fn test_classify_first_match_in_key_order() {
        let table = RetryableErrors::none()
            .with("Throttling", "generic")
            .with("ThrottlingException", "specific");

        let hit = table.classify("ThrottlingException: Rate exceeded").unwrap();
        assert_eq!(hit.pattern, "Throttling");
        assert_eq!(hit.reason, "generic");
    }

    #[tokio::test]
    async fn test_unclassified_error_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: TerraformResult<()> = do_with_retryable_errors(
            "terraform plan",
            &RetryableErrors::aws_defaults(),
            3,
            Duration::ZERO,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(failed("Error: Reference to undeclared input variable"))
            },
        )
        .await;

        assert!(matches!(result, Err(TerraformError::CommandFailed { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_classified_error_recovers() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = do_with_retryable_errors(
            "terraform init",
            &RetryableErrors::aws_defaults(),
            3,
            Duration::ZERO,
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(failed("read: connection reset by peer"))
                } else {
                    Ok("initialized")
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "initialized");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_classified_error_exhausts_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: TerraformResult<()> = do_with_retryable_errors(
            "terraform destroy",
            &RetryableErrors::aws_defaults(),
            3,
            Duration::ZERO,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(failed("TooManyRequestsException: slow down"))
            },
        )
        .await;

        match result {
            Err(TerraformError::RetriesExhausted {
                attempts, reason, ..
            }) => {
                assert_eq!(attempts, 4);
                assert_eq!(reason, "AWS throttling");
            }
            other => panic!("expected exhausted retries, got {:?}", other),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
