//! CI token refresh step.
//!
//! Exit codes: 0 when the run holds usable credentials or OAuth mode is off,
//! 1 when the refresh or local persistence failed, 2 on invalid configuration.

use std::process::ExitCode;

use ci_token_refresh::{
    CiTokenRefresher, ExecutionContext, GitHubActionsContext, LifecycleOutcome, LoggingConfig,
    RefreshConfig, TokenRefreshError,
};

fn exit_code(error: &TokenRefreshError) -> ExitCode {
    match error {
        TokenRefreshError::Configuration(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let logging = match LoggingConfig::from_env() {
        Ok(logging) => logging,
        Err(e) => {
            GitHubActionsContext::from_env().error(&e.to_string());
            return ExitCode::from(2);
        }
    };
    if let Err(e) = logging.init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let refresher = match RefreshConfig::from_env()
        .map_err(TokenRefreshError::from)
        .and_then(CiTokenRefresher::new)
    {
        Ok(refresher) => refresher,
        Err(e) => {
            tracing::error!(error = %e, error_code = e.error_code(), "Invalid configuration");
            GitHubActionsContext::from_env().error(&e.to_string());
            return exit_code(&e);
        }
    };

    match refresher.run().await {
        Ok(LifecycleOutcome::Disabled) => {
            println!("OAuth mode disabled: no credentials");
            ExitCode::SUCCESS
        }
        Ok(LifecycleOutcome::Valid(credentials)) => {
            println!(
                "Access token valid until {}",
                credentials.expires_at().to_rfc3339()
            );
            ExitCode::SUCCESS
        }
        Ok(LifecycleOutcome::Refreshed(credentials)) => {
            println!(
                "Access token refreshed, valid until {}",
                credentials.expires_at().to_rfc3339()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            refresher.context().error(&e.to_string());
            exit_code(&e)
        }
    }
}
