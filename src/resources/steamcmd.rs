//! # SteamCMD Install Step
//!
//! Arguments and environment for the init container that downloads game files.
//!
//! Credentials are never placed in arguments. They are injected as
//! environment variables and referenced with kubelet `$(VAR)` expansion.

use crate::crd::{EnvVar, SecretKeySelector};

pub const STEAM_USERNAME_ENV: &str = "STEAM_USERNAME";
pub const STEAM_PASSWORD_ENV: &str = "STEAM_PASSWORD";
pub const STEAM_BETA_PASSWORD_ENV: &str = "STEAM_BETA_PASSWORD";
pub const APP_ID_ENV: &str = "APP_ID";

/// Inputs for the SteamCMD invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
    pub app_id: i32,
    pub install_dir: String,
    pub anonymous: bool,
    pub beta: Option<String>,
    pub beta_password: Option<String>,
    pub validate: bool,
    /// Secret with `username` and `password` keys, used when not anonymous
    pub credentials_secret: Option<String>,
}

impl InstallCommand {
    /// SteamCMD arguments
    ///
    /// The order is significant to SteamCMD and must not change.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["+force_install_dir".to_string(), self.install_dir.clone()];

        if self.anonymous {
            args.extend(["+login".to_string(), "anonymous".to_string()]);
        } else {
            args.extend([
                "+login".to_string(),
                format!("$({STEAM_USERNAME_ENV})"),
                format!("$({STEAM_PASSWORD_ENV})"),
            ]);
        }

        args.extend(["+app_update".to_string(), self.app_id.to_string()]);
        if let Some(beta) = self.beta() {
            args.extend(["-beta".to_string(), beta.to_string()]);
            if self.beta_password().is_some() {
                args.extend([
                    "-betapassword".to_string(),
                    format!("$({STEAM_BETA_PASSWORD_ENV})"),
                ]);
            }
        }

        if self.validate {
            args.push("validate".to_string());
        }

        args.push("+quit".to_string());
        args
    }

    /// Environment for the init container
    #[must_use]
    pub fn env(&self) -> Vec<EnvVar> {
        let mut env = vec![EnvVar::literal(APP_ID_ENV, self.app_id.to_string())];

        if let Some(secret) = self.credentials_secret.as_deref().filter(|_| !self.anonymous) {
            let selector = |key: &str| SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional: None,
            };
            env.push(EnvVar::from_secret(STEAM_USERNAME_ENV, selector("username")));
            env.push(EnvVar::from_secret(STEAM_PASSWORD_ENV, selector("password")));
        }

        if let (Some(_), Some(password)) = (self.beta(), self.beta_password()) {
            env.push(EnvVar::literal(STEAM_BETA_PASSWORD_ENV, password));
        }

        env
    }

    fn beta(&self) -> Option<&str> {
        self.beta.as_deref().filter(|b| !b.is_empty())
    }

    fn beta_password(&self) -> Option<&str> {
        self.beta_password.as_deref().filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> InstallCommand {
        InstallCommand {
            app_id: 896_660,
            install_dir: "/data/server".into(),
            anonymous: true,
            beta: None,
            beta_password: None,
            validate: true,
            credentials_secret: None,
        }
    }

    #[test]
    fn test_anonymous_with_validate() {
        assert_eq!(
            command().args(),
            vec![
                "+force_install_dir",
                "/data/server",
                "+login",
                "anonymous",
                "+app_update",
                "896660",
                "validate",
                "+quit"
            ]
        );
    }

    #[test]
    fn test_credentials_and_beta() {
        let cmd = InstallCommand {
            anonymous: false,
            beta: Some("public-test".into()),
            beta_password: Some("hunter2".into()),
            validate: false,
            credentials_secret: Some("steam-creds".into()),
            ..command()
        };
        assert_eq!(
            cmd.args(),
            vec![
                "+force_install_dir",
                "/data/server",
                "+login",
                "$(STEAM_USERNAME)",
                "$(STEAM_PASSWORD)",
                "+app_update",
                "896660",
                "-beta",
                "public-test",
                "-betapassword",
                "$(STEAM_BETA_PASSWORD)",
                "+quit"
            ]
        );

        let env = cmd.env();
        let names: Vec<_> = env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["APP_ID", "STEAM_USERNAME", "STEAM_PASSWORD", "STEAM_BETA_PASSWORD"]
        );
        assert_eq!(env[3].value.as_deref(), Some("hunter2"));
        let user_ref = env[1]
            .value_from
            .as_ref()
            .and_then(|v| v.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(user_ref.name, "steam-creds");
        assert_eq!(user_ref.key, "username");
    }

    #[test]
    fn test_beta_password_without_beta_is_ignored() {
        let cmd = InstallCommand {
            beta_password: Some("orphan".into()),
            ..command()
        };
        assert!(!cmd.args().iter().any(|a| a == "-betapassword"));
        assert_eq!(cmd.env().len(), 1);
    }

    #[test]
    fn test_anonymous_ignores_credentials_secret() {
        let cmd = InstallCommand {
            credentials_secret: Some("steam-creds".into()),
            ..command()
        };
        assert_eq!(cmd.env().len(), 1);
    }
}
