//! Property-test run profile read from the environment.
//!
//! Every property suite in the workspace asks this module how many cases to
//! run, so CI can dial the whole workspace up or down with one variable.

use std::env;

/// Environment variable overriding the number of cases per property.
pub const CASES_ENV_KEY: &str = "COLMENA_PROPTEST_CASES";
/// Environment variable enabling forked proptest execution.
pub const FORK_ENV_KEY: &str = "COLMENA_PBT_FORK";

/// Case count and fork mode for one property suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProptestRunProfile {
    cases: u32,
    fork: bool,
}

impl ProptestRunProfile {
    /// Reads the profile from the process environment, falling back to the
    /// given defaults for missing or malformed values.
    ///
    /// # Examples
    ///
    /// ```
    /// use colmena_test_support::ci::property_test_profile::ProptestRunProfile;
    ///
    /// let profile = ProptestRunProfile::load(64, false);
    /// assert!(profile.cases() > 0);
    /// ```
    #[must_use]
    pub fn load(default_cases: u32, default_fork: bool) -> Self {
        Self::from_lookup(default_cases, default_fork, |key| env::var(key).ok())
    }

    /// Builds a profile from an arbitrary key lookup.
    ///
    /// # Examples
    ///
    /// ```
    /// use colmena_test_support::ci::property_test_profile::{
    ///     CASES_ENV_KEY, ProptestRunProfile,
    /// };
    ///
    /// let profile = ProptestRunProfile::from_lookup(64, false, |key| {
    ///     (key == CASES_ENV_KEY).then(|| "12".to_owned())
    /// });
    /// assert_eq!(profile.cases(), 12);
    /// assert!(!profile.fork());
    /// ```
    #[must_use]
    pub fn from_lookup(
        default_cases: u32,
        default_fork: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let cases = parse_or_default(CASES_ENV_KEY, lookup(CASES_ENV_KEY), default_cases, parse_cases);
        let fork = parse_or_default(FORK_ENV_KEY, lookup(FORK_ENV_KEY), default_fork, parse_switch);
        Self { cases, fork }
    }

    /// Number of cases to run per property.
    #[must_use]
    pub fn cases(&self) -> u32 {
        self.cases
    }

    /// Whether cases run in forked subprocesses.
    #[must_use]
    pub fn fork(&self) -> bool {
        self.fork
    }
}

fn parse_or_default<T: Copy>(
    key: &'static str,
    raw: Option<String>,
    default: T,
    parse: fn(&str) -> Result<T, String>,
) -> T {
    let Some(raw) = raw else {
        return default;
    };
    parse(&raw).unwrap_or_else(|reason| {
        tracing::warn!(
            env = key,
            raw = %raw,
            reason = %reason,
            "ignoring malformed property-test override",
        );
        default
    })
}

fn parse_cases(raw: &str) -> Result<u32, String> {
    match raw.trim().parse::<u32>() {
        Ok(0) => Err("case count must be positive".to_owned()),
        Ok(cases) => Ok(cases),
        Err(error) => Err(format!("not a case count: {error}")),
    }
}

fn parse_switch(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("`{other}` is not a boolean switch")),
    }
}
