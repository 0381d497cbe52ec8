//! Shared test utilities for `colmena-core`.

use colmena_test_support::ci::property_test_profile::ProptestRunProfile;
use proptest::test_runner::Config as ProptestConfig;

/// Builds a proptest configuration honouring the workspace run profile.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}
