//! Test suite construction

use stressrig_config::StressConfig;
use stressrig_core::ResourceMap;
use tracing::debug;

use crate::action::Action;
use crate::error::BuildError;

/// A named, ordered list of actions. Built once before the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSuite {
    pub name: String,
    pub actions: Vec<Action>,
}

impl TestSuite {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Resource map from the `Images` section
pub fn resource_map(config: &StressConfig) -> ResourceMap {
    config
        .images
        .iter()
        .map(|(name, id)| (name.as_str(), id.as_str()))
        .collect()
}

/// Build the suites to run, in name order.
///
/// An empty `only` selects every suite. Any malformed action, or a name in
/// `only` without a matching suite, fails the whole build.
pub fn build_suites(config: &StressConfig, only: &[String]) -> Result<Vec<TestSuite>, BuildError> {
    if let Some(unknown) = only.iter().find(|name| !config.tests.contains_key(*name)) {
        return Err(BuildError::UnknownSuite(unknown.clone()));
    }

    let resources = resource_map(config);
    let mut suites = Vec::new();

    for (name, steps) in &config.tests {
        if !only.is_empty() && !only.contains(name) {
            continue;
        }

        let actions = steps
            .iter()
            .enumerate()
            .map(|(index, options)| {
                Action::from_options(options, &resources).map_err(|e| e.in_suite(name, index))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Built test {:?} with {} actions", name, actions.len());
        suites.push(TestSuite {
            name: name.clone(),
            actions,
        });
    }

    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(tests: serde_json::Value) -> StressConfig {
        serde_json::from_value(json!({
            "Images": {"receiver": "test-shutdown-receiver", "sender": "test-shutdown-sender"},
            "Tests": tests,
        }))
        .unwrap()
    }

    #[test]
    fn test_suites_in_name_order() {
        let config = config(json!({
            "zeta": [{"Action": "pause", "For": "1s"}],
            "alpha": [
                {"Action": "scale", "Pod": "receiver", "Units": 2},
                {"Action": "scale", "Pod": "sender", "Units": "0"}
            ]
        }));

        let suites = build_suites(&config, &[]).unwrap();
        let names: Vec<&str> = suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(suites[0].len(), 2);
        assert_eq!(suites[0].actions[1].to_string(), "scale test-shutdown-sender to 0 units");
    }

    #[test]
    fn test_filter_by_name() {
        let config = config(json!({
            "a": [{"Action": "pause", "For": "1s"}],
            "b": [{"Action": "pause", "For": "2s"}]
        }));

        let suites = build_suites(&config, &["b".to_string()]).unwrap();
        assert_eq!(suites.len(), 1);
        assert_eq!(suites[0].name, "b");

        assert_eq!(
            build_suites(&config, &["c".to_string()]).unwrap_err(),
            BuildError::UnknownSuite("c".to_string())
        );
    }

    #[test]
    fn test_one_bad_action_fails_everything() {
        let config = config(json!({
            "good": [{"Action": "pause", "For": "1s"}],
            "bad": [
                {"Action": "pause", "For": "1s"},
                {"Action": "scale", "Pod": "missing", "Units": 1}
            ]
        }));

        let err = build_suites(&config, &[]).unwrap_err();
        match &err {
            BuildError::InSuite { suite, index, .. } => {
                assert_eq!(suite, "bad");
                assert_eq!(*index, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(matches!(err.root(), BuildError::UnresolvedResource { .. }));
    }
}
