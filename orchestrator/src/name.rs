use crate::error::{self, Result};
use snafu::ensure;

/// Picks the cluster name from the `--name` flag and the positional argument. Empty values count
/// as absent. Both present with different values is a conflict; the same value twice is fine.
pub fn resolve_name(flag: Option<&str>, argument: Option<&str>) -> Result<Option<String>> {
    let flag = flag.filter(|value| !value.is_empty());
    let argument = argument.filter(|value| !value.is_empty());
    match (flag, argument) {
        (Some(flag), Some(argument)) => {
            ensure!(
                flag == argument,
                error::ConfigConflictSnafu {
                    first: format!("--name={}", flag),
                    second: format!("argument {}", argument),
                }
            );
            Ok(Some(flag.to_string()))
        }
        (Some(name), None) | (None, Some(name)) => Ok(Some(name.to_string())),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use super::resolve_name;
    use crate::Error;

    #[test]
    fn flag_only() {
        assert_eq!(
            resolve_name(Some("dev"), None).unwrap(),
            Some("dev".to_string())
        );
    }

    #[test]
    fn argument_only() {
        assert_eq!(
            resolve_name(None, Some("dev")).unwrap(),
            Some("dev".to_string())
        );
        assert_eq!(
            resolve_name(Some(""), Some("dev")).unwrap(),
            Some("dev".to_string())
        );
    }

    #[test]
    fn same_value_twice() {
        assert_eq!(
            resolve_name(Some("dev"), Some("dev")).unwrap(),
            Some("dev".to_string())
        );
    }

    #[test]
    fn different_values() {
        let error = resolve_name(Some("dev"), Some("prod")).unwrap_err();
        assert!(matches!(error, Error::ConfigConflict { .. }));
        assert_eq!(
            error.to_string(),
            "--name=dev and argument prod cannot be used at the same time"
        );
    }

    #[test]
    fn neither() {
        assert_eq!(resolve_name(None, Some("")).unwrap(), None);
    }
}
