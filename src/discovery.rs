//! Target discovery.
//!
//! Runs the configured lister (by default `go list -json <package>`),
//! reads the `ImportPath` and `Deps` of each listed package and keeps the
//! dependencies that live under that import path. Vendored packages are
//! dropped unless a custom filter pattern is configured.

use std::collections::HashSet;
use std::process::Stdio;

use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;

use crate::config::Config;
use crate::error::{LintmuxError, Result};

/// Substring marking vendored third-party packages.
pub const VENDOR_MARKER: &str = "/vendor/";

/// One package object from the lister's JSON output.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PackageListing {
    pub import_path: String,
    #[serde(default)]
    pub deps: Vec<String>,
}

/// Selects which dependencies become targets.
#[derive(Debug, Clone)]
pub enum TargetFilter {
    /// Everything except vendored packages
    NotVendor,
    /// Identifiers matching the pattern
    Pattern(Regex),
}

impl TargetFilter {
    /// Build from an optional pattern; an invalid pattern falls back to
    /// excluding vendored packages.
    pub fn from_pattern(pattern: Option<&str>) -> Self {
        match pattern.filter(|p| !p.is_empty()) {
            None => TargetFilter::NotVendor,
            Some(p) => match Regex::new(p) {
                Ok(re) => TargetFilter::Pattern(re),
                Err(e) => {
                    log::warn!("invalid filter pattern '{}', excluding vendor instead: {}", p, e);
                    TargetFilter::NotVendor
                }
            },
        }
    }

    pub fn matches(&self, target: &str) -> bool {
        match self {
            TargetFilter::NotVendor => !target.contains(VENDOR_MARKER),
            TargetFilter::Pattern(re) => re.is_match(target),
        }
    }
}

/// Parse the lister output: one or more concatenated JSON objects.
pub fn parse_listings(stdout: &[u8]) -> Result<Vec<PackageListing>> {
    let stream = serde_json::Deserializer::from_slice(stdout).into_iter::<PackageListing>();
    let listings = stream
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LintmuxError::Discovery(format!("couldn't parse lister output: {}", e)))?;
    if listings.is_empty() {
        return Err(LintmuxError::Discovery("lister produced no packages".to_string()));
    }
    Ok(listings)
}

/// Dependencies under the listing's import path that pass `filter`,
/// followed by the import path itself.
pub fn select_targets(listing: &PackageListing, filter: &TargetFilter) -> Vec<String> {
    let mut targets: Vec<String> = listing
        .deps
        .iter()
        .filter(|dep| dep.starts_with(&listing.import_path))
        .filter(|dep| filter.matches(dep))
        .cloned()
        .collect();
    targets.push(listing.import_path.clone());
    targets
}

/// Targets from every listing, first occurrence wins.
pub fn collect_targets(listings: &[PackageListing], filter: &TargetFilter) -> Vec<String> {
    let mut seen = HashSet::new();
    listings
        .iter()
        .flat_map(|listing| select_targets(listing, filter))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Run the lister and produce the ordered target list.
pub async fn discover(config: &Config) -> Result<Vec<String>> {
    let (program, base_args) = config
        .lister
        .split_first()
        .ok_or_else(|| LintmuxError::Discovery("no lister command configured".to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(base_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if !config.package.is_empty() {
        cmd.arg(&config.package);
    }

    log::info!("listing targets with {}", config.lister.join(" "));
    let output = cmd
        .output()
        .await
        .map_err(|e| LintmuxError::Discovery(format!("couldn't run {}: {}", program, e)))?;

    if !output.status.success() {
        return Err(LintmuxError::Discovery(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let listings = parse_listings(&output.stdout)?;
    if config.show {
        for listing in &listings {
            println!("ImportPath: {}", listing.import_path);
        }
    }

    let filter = TargetFilter::from_pattern(config.filter.as_deref());
    let targets = collect_targets(&listings, &filter);
    log::info!("discovered {} targets", targets.len());
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(import_path: &str, deps: &[&str]) -> PackageListing {
        PackageListing {
            import_path: import_path.to_string(),
            deps: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_single_listing() {
        let json = br#"{"ImportPath": "example.com/app", "Deps": ["fmt", "example.com/app/util"], "Name": "main"}"#;
        let listings = parse_listings(json).unwrap();
        assert_eq!(listings, vec![listing("example.com/app", &["fmt", "example.com/app/util"])]);
    }

    #[test]
    fn test_parse_concatenated_listings() {
        let json = b"{\"ImportPath\": \"a\"}\n{\"ImportPath\": \"b\", \"Deps\": [\"b/c\"]}\n";
        let listings = parse_listings(json).unwrap();
        assert_eq!(listings.len(), 2);
        assert!(listings[0].deps.is_empty());
        assert_eq!(listings[1].deps, vec!["b/c"]);
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(matches!(parse_listings(b""), Err(LintmuxError::Discovery(_))));
    }

    #[test]
    fn test_parse_bad_json_is_error() {
        assert!(matches!(parse_listings(b"{not json"), Err(LintmuxError::Discovery(_))));
    }

    #[test]
    fn test_select_keeps_prefixed_and_appends_root() {
        let l = listing(
            "example.com/app",
            &["fmt", "example.com/app/util", "example.com/other", "example.com/app/db"],
        );
        let targets = select_targets(&l, &TargetFilter::NotVendor);
        assert_eq!(
            targets,
            vec!["example.com/app/util", "example.com/app/db", "example.com/app"]
        );
    }

    #[test]
    fn test_select_excludes_vendor_by_default() {
        let l = listing(
            "example.com/app",
            &["example.com/app/vendor/github.com/x/y", "example.com/app/util"],
        );
        let targets = select_targets(&l, &TargetFilter::from_pattern(None));
        assert_eq!(targets, vec!["example.com/app/util", "example.com/app"]);
    }

    #[test]
    fn test_custom_pattern_overrides_vendor_exclusion() {
        let l = listing(
            "example.com/app",
            &["example.com/app/vendor/lib", "example.com/app/util"],
        );
        let filter = TargetFilter::from_pattern(Some("vendor"));
        let targets = select_targets(&l, &filter);
        assert_eq!(targets, vec!["example.com/app/vendor/lib", "example.com/app"]);
    }

    #[test]
    fn test_invalid_pattern_falls_back() {
        let filter = TargetFilter::from_pattern(Some("(unclosed"));
        assert!(matches!(filter, TargetFilter::NotVendor));
        assert!(matches!(TargetFilter::from_pattern(Some("")), TargetFilter::NotVendor));
    }

    #[test]
    fn test_collect_dedupes() {
        let listings = vec![listing("a", &["a/x"]), listing("a/x", &[])];
        let targets = collect_targets(&listings, &TargetFilter::NotVendor);
        assert_eq!(targets, vec!["a/x", "a"]);
    }

    #[tokio::test]
    async fn test_discover_without_lister_is_error() {
        let config = Config {
            lister: vec![],
            ..Default::default()
        };
        assert!(matches!(discover(&config).await, Err(LintmuxError::Discovery(_))));
    }

    #[tokio::test]
    async fn test_discover_missing_lister_is_error() {
        let config = Config {
            lister: vec!["lintmux-no-such-lister-xyz".to_string()],
            ..Default::default()
        };
        assert!(matches!(discover(&config).await, Err(LintmuxError::Discovery(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discover_with_shell_lister() {
        let script = r#"printf '{"ImportPath":"%s","Deps":["%s/a","%s/vendor/b","other"]}' "$0" "$0" "$0""#;
        let config = Config {
            package: "example.com/app".to_string(),
            lister: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            ..Default::default()
        };
        let targets = discover(&config).await.unwrap();
        assert_eq!(targets, vec!["example.com/app/a", "example.com/app"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discover_lister_failure_is_error() {
        let config = Config {
            lister: vec!["sh".to_string(), "-c".to_string(), "echo boom >&2; exit 2".to_string()],
            ..Default::default()
        };
        let err = discover(&config).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
