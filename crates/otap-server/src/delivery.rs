//! Delivery decision engine.
//!
//! The upgrade decision is derived fresh from the device row on every
//! check-in; nothing about it is persisted besides the audit trail. The
//! descriptor fetch re-runs the same derivation at fetch time rather than
//! trusting a decision cached from an earlier call.

use otap_core::settings::{Setting, parse_settings};
use otap_core::version::WILDCARD;

use crate::catalog::Catalog;
use crate::storage::Device;

/// Outcome of one check-in evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub upgrade: bool,
    pub new_version: Option<String>,
    pub settings: Vec<Setting>,
}

impl Decision {
    pub const fn no_upgrade() -> Self {
        Self {
            upgrade: false,
            new_version: None,
            settings: Vec::new(),
        }
    }
}

/// Resolve a device's effective delivery target.
///
/// `None` when the device is blocked or has no target assigned. The `*`
/// selector resolves to the current catalog maximum here, at delivery
/// time; an empty catalog leaves a wildcard device with no target.
pub fn resolve_target(device: &Device, catalog: &Catalog) -> Option<String> {
    if device.is_blocked() {
        return None;
    }
    let target = device.deliver.as_deref()?;
    if target == WILDCARD {
        catalog.latest().ok().map(|v| v.to_string())
    } else {
        Some(target.to_string())
    }
}

/// Decide whether to offer an upgrade.
///
/// `device` is `None` for identities with no registry row: unknown devices
/// are never offered anything and never auto-registered. A device whose
/// reported version equals its resolved target is already current.
pub fn decide(device: Option<&Device>, catalog: &Catalog) -> Decision {
    let Some(device) = device else {
        return Decision::no_upgrade();
    };
    let Some(target) = resolve_target(device, catalog) else {
        return Decision::no_upgrade();
    };
    if device.reported.as_deref() == Some(target.as_str()) {
        return Decision::no_upgrade();
    }

    let settings = device
        .settings
        .as_deref()
        .map(parse_settings)
        .unwrap_or_default();

    Decision {
        upgrade: true,
        new_version: Some(target),
        settings,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn device(reported: Option<&str>, deliver: Option<&str>, block: bool) -> Device {
        Device {
            imei: "123456789012345".to_string(),
            custid: "ACME".to_string(),
            tid: Some("PM".to_string()),
            reported: reported.map(String::from),
            deliver: deliver.map(String::from),
            block: i64::from(block),
            settings: Some("host=example.net;port=1883".to_string()),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn catalog_with(versions: &[&str]) -> (tempfile::TempDir, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        for v in versions {
            std::fs::write(dir.path().join(format!("{v}.jar")), b"jar").unwrap();
        }
        let catalog = Catalog::new(dir.path().to_path_buf());
        (dir, catalog)
    }

    #[test]
    fn unknown_device_gets_nothing() {
        let (_dir, catalog) = catalog_with(&["1.0.0"]);
        assert_eq!(decide(None, &catalog), Decision::no_upgrade());
    }

    #[test]
    fn blocked_device_gets_nothing_despite_mismatch() {
        let (_dir, catalog) = catalog_with(&["1.2.0"]);
        let d = device(Some("1.1.0"), Some("1.2.0"), true);
        assert_eq!(decide(Some(&d), &catalog), Decision::no_upgrade());
    }

    #[test]
    fn no_target_means_no_upgrade() {
        let (_dir, catalog) = catalog_with(&["1.2.0"]);
        let d = device(Some("1.1.0"), None, false);
        assert_eq!(decide(Some(&d), &catalog), Decision::no_upgrade());
    }

    #[test]
    fn current_device_is_left_alone() {
        let (_dir, catalog) = catalog_with(&["1.2.0"]);
        let d = device(Some("1.2.0"), Some("1.2.0"), false);
        assert_eq!(decide(Some(&d), &catalog), Decision::no_upgrade());
    }

    #[test]
    fn mismatch_offers_target_with_settings() {
        let (_dir, catalog) = catalog_with(&["1.2.0"]);
        let d = device(Some("1.1.0"), Some("1.2.0"), false);
        let decision = decide(Some(&d), &catalog);
        assert!(decision.upgrade);
        assert_eq!(decision.new_version.as_deref(), Some("1.2.0"));
        assert_eq!(decision.settings.len(), 2);
        assert_eq!(decision.settings[0].key, "host");
    }

    #[test]
    fn wildcard_resolves_to_current_maximum() {
        let (dir, catalog) = catalog_with(&["1.0.0"]);
        let d = device(Some("0.9.0"), Some("*"), false);
        assert_eq!(
            decide(Some(&d), &catalog).new_version.as_deref(),
            Some("1.0.0")
        );

        // A newly stored higher version changes the very next decision
        // without any control call.
        std::fs::write(dir.path().join("1.1.0.jar"), b"jar").unwrap();
        assert_eq!(
            decide(Some(&d), &catalog).new_version.as_deref(),
            Some("1.1.0")
        );
    }

    #[test]
    fn wildcard_device_on_latest_is_current() {
        let (_dir, catalog) = catalog_with(&["1.1.0"]);
        let d = device(Some("1.1.0"), Some("*"), false);
        assert_eq!(decide(Some(&d), &catalog), Decision::no_upgrade());
    }

    #[test]
    fn wildcard_with_empty_catalog_gets_nothing() {
        let (_dir, catalog) = catalog_with(&[]);
        let d = device(Some("1.0.0"), Some("*"), false);
        assert_eq!(decide(Some(&d), &catalog), Decision::no_upgrade());
    }

    #[test]
    fn first_checkin_with_no_reported_version_upgrades() {
        let (_dir, catalog) = catalog_with(&["1.2.0"]);
        let d = device(None, Some("1.2.0"), false);
        assert!(decide(Some(&d), &catalog).upgrade);
    }
}
