//! Per-platform ceilings on pending notifications.

use tracing::warn;

use crate::Platform;

/// Hard limit iOS enforces on pending local notifications.
pub const IOS_MAX_PENDING: usize = 64;

/// Self-imposed limit on Android, which documents no hard ceiling.
pub const ANDROID_MAX_PENDING: usize = 200;

/// Most notifications a single batch may submit on `platform`.
///
/// Unrecognised platforms get the strictest known ceiling.
pub fn max_count(platform: &Platform) -> usize {
    match platform {
        Platform::Ios => IOS_MAX_PENDING,
        Platform::Android => ANDROID_MAX_PENDING,
        Platform::Other(name) => {
            warn!(platform = %name, limit = IOS_MAX_PENDING, "unknown platform, using strictest notification limit");
            IOS_MAX_PENDING.min(ANDROID_MAX_PENDING)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_platforms() {
        assert_eq!(max_count(&Platform::Ios), 64);
        assert_eq!(max_count(&Platform::Android), 200);
    }

    #[test]
    fn test_unknown_platform_fails_closed() {
        let limit = max_count(&Platform::Other("harmonyos".to_string()));
        assert_eq!(limit, max_count(&Platform::Ios));
        assert!(limit <= max_count(&Platform::Android));
    }
}
