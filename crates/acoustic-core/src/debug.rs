//! Переключатель трассировки форм тензоров в прямом проходе.

use std::ffi::OsStr;
use std::sync::OnceLock;

/// Переменная окружения, включающая трассировку.
pub const DEBUG_ENV: &str = "ACOUSTIC_DEBUG";

/// Включена ли трассировка форм после каждого слоя.
///
/// Читает `ACOUSTIC_DEBUG` один раз. Пустое значение, `0`, `false` и `off`
/// трассировку не включают, любое другое значение включает.
pub fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| flag_value(std::env::var_os(DEBUG_ENV).as_deref()))
}

fn flag_value(value: Option<&OsStr>) -> bool {
    match value {
        None => false,
        Some(v) => !matches!(
            v.to_str().map(|s| s.trim().to_ascii_lowercase()).as_deref(),
            Some("" | "0" | "false" | "off")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_value() {
        assert!(!flag_value(None));
        for off in ["", "0", "false", "OFF", " False "] {
            assert!(!flag_value(Some(OsStr::new(off))), "{off:?}");
        }
        for on in ["1", "true", "shapes"] {
            assert!(flag_value(Some(OsStr::new(on))), "{on:?}");
        }
    }
}
