//! SSID normalization
//!
//! Collapses cosmetic SSID variations ("Free_WiFi", "FreeWiFi", "Free-Wifi-Guest") into one
//! comparison key. Deliberately coarse: unrelated networks that share a key are sorted out
//! by scoring, not here.

/// Marketing words that carry no identity
const NOISE_WORDS: &[&str] = &["free", "wifi", "public", "guest"];

/// Compute the grouping key for an SSID
pub fn normalize(ssid: &str) -> String {
    let mut key: String = ssid
        .to_lowercase()
        .chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .collect();

    for word in NOISE_WORDS {
        key = key.replace(word, "");
    }

    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_variants() {
        assert_eq!(normalize("Free_WiFi"), normalize("FreeWiFi"));
        assert_eq!(normalize("FreeWiFi"), normalize("Free-Wifi-Guest"));
        assert_eq!(normalize("Free-Wifi-Guest"), "");
    }

    #[test]
    fn test_strips_noise_suffix() {
        assert_eq!(normalize("DICT-OFFICIAL"), "dictofficial");
        assert_eq!(normalize("DICT-OFFICIAL-FREE"), "dictofficial");
        assert_eq!(normalize("Airport Public WiFi"), "airport");
    }

    #[test]
    fn test_distinct_names_stay_distinct() {
        assert_ne!(normalize("CoffeeHouse"), normalize("BookShop"));
        assert_eq!(normalize("GovWiFi"), "gov");
    }

    #[test]
    fn test_total_on_odd_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("Café_ÜBER"), "caféüber");
    }
}
