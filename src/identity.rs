//! Session identity randomization
//!
//! Each session gets its own simulated identity: viewport, user agent,
//! locale-derived timezone/geolocation, and a fingerprint-masking init
//! script. Applying a profile to a page is idempotent.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Geographic coordinates for geolocation overrides.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Paris
const FRANCE_COORDS: GeoPoint = GeoPoint {
    latitude: 48.8566,
    longitude: 2.3522,
};
/// Berlin
const GERMANY_COORDS: GeoPoint = GeoPoint {
    latitude: 52.52,
    longitude: 13.405,
};
/// London
const UK_COORDS: GeoPoint = GeoPoint {
    latitude: 51.5074,
    longitude: -0.1278,
};

const VIEWPORTS: &[(u32, u32)] = &[
    (1920, 1080),
    (1680, 1050),
    (1600, 900),
    (1536, 864),
    (1440, 900),
    (1366, 768),
];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

/// Simulated browser identity for one session.
#[derive(Debug, Clone)]
pub struct IdentityProfile {
    pub viewport: (u32, u32),
    pub user_agent: String,
    pub locale: String,
    pub timezone: String,
    pub accept_language: String,
    pub geolocation: Option<GeoPoint>,
    pub init_script: String,
}

impl IdentityProfile {
    /// Build a randomized identity for the given locale tag.
    ///
    /// The mask script is assembled from a random subset of fingerprint
    /// masks so no two sessions expose the same surface; the webdriver and
    /// chrome-runtime base masks are always included.
    pub fn randomized(locale: &str, use_geolocation: bool) -> Self {
        let mut rng = rand::thread_rng();

        let (timezone, accept_language, coords) = region_for(locale);
        let viewport = *VIEWPORTS.choose(&mut rng).unwrap_or(&(1920, 1080));
        let user_agent = USER_AGENTS
            .choose(&mut rng)
            .unwrap_or(&USER_AGENTS[0])
            .to_string();

        Self {
            viewport,
            user_agent,
            locale: locale.to_string(),
            timezone: timezone.to_string(),
            accept_language: accept_language.to_string(),
            geolocation: use_geolocation.then_some(coords),
            init_script: build_mask_script(&mut rng, locale),
        }
    }
}

/// Timezone, Accept-Language header and geolocation coordinates per region.
fn region_for(locale: &str) -> (&'static str, &'static str, GeoPoint) {
    match locale.split(['-', '_']).next().unwrap_or(locale) {
        "fr" => (
            "Europe/Paris",
            "fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7",
            FRANCE_COORDS,
        ),
        "de" => (
            "Europe/Berlin",
            "de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7",
            GERMANY_COORDS,
        ),
        _ => ("Europe/London", "en-US,en;q=0.9", UK_COORDS),
    }
}

fn build_mask_script(rng: &mut impl Rng, locale: &str) -> String {
    let mut script = String::from(
        "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });\n\
         window.chrome = window.chrome || { runtime: {} };\n",
    );

    if rng.gen_bool(0.5) {
        script.push_str(
            "try {\n\
               const getParameter = WebGLRenderingContext.prototype.getParameter;\n\
               WebGLRenderingContext.prototype.getParameter = function(parameter) {\n\
                 if (parameter === 37445) { return 'Google Inc. (NVIDIA)'; }\n\
                 if (parameter === 37446) { return 'ANGLE (NVIDIA, NVIDIA GeForce GTX 1070 Direct3D11 vs_5_0 ps_5_0)'; }\n\
                 return getParameter.apply(this, arguments);\n\
               };\n\
             } catch (e) {}\n",
        );
    }
    if rng.gen_bool(0.5) {
        let cores = [4u32, 8, 12, 16][rng.gen_range(0..4)];
        script.push_str(&format!(
            "Object.defineProperty(navigator, 'hardwareConcurrency', {{ value: {} }});\n\
             Object.defineProperty(navigator, 'deviceMemory', {{ value: 8 }});\n",
            cores
        ));
    }
    if rng.gen_bool(0.5) {
        script.push_str(
            "Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });\n",
        );
    }
    if rng.gen_bool(0.5) {
        script.push_str(&format!(
            "Object.defineProperty(navigator, 'language', {{ value: '{}' }});\n",
            locale
        ));
    }

    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_comes_from_pool() {
        for _ in 0..20 {
            let profile = IdentityProfile::randomized("fr-FR", false);
            assert!(VIEWPORTS.contains(&profile.viewport));
        }
    }

    #[test]
    fn french_locale_maps_to_paris_region() {
        let profile = IdentityProfile::randomized("fr-FR", true);
        assert_eq!(profile.timezone, "Europe/Paris");
        assert!(profile.accept_language.starts_with("fr-FR"));
        let geo = profile.geolocation.expect("geolocation enabled");
        assert!((geo.latitude - 48.8566).abs() < f64::EPSILON);
    }

    #[test]
    fn geolocation_toggle_respected() {
        let profile = IdentityProfile::randomized("de-DE", false);
        assert!(profile.geolocation.is_none());
    }

    #[test]
    fn base_masks_always_present() {
        for _ in 0..10 {
            let profile = IdentityProfile::randomized("en-US", false);
            assert!(profile.init_script.contains("webdriver"));
            assert!(profile.init_script.contains("window.chrome"));
        }
    }
}
